//! Unit conversion for attribute values
//!
//! Values are written as `<magnitude>[<suffix>]`, with or without whitespace
//! between the two. Results are always SI: meters, seconds, siemens/meter.

use crate::types::LengthUnit;

/// Physical quantity an attribute value is converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Length,
    Time,
    Conductivity,
}

impl Quantity {
    /// SI unit name the converter produces
    pub fn target_name(&self) -> &'static str {
        match self {
            Quantity::Length => "meters",
            Quantity::Time => "seconds",
            Quantity::Conductivity => "siemens/meter",
        }
    }

    /// Scale factor from `suffix` to the SI unit
    fn scale(&self, suffix: &str) -> Option<f64> {
        let suffix = suffix.to_ascii_lowercase();
        let factor = match self {
            Quantity::Length => LengthUnit::from_name(&suffix)?.meters_per_unit(),
            Quantity::Time => match suffix.as_str() {
                "seconds" | "second" | "sec" | "s" => 1.0,
                "ms" => 1.0e-3,
                "us" => 1.0e-6,
                "ns" => 1.0e-9,
                "ps" => 1.0e-12,
                "fs" => 1.0e-15,
                _ => return None,
            },
            Quantity::Conductivity => match suffix.as_str() {
                "siemens/meter" | "siemens/m" | "s/m" | "mhos/meter" | "mho/meter" | "mho/m" => {
                    1.0
                }
                _ => return None,
            },
        };
        Some(factor)
    }
}

/// Split a value into its numeric magnitude and the (possibly empty) suffix
pub fn split_magnitude(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    // Exponent only when a digit follows, so "5e" stays a suffix
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }

    let magnitude: f64 = text[..end].parse().ok()?;
    Some((magnitude, text[end..].trim()))
}

/// Whether the text has a unit suffix after its magnitude
pub fn has_suffix(text: &str) -> bool {
    split_magnitude(text)
        .map(|(_, suffix)| !suffix.is_empty())
        .unwrap_or(false)
}

/// Whether `token` names a unit of the given quantity
pub fn is_unit(token: &str, quantity: Quantity) -> bool {
    quantity.scale(token).is_some()
}

/// Convert `text` to the SI unit of `quantity`.
///
/// When `text` carries no suffix, the magnitude is read in `default_unit`.
/// Returns `None` for an unparsable magnitude or an unknown suffix.
pub fn convert(text: &str, quantity: Quantity, default_unit: &str) -> Option<f64> {
    let (magnitude, suffix) = split_magnitude(text)?;
    let suffix = if suffix.is_empty() {
        default_unit
    } else {
        suffix
    };
    let factor = quantity.scale(suffix)?;
    Some(magnitude * factor)
}
