//! Preamble scanning
//!
//! Everything before the first geometry directive: package declarations,
//! comments and `set` lines carrying the coupling length, rise time,
//! default length unit and segment counts.

use crate::options::ParseOptions;
use crate::reader::{extract_value, strip_quotes, tokenize, LineSource};
use crate::types::*;
use crate::units::{self, Quantity};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Line prefixes that open the geometry section (case-sensitive)
pub const GEOMETRY_PREFIXES: [&str; 5] = ["Gro", "Die", "Rec", "Cir", "Tra"];

/// Marker of a package declaration line
const PACKAGE_MARKER: &str = "ackage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderDirective {
    CouplingLength,
    RiseTime,
    DefaultLengthUnit,
    ContourSegments,
    PlaneSegments,
}

const HEADER_DIRECTIVES: [(&str, HeaderDirective); 5] = [
    ("couplingLen", HeaderDirective::CouplingLength),
    ("riseTime", HeaderDirective::RiseTime),
    ("defaultLeng", HeaderDirective::DefaultLengthUnit),
    ("CSEG", HeaderDirective::ContourSegments),
    ("DSEG", HeaderDirective::PlaneSegments),
];

/// Scalar parameters resolved from the preamble
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Meters
    pub coupling_length: f64,
    /// Seconds
    pub rise_time: f64,
    pub units: LengthUnit,
    pub contour_segments: u32,
    pub plane_segments: u32,
}

/// Whether `line` opens the geometry section
#[inline]
pub fn is_geometry_line(line: &str) -> bool {
    line.get(..3)
        .map(|prefix| GEOMETRY_PREFIXES.contains(&prefix))
        .unwrap_or(false)
}

/// Raw values seen while scanning, before defaults are applied
#[derive(Debug, Default)]
struct HeaderHints {
    coupling_length: f64,
    rise_time: f64,
    units: Option<LengthUnit>,
    contour_segments: Option<u32>,
    plane_segments: Option<u32>,
}

/// Scan the preamble.
///
/// Returns the resolved header and the geometry line that ended the scan,
/// which has already been read from `source`.
pub fn scan_header<R: BufRead>(
    source: &mut LineSource<R>,
    options: &ParseOptions,
) -> Result<(Header, String)> {
    let mut hints = HeaderHints::default();

    let first_geometry_line = loop {
        let line = source.next_line()?.ok_or(XsctnError::PrematureEof {
            context: "header",
            line: source.line_number(),
        })?;

        if line.starts_with('#') || line.trim_end().len() < 3 || line.contains(PACKAGE_MARKER) {
            continue;
        }
        if is_geometry_line(&line) {
            break line;
        }

        for (fragment, directive) in HEADER_DIRECTIVES {
            if line.contains(fragment) {
                apply_directive(directive, &line, source.line_number(), &mut hints)?;
            }
        }
    };

    Ok((resolve(hints, options), first_geometry_line))
}

fn apply_directive(
    directive: HeaderDirective,
    line: &str,
    line_number: usize,
    hints: &mut HeaderHints,
) -> Result<()> {
    match directive {
        HeaderDirective::CouplingLength => {
            let value = quantity_value(line, "couplingLength", Quantity::Length, line_number)?;
            hints.coupling_length = convert(
                &value,
                Quantity::Length,
                "meters",
                "couplingLength",
                line_number,
            )?;
            info!(coupling_length = hints.coupling_length, "input coupling length");
        }
        HeaderDirective::RiseTime => {
            let value = quantity_value(line, "riseTime", Quantity::Time, line_number)?;
            hints.rise_time = convert(&value, Quantity::Time, "ps", "riseTime", line_number)?;
            info!(rise_time = hints.rise_time, "input rise time");
        }
        HeaderDirective::DefaultLengthUnit => {
            let value = header_value(line, "defaultLengthUnits", line_number)?;
            let unit = LengthUnit::from_name(&value).ok_or_else(|| XsctnError::InvalidValue {
                attribute: "defaultLengthUnits",
                value: value.clone(),
                line: line_number,
            })?;
            info!(%unit, "input default units");
            hints.units = Some(unit);
        }
        HeaderDirective::ContourSegments => {
            hints.contour_segments = Some(segment_count(line, "CSEG", line_number)?);
        }
        HeaderDirective::PlaneSegments => {
            hints.plane_segments = Some(segment_count(line, "DSEG", line_number)?);
        }
    }
    Ok(())
}

fn header_value(line: &str, attribute: &'static str, line_number: usize) -> Result<String> {
    extract_value(line, false).ok_or_else(|| XsctnError::InvalidValue {
        attribute,
        value: line.trim().to_string(),
        line: line_number,
    })
}

/// Header value with a unit written as its own token joined back on,
/// as in `set ::Stackup::couplingLength 1 inches`
fn quantity_value(
    line: &str,
    attribute: &'static str,
    quantity: Quantity,
    line_number: usize,
) -> Result<String> {
    let mut value = header_value(line, attribute, line_number)?;
    if !units::has_suffix(&value) {
        if let Some(unit) = tokenize(line).get(3).map(|token| strip_quotes(token)) {
            if units::is_unit(unit, quantity) {
                value.push(' ');
                value.push_str(unit);
            }
        }
    }
    Ok(value)
}

fn convert(
    value: &str,
    quantity: Quantity,
    default_unit: &str,
    attribute: &'static str,
    line_number: usize,
) -> Result<f64> {
    units::convert(value, quantity, default_unit).ok_or_else(|| XsctnError::InvalidValue {
        attribute,
        value: value.to_string(),
        line: line_number,
    })
}

fn segment_count(line: &str, attribute: &'static str, line_number: usize) -> Result<u32> {
    let value = header_value(line, attribute, line_number)?;
    value.parse().map_err(|_| XsctnError::InvalidValue {
        attribute,
        value,
        line: line_number,
    })
}

fn resolve(hints: HeaderHints, options: &ParseOptions) -> Header {
    let contour_segments = options
        .seeded_contour_segments()
        .or(hints.contour_segments)
        .unwrap_or_else(|| {
            warn!(
                default = DEFAULT_CONTOUR_SEGMENTS,
                "no CSEG directive; using default contour segment count"
            );
            DEFAULT_CONTOUR_SEGMENTS
        });
    let plane_segments = options
        .seeded_plane_segments()
        .or(hints.plane_segments)
        .unwrap_or_else(|| {
            warn!(
                default = DEFAULT_PLANE_SEGMENTS,
                "no DSEG directive; using default plane segment count"
            );
            DEFAULT_PLANE_SEGMENTS
        });

    let rise_time = if hints.rise_time == 0.0 {
        let rise_time = DEFAULT_RISETIME_PS * 1.0e-12;
        info!(rise_time, "assigning default rise time");
        rise_time
    } else {
        hints.rise_time
    };

    let coupling_length = if hints.coupling_length == 0.0 {
        let coupling = DEFAULT_COUPLING_INCHES * METERS_PER_INCH;
        warn!(
            mils = coupling / METERS_PER_MIL,
            "no coupling length; default used"
        );
        coupling
    } else {
        hints.coupling_length
    };

    let units = hints.units.unwrap_or_default();
    debug!(
        contour_segments,
        plane_segments,
        %units,
        "header resolved"
    );

    Header {
        coupling_length,
        rise_time,
        units,
        contour_segments,
        plane_segments,
    }
}
