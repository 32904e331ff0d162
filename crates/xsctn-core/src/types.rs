//! Common types, errors, and constants for cross-section reading

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// File extension appended to a cross-section basename
pub const XSCTN_EXTENSION: &str = "xsctn";

pub const METERS_PER_CENTIMETER: f64 = 1.0e-2;
pub const METERS_PER_MILLIMETER: f64 = 1.0e-3;
pub const METERS_PER_MIL: f64 = 25.4e-6;
pub const METERS_PER_INCH: f64 = 0.0254;
pub const METERS_PER_MICRON: f64 = 1.0e-6;

/// Conductivity assigned to signals that declare none (copper, S/m)
pub const DEFAULT_CONDUCTIVITY: f64 = 5.8e7;
/// Rise time used when the header declares none, in picoseconds
pub const DEFAULT_RISETIME_PS: f64 = 25.0;
/// Coupling length used when the header declares none, in inches
pub const DEFAULT_COUPLING_INCHES: f64 = 1.0;
/// Ground-plane thickness assumed until a drawn plane says otherwise, in meters
pub const DEFAULT_GROUND_THICKNESS: f64 = METERS_PER_MIL;

pub const DEFAULT_CONTOUR_SEGMENTS: u32 = 6;
pub const DEFAULT_PLANE_SEGMENTS: u32 = 15;

/// Conductor names starting with this prefix are ground wires
pub const GROUND_PREFIX: &str = "gr";

/// At most a bottom and a top plane
pub const MAX_GROUND_PLANES: u8 = 2;

// ============================================================================
// Enums
// ============================================================================

/// Length unit of the `defaultLengthUnits` header line and of length suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LengthUnit {
    Meters,
    Centimeters,
    Millimeters,
    Microns,
    #[default]
    Mils,
    Inches,
}

impl LengthUnit {
    /// Parse a unit name as written in a cross-section file
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "meters" | "meter" | "m" => Some(LengthUnit::Meters),
            "centimeters" | "centimeter" | "cm" => Some(LengthUnit::Centimeters),
            "millimeters" | "millimeter" | "mm" => Some(LengthUnit::Millimeters),
            "microns" | "micron" | "um" => Some(LengthUnit::Microns),
            "mils" | "mil" => Some(LengthUnit::Mils),
            "inches" | "inch" | "in" => Some(LengthUnit::Inches),
            _ => None,
        }
    }

    /// Canonical suffix, as accepted by the unit converter
    pub fn name(&self) -> &'static str {
        match self {
            LengthUnit::Meters => "meters",
            LengthUnit::Centimeters => "centimeters",
            LengthUnit::Millimeters => "millimeters",
            LengthUnit::Microns => "microns",
            LengthUnit::Mils => "mils",
            LengthUnit::Inches => "inches",
        }
    }

    #[inline]
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Centimeters => METERS_PER_CENTIMETER,
            LengthUnit::Millimeters => METERS_PER_MILLIMETER,
            LengthUnit::Microns => METERS_PER_MICRON,
            LengthUnit::Mils => METERS_PER_MIL,
            LengthUnit::Inches => METERS_PER_INCH,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometric kind of a contour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Primitive {
    Rectangle,
    Circle,
    Polygon,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for cross-section reading
#[derive(Debug, Error)]
pub enum XsctnError {
    #[error("cannot open the cross-section file {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EOF encountered in {context} at line {line} -- incomplete input file")]
    PrematureEof { context: &'static str, line: usize },

    #[error("line {line}: dielectric layer declared before any ground plane; there must be a bottom ground plane")]
    MissingGroundPlane { line: usize },

    #[error("line {line}: {directive} is missing required attribute {attribute}")]
    MissingAttribute {
        directive: &'static str,
        attribute: &'static str,
        line: usize,
    },

    #[error("line {line}: invalid value {value:?} for {attribute}")]
    InvalidValue {
        attribute: &'static str,
        value: String,
        line: usize,
    },

    #[error("line {line}: conductor set {name:?} has no recognized primitive")]
    InvalidPrimitive { name: String, line: usize },

    #[error("cannot set y offset: {0}")]
    OffsetNormalization(String),
}

impl XsctnError {
    /// Whether this error reports an internal invariant violation rather
    /// than a problem with the input file
    pub fn is_fatal(&self) -> bool {
        matches!(self, XsctnError::OffsetNormalization(_))
    }
}

pub type Result<T> = std::result::Result<T, XsctnError>;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Outline of a conductor
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Lower-left `(x0, y0)`, upper-right `(x1, y1)`
    Rectangle { x0: f64, y0: f64, x1: f64, y1: f64 },
    Circle { cx: f64, cy: f64, radius: f64 },
    /// Corners in generation order; the closing edge back to the first
    /// point is implicit
    Polygon { points: Vec<Point>, perimeter: f64 },
}

impl Shape {
    pub fn primitive(&self) -> Primitive {
        match self {
            Shape::Rectangle { .. } => Primitive::Rectangle,
            Shape::Circle { .. } => Primitive::Circle,
            Shape::Polygon { .. } => Primitive::Polygon,
        }
    }

    /// Lowest y coordinate touched by the shape
    pub fn min_y(&self) -> f64 {
        match self {
            Shape::Rectangle { y0, .. } => *y0,
            Shape::Circle { cy, radius, .. } => cy - radius,
            Shape::Polygon { points, .. } => {
                points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
            }
        }
    }

    pub fn translate_y(&mut self, dy: f64) {
        match self {
            Shape::Rectangle { y0, y1, .. } => {
                *y0 += dy;
                *y1 += dy;
            }
            Shape::Circle { cy, .. } => *cy += dy,
            Shape::Polygon { points, .. } => {
                for p in points.iter_mut() {
                    p.y += dy;
                }
            }
        }
    }

    /// Closed edges of a polygon, including the one back to the first point
    pub fn edges(&self) -> Vec<(Point, Point)> {
        match self {
            Shape::Polygon { points, .. } if points.len() > 1 => points
                .iter()
                .zip(points.iter().cycle().skip(1))
                .map(|(a, b)| (*a, *b))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A signal or ground conductor
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contour {
    /// Synthesized unique name for signals, empty for ground wires
    pub name: String,
    /// Siemens/meter; always 0 for ground wires
    pub conductivity: f64,
    pub shape: Shape,
}

impl Contour {
    #[inline]
    pub fn primitive(&self) -> Primitive {
        self.shape.primitive()
    }
}

/// A horizontal slab of uniform permittivity, in meters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DielectricLayer {
    pub constant: f64,
    /// Parsed but not used by the solver
    pub loss_tangent: f64,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Default for DielectricLayer {
    fn default() -> Self {
        Self {
            constant: 1.0,
            loss_tangent: 0.0,
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: 0.0,
        }
    }
}

impl DielectricLayer {
    /// Layers without an x-extent span the whole structure
    #[inline]
    pub fn is_full_width(&self) -> bool {
        self.x0 == 0.0 && self.x1 == 0.0
    }

    #[inline]
    pub fn thickness(&self) -> f64 {
        self.y1 - self.y0
    }
}

// ============================================================================
// Result
// ============================================================================

/// Positioned geometry and scalar parameters read from a cross-section file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossSection {
    pub contour_segments: u32,
    pub plane_segments: u32,
    /// Meters
    pub coupling_length: f64,
    /// Seconds
    pub rise_time: f64,
    /// Siemens/meter
    pub default_conductivity: f64,
    /// Half the smallest feature, used to size the mesh (meters)
    pub half_minimum_dimension: f64,
    /// 0, 1 or 2
    pub ground_planes: u8,
    /// Meters
    pub top_ground_plane_thickness: f64,
    /// Meters
    pub bottom_ground_plane_thickness: f64,
    pub units: LengthUnit,
    /// Widest conductor set, used to size full-width dielectrics (meters)
    pub total_width: f64,
    pub dielectrics: Vec<DielectricLayer>,
    pub signals: Vec<Contour>,
    pub ground_wires: Vec<Contour>,
}

impl CrossSection {
    #[inline]
    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    #[inline]
    pub fn num_grounds(&self) -> usize {
        self.ground_wires.len()
    }

    /// Look up a signal by its synthesized name
    pub fn signal(&self, name: &str) -> Option<&Contour> {
        self.signals.iter().find(|c| c.name == name)
    }

    /// Top of the dielectric stack, if any dielectric was declared
    pub fn stack_top(&self) -> Option<f64> {
        self.dielectrics
            .iter()
            .map(|d| d.y1)
            .reduce(f64::max)
    }
}

// ============================================================================
// Tests
// ============================================================================
