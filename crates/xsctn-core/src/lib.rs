//! # Cross-Section Reader - Core Library
//!
//! Reads the 2-D transmission-line cross-section description (`.xsctn`)
//! and turns it into positioned geometry for a boundary-element solver.
//!
//! ## What is produced
//!
//! - Dielectric layers with permittivity and absolute bounding boxes
//! - Signal conductors (rectangles, circles, trapezoids) with synthesized names
//! - Ground wires, with drawn ground planes recognized and removed
//! - Coupling length, rise time, segment counts and the mesh sizing hint
//!
//! All lengths are in meters, with y = 0 at the top of the bottom ground
//! plane.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let section = xsctn_core::read("stripline.xsctn").unwrap();
//! println!("Ground planes: {}", section.ground_planes);
//!
//! for signal in &section.signals {
//!     println!("{}: {:?}", signal.name, signal.primitive());
//! }
//! ```
//!
//! ## Parsing from memory
//!
//! ```rust
//! use xsctn_core::{parse_str, ParseOptions};
//!
//! let text = "GroundPlane G1\n\
//!             DielectricLayer D1 -thickness 10mils -permittivity 4.2\n\
//!             RectangleConductors sig1 -width 5mils -height 2mils\n";
//! let section = parse_str(text, &ParseOptions::default()).unwrap();
//! assert_eq!(section.num_signals(), 1);
//! assert_eq!(section.signals[0].name, "sig1R0");
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. Warnings such as a
//! missing ground plane are only visible once a subscriber is installed:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! let section = xsctn_core::read("stripline.xsctn").unwrap();
//! ```

mod block_reader;
mod builder;
mod header;
mod options;
mod parser;
mod postprocess;
mod reader;
mod types;
pub mod units;

// Re-export public types
pub use types::{
    Contour,
    CrossSection,
    DielectricLayer,
    LengthUnit,
    Point,
    Primitive,
    Result,
    Shape,
    XsctnError,
    // Constants
    DEFAULT_CONDUCTIVITY,
    DEFAULT_CONTOUR_SEGMENTS,
    DEFAULT_COUPLING_INCHES,
    DEFAULT_GROUND_THICKNESS,
    DEFAULT_PLANE_SEGMENTS,
    DEFAULT_RISETIME_PS,
    GROUND_PREFIX,
    METERS_PER_CENTIMETER,
    METERS_PER_INCH,
    METERS_PER_MICRON,
    METERS_PER_MIL,
    METERS_PER_MILLIMETER,
    XSCTN_EXTENSION,
};

pub use options::{ParseOptions, ReplicaLayout};

// Re-export the value extractor for callers reading related files
pub use reader::extract_value;

pub use parser::{parse_reader, parse_str, xsctn_path};

// ============================================================================
// Public API Functions
// ============================================================================

/// Read a cross-section file.
///
/// # Arguments
/// * `filename` - Path to the `.xsctn` file
///
/// # Returns
/// * `Ok(CrossSection)` - Positioned geometry and scalar parameters
/// * `Err(XsctnError)` - If the file cannot be opened or is malformed
pub fn read(filename: &str) -> Result<CrossSection> {
    parser::read_impl(filename, &ParseOptions::default())
}

/// Read a cross-section file with caller-supplied options.
///
/// # Arguments
/// * `filename` - Path to the `.xsctn` file
/// * `options` - Pre-seeded segment counts and replica layout
pub fn read_with_options(filename: &str, options: &ParseOptions) -> Result<CrossSection> {
    parser::read_impl(filename, options)
}

/// Read `<basename>.xsctn`, the naming used by the solver driver.
///
/// # Example
/// ```rust,no_run
/// // reads designs/coax.xsctn
/// let section = xsctn_core::read_basename("designs/coax").unwrap();
/// println!("Signals: {}", section.num_signals());
/// ```
pub fn read_basename(basename: &str) -> Result<CrossSection> {
    parser::read_impl(xsctn_path(basename), &ParseOptions::default())
}
