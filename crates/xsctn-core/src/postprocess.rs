//! Finalization of the parsed geometry
//!
//! Widens full-width dielectrics, moves the y origin to the top of the
//! bottom ground plane and recognizes ground planes drawn as rectangular
//! ground wires.

use crate::builder::ModelBuilder;
use crate::header::Header;
use crate::types::*;
use tracing::{debug, info, warn};

/// Turn the accumulated state into the final cross-section
pub fn finalize(mut builder: ModelBuilder, header: Header) -> Result<CrossSection> {
    resolve_full_width(&mut builder.dielectrics, builder.total_width);

    let mut highest = builder.highest_dielectric;
    if let Some(offset) = builder.lowest_dielectric {
        if offset != 0.0 {
            set_offset(
                offset,
                &mut builder.dielectrics,
                &mut builder.signals,
                &mut builder.ground_wires,
            )?;
        }
        highest = highest.map(|top| top - offset);
    }

    let ground_extent = reconcile_lower_plane(&mut builder);
    if let (Some(top), Some(extent)) = (highest, ground_extent) {
        reconcile_upper_plane(&mut builder, top, extent);
    }

    if builder.ground_planes == 0 {
        warn!("there isn't a ground plane; one is assumed below the lowest dielectric");
    }

    let half_minimum_dimension = builder.minimum_dimension.map(|m| 0.5 * m).unwrap_or(0.0);

    info!(
        dielectrics = builder.dielectrics.len(),
        signals = builder.signals.len(),
        grounds = builder.ground_wires.len(),
        ground_planes = builder.ground_planes,
        half_minimum_dimension,
        "cross-section parsed"
    );

    Ok(CrossSection {
        contour_segments: header.contour_segments,
        plane_segments: header.plane_segments,
        coupling_length: header.coupling_length,
        rise_time: header.rise_time,
        default_conductivity: builder.default_conductivity,
        half_minimum_dimension,
        ground_planes: builder.ground_planes,
        top_ground_plane_thickness: builder.top_ground_plane_thickness,
        bottom_ground_plane_thickness: builder.bottom_ground_plane_thickness,
        units: header.units,
        total_width: builder.total_width,
        dielectrics: builder.dielectrics,
        signals: builder.signals,
        ground_wires: builder.ground_wires,
    })
}

/// Span layers without an x-extent over `[-W, 2W]`
pub fn resolve_full_width(dielectrics: &mut [DielectricLayer], total_width: f64) {
    for layer in dielectrics.iter_mut().filter(|d| d.is_full_width()) {
        layer.x0 = -total_width;
        layer.x1 = layer.x0 + 3.0 * total_width;
    }
}

/// Subtract `offset` from every y coordinate
pub fn set_offset(
    offset: f64,
    dielectrics: &mut [DielectricLayer],
    signals: &mut [Contour],
    ground_wires: &mut [Contour],
) -> Result<()> {
    if !offset.is_finite() {
        return Err(XsctnError::OffsetNormalization(format!(
            "offset {} is not finite",
            offset
        )));
    }
    debug!(offset, "offsetting y coordinates");

    for layer in dielectrics.iter_mut() {
        layer.y0 -= offset;
        layer.y1 -= offset;
        if !(layer.y0.is_finite() && layer.y1.is_finite()) {
            return Err(XsctnError::OffsetNormalization(
                "dielectric coordinate is not finite".into(),
            ));
        }
    }
    for contour in signals.iter_mut().chain(ground_wires.iter_mut()) {
        contour.shape.translate_y(-offset);
        if !contour.shape.min_y().is_finite() {
            return Err(XsctnError::OffsetNormalization(format!(
                "contour {:?} has a non-finite coordinate",
                contour.name
            )));
        }
    }
    Ok(())
}

/// Remove rectangle ground wires whose top sits at y = 0 and count them as
/// the bottom ground plane.
///
/// Only runs when no `GroundPlane` directive was seen. Returns the fullest
/// x-extent of the removed rectangles.
fn reconcile_lower_plane(builder: &mut ModelBuilder) -> Option<(f64, f64)> {
    if builder.ground_planes != 0 || builder.ground_wires.is_empty() {
        return None;
    }

    let mut found = 0usize;
    let mut extent: Option<(f64, f64)> = None;
    let mut thickness = None;

    builder.ground_wires.retain(|wire| match wire.shape {
        Shape::Rectangle { x0, y0, x1, y1 } if y1 == 0.0 => {
            found += 1;
            if found > 1 {
                warn!("too many lower ground planes; reset to 1");
            }
            extent = Some(match extent {
                Some((min, max)) => (min.min(x0), max.max(x1)),
                None => (x0, x1),
            });
            thickness = Some(y1 - y0);
            false
        }
        _ => true,
    });

    if let Some(thickness) = thickness {
        builder.ground_planes = 1;
        builder.bottom_ground_plane_thickness = thickness;
        debug!(found, thickness, ?extent, "lower ground plane drawn as rectangle");
    }
    extent
}

/// Remove rectangle ground wires lying on the top of the dielectric stack
/// with exactly the bottom plane's x-extent and count them as the top plane.
fn reconcile_upper_plane(builder: &mut ModelBuilder, stack_top: f64, extent: (f64, f64)) {
    if builder.ground_planes != 1 || builder.ground_wires.is_empty() {
        return;
    }

    let (x_min, x_max) = extent;
    let mut found = 0usize;
    let mut thickness = None;

    builder.ground_wires.retain(|wire| match wire.shape {
        Shape::Rectangle { x0, y0, x1, y1 } if y0 == stack_top && x0 == x_min && x1 == x_max => {
            found += 1;
            if found > 1 {
                warn!("too many upper ground planes; reset to 2");
            }
            thickness = Some(y1 - y0);
            false
        }
        _ => true,
    });

    if let Some(thickness) = thickness {
        builder.ground_planes = 2;
        builder.top_ground_plane_thickness = thickness;
        debug!(found, thickness, "upper ground plane drawn as rectangle");
    }
}
