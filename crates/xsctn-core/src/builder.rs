//! Accumulated parser state
//!
//! Owns the output lists while blocks are being parsed and keeps the
//! running extrema the post-processor needs.

use crate::types::*;
use tracing::{debug, info, warn};

/// Everything collected from the geometry section
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBuilder {
    pub dielectrics: Vec<DielectricLayer>,
    pub signals: Vec<Contour>,
    pub ground_wires: Vec<Contour>,
    /// Count of `GroundPlane` directives, clamped to 2
    pub ground_planes: u8,
    pub top_ground_plane_thickness: f64,
    pub bottom_ground_plane_thickness: f64,
    /// Smallest width, height, diameter or polygon edge seen
    pub minimum_dimension: Option<f64>,
    pub highest_dielectric: Option<f64>,
    /// Bottom of the lowest dielectric; becomes y = 0
    pub lowest_dielectric: Option<f64>,
    /// Widest conductor set, for sizing full-width dielectrics
    pub total_width: f64,
    /// Top of the dielectric stack built so far
    pub y_cursor: f64,
    pub default_conductivity: f64,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self {
            dielectrics: Vec::new(),
            signals: Vec::new(),
            ground_wires: Vec::new(),
            ground_planes: 0,
            top_ground_plane_thickness: DEFAULT_GROUND_THICKNESS,
            bottom_ground_plane_thickness: DEFAULT_GROUND_THICKNESS,
            minimum_dimension: None,
            highest_dielectric: None,
            lowest_dielectric: None,
            total_width: 0.0,
            y_cursor: 0.0,
            default_conductivity: DEFAULT_CONDUCTIVITY,
        }
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a `GroundPlane` directive
    pub fn declare_ground_plane(&mut self) {
        if self.ground_planes >= MAX_GROUND_PLANES {
            warn!(
                declared = self.ground_planes as usize + 1,
                "too many ground planes in the design; reset to 2"
            );
            return;
        }
        self.ground_planes += 1;
    }

    pub fn track_feature(&mut self, size: f64) {
        self.minimum_dimension = Some(match self.minimum_dimension {
            Some(current) => current.min(size),
            None => size,
        });
    }

    pub fn track_set_width(&mut self, width: f64) {
        if width > self.total_width {
            self.total_width = width;
            debug!(total_width = width, "total width");
        }
    }

    /// Stack a full-width layer of `thickness` on the cursor and advance it
    pub fn stack_dielectric(&mut self, thickness: f64, constant: f64, loss_tangent: f64) {
        let y0 = self.y_cursor;
        self.y_cursor += thickness;
        let layer = DielectricLayer {
            constant,
            loss_tangent,
            y0,
            y1: self.y_cursor,
            ..DielectricLayer::default()
        };
        self.add_dielectric(layer);
        self.track_feature(thickness);
    }

    /// Record a positioned layer without moving the cursor
    pub fn add_dielectric(&mut self, layer: DielectricLayer) {
        self.highest_dielectric = Some(match self.highest_dielectric {
            Some(top) => top.max(layer.y1),
            None => layer.y1,
        });
        self.lowest_dielectric = Some(match self.lowest_dielectric {
            Some(bottom) => bottom.min(layer.y0),
            None => layer.y0,
        });
        self.dielectrics.push(layer);
    }

    /// Add a signal conductor, returning its synthesized name
    pub fn add_signal(
        &mut self,
        base_name: &str,
        type_letter: char,
        conductivity: f64,
        shape: Shape,
    ) -> String {
        let name = format!("{}{}{}", base_name, type_letter, self.signals.len());
        info!(name = %name, conductivity, "signal conductivity (siemens/meter)");
        self.signals.push(Contour {
            name: name.clone(),
            conductivity,
            shape,
        });
        name
    }

    pub fn add_ground_wire(&mut self, shape: Shape) {
        self.ground_wires.push(Contour {
            name: String::new(),
            conductivity: 0.0,
            shape,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_planes_clamp() {
        let mut builder = ModelBuilder::new();
        for _ in 0..4 {
            builder.declare_ground_plane();
        }
        assert_eq!(builder.ground_planes, 2);
    }

    #[test]
    fn test_stacking_advances_cursor() {
        let mut builder = ModelBuilder::new();
        builder.stack_dielectric(2.0, 4.0, 0.0);
        builder.stack_dielectric(1.0, 3.0, 0.0);
        assert_eq!(builder.y_cursor, 3.0);
        assert_eq!(builder.dielectrics[1].y0, 2.0);
        assert_eq!(builder.highest_dielectric, Some(3.0));
        assert_eq!(builder.lowest_dielectric, Some(0.0));
        assert_eq!(builder.minimum_dimension, Some(1.0));
        assert!(builder.dielectrics.iter().all(|d| d.is_full_width()));
    }

    #[test]
    fn test_signal_names_are_indexed() {
        let mut builder = ModelBuilder::new();
        let shape = Shape::Circle {
            cx: 0.0,
            cy: 0.0,
            radius: 1.0,
        };
        assert_eq!(builder.add_signal("a", 'C', 1.0, shape.clone()), "aC0");
        builder.add_ground_wire(shape.clone());
        assert_eq!(builder.add_signal("b", 'R', 1.0, shape), "bR1");
        assert_eq!(builder.ground_wires[0].conductivity, 0.0);
    }
}
