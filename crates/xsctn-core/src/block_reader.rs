//! Geometry directive blocks
//!
//! Each directive starts on a line whose first token names it and may
//! continue over following lines ending in `\`. Attribute flags are looked
//! up in a table; the values they carry are converted on demand by the
//! directive handlers.

use crate::builder::ModelBuilder;
use crate::options::{ParseOptions, ReplicaLayout};
use crate::reader::{is_continued, strip_quotes, tokenize, LineSource};
use crate::types::*;
use crate::units::{self, Quantity};
use std::collections::HashMap;
use std::io::BufRead;
use tracing::{debug, trace, warn};

// ============================================================================
// Keyword tables
// ============================================================================

/// Conductor primitive as declared by the directive name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConductorKind {
    Rectangle,
    Trapezoid,
    Circle,
}

impl ConductorKind {
    /// Letter used in synthesized signal names
    pub fn type_letter(&self) -> char {
        match self {
            ConductorKind::Rectangle => 'R',
            ConductorKind::Trapezoid => 'T',
            ConductorKind::Circle => 'C',
        }
    }
}

const CONDUCTOR_KINDS: [(&str, ConductorKind); 3] = [
    ("RectangleCon", ConductorKind::Rectangle),
    ("TrapezoidCon", ConductorKind::Trapezoid),
    ("CircleCon", ConductorKind::Circle),
];

/// Top-level geometry directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    GroundPlane,
    DielectricLayer,
    RectangleDielectric,
    Conductors,
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::GroundPlane => "GroundPlane",
            Directive::DielectricLayer => "DielectricLayer",
            Directive::RectangleDielectric => "RectangleDielectric",
            Directive::Conductors => "Conductors",
        }
    }
}

/// Fragments identifying a directive within its keyword
const DIRECTIVES: [(&str, Directive); 4] = [
    ("oundPlane", Directive::GroundPlane),
    ("lectricLayer", Directive::DielectricLayer),
    ("ctangleDielec", Directive::RectangleDielectric),
    ("Conductors", Directive::Conductors),
];

/// Identify the directive opening `line`, if any
pub fn classify(line: &str) -> Option<Directive> {
    let keyword = tokenize(line).into_iter().next()?;
    DIRECTIVES
        .iter()
        .find(|(fragment, _)| keyword.contains(fragment))
        .map(|(_, directive)| *directive)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Thickness,
    Permittivity,
    LossTangent,
    Height,
    Width,
    TopWidth,
    BottomWidth,
    Diameter,
    Conductivity,
    Number,
    XOffset,
    YOffset,
    Pitch,
}

/// Attribute flags, matched as token prefixes so `-xOffset` selects `-xOff`
const ATTRIBUTES: [(&str, Attribute); 13] = [
    ("-thickness", Attribute::Thickness),
    ("-permittivity", Attribute::Permittivity),
    ("-lossTangent", Attribute::LossTangent),
    ("-height", Attribute::Height),
    ("-width", Attribute::Width),
    ("-topWidth", Attribute::TopWidth),
    ("-bottomWidth", Attribute::BottomWidth),
    ("-diameter", Attribute::Diameter),
    ("-conductivity", Attribute::Conductivity),
    ("-number", Attribute::Number),
    ("-xOff", Attribute::XOffset),
    ("-yOff", Attribute::YOffset),
    ("-pitch", Attribute::Pitch),
];

impl Attribute {
    pub fn lookup(flag: &str) -> Option<Self> {
        ATTRIBUTES
            .iter()
            .find(|(name, _)| flag.starts_with(name))
            .map(|(_, attribute)| *attribute)
    }

    pub fn flag(&self) -> &'static str {
        ATTRIBUTES
            .iter()
            .find(|(_, attribute)| attribute == self)
            .map(|(name, _)| *name)
            .unwrap_or("-?")
    }

    /// Quantity of a unit-bearing attribute
    fn quantity(&self) -> Option<Quantity> {
        match self {
            Attribute::Permittivity | Attribute::LossTangent | Attribute::Number => None,
            Attribute::Conductivity => Some(Quantity::Conductivity),
            _ => Some(Quantity::Length),
        }
    }
}

// ============================================================================
// Attribute blocks
// ============================================================================

/// Raw attribute values of one directive, last occurrence wins
#[derive(Debug, Default)]
pub struct AttributeBlock {
    /// Line the directive started on
    pub line: usize,
    values: HashMap<Attribute, (String, usize)>,
}

impl AttributeBlock {
    fn insert_line(&mut self, text: &str, line_number: usize) -> Result<()> {
        let tokens = tokenize(text);
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            i += 1;
            let Some(attribute) = lookup_flag(token) else {
                if token.starts_with('-') && !is_number_start(token) {
                    trace!(flag = token, line = line_number, "ignoring attribute");
                }
                continue;
            };

            let value = match tokens.get(i) {
                Some(&value) if value != "\\" && lookup_flag(value).is_none() => value,
                _ => {
                    return Err(XsctnError::InvalidValue {
                        attribute: attribute.flag(),
                        value: String::new(),
                        line: line_number,
                    })
                }
            };
            i += 1;
            let mut value = strip_quotes(value).to_string();

            // "10 mils": unit as a separate token
            if let (Some(quantity), Some(&unit)) = (attribute.quantity(), tokens.get(i)) {
                if !units::has_suffix(&value) && units::is_unit(unit, quantity) {
                    value.push(' ');
                    value.push_str(unit);
                    i += 1;
                }
            }
            self.values.insert(attribute, (value, line_number));
        }
        Ok(())
    }

    pub fn raw(&self, attribute: Attribute) -> Option<&str> {
        self.values.get(&attribute).map(|(value, _)| value.as_str())
    }

    fn invalid(&self, attribute: Attribute) -> XsctnError {
        let (value, line) = self
            .values
            .get(&attribute)
            .cloned()
            .unwrap_or((String::new(), self.line));
        XsctnError::InvalidValue {
            attribute: attribute.flag(),
            value,
            line,
        }
    }

    /// Length in meters; a bare magnitude is read in `units`
    pub fn length(&self, attribute: Attribute, units: LengthUnit) -> Result<Option<f64>> {
        self.converted(attribute, Quantity::Length, units.name())
    }

    /// Length in meters that must be strictly positive
    pub fn positive_length(&self, attribute: Attribute, units: LengthUnit) -> Result<Option<f64>> {
        match self.length(attribute, units)? {
            Some(value) if value <= 0.0 => Err(self.invalid(attribute)),
            value => Ok(value),
        }
    }

    pub fn conductivity(&self) -> Result<Option<f64>> {
        self.converted(
            Attribute::Conductivity,
            Quantity::Conductivity,
            Quantity::Conductivity.target_name(),
        )
    }

    fn converted(
        &self,
        attribute: Attribute,
        quantity: Quantity,
        default_unit: &str,
    ) -> Result<Option<f64>> {
        match self.raw(attribute) {
            None => Ok(None),
            Some(value) => units::convert(value, quantity, default_unit)
                .map(Some)
                .ok_or_else(|| self.invalid(attribute)),
        }
    }

    /// Plain floating-point value
    pub fn float(&self, attribute: Attribute) -> Result<Option<f64>> {
        match self.raw(attribute) {
            None => Ok(None),
            Some(value) => value
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(attribute)),
        }
    }

    /// Replication count, at least 1
    pub fn count(&self, attribute: Attribute) -> Result<Option<usize>> {
        match self.raw(attribute) {
            None => Ok(None),
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Some(n)),
                _ => Err(self.invalid(attribute)),
            },
        }
    }

    fn require(
        &self,
        value: Option<f64>,
        directive: &'static str,
        attribute: Attribute,
    ) -> Result<f64> {
        value.ok_or(XsctnError::MissingAttribute {
            directive,
            attribute: attribute.flag(),
            line: self.line,
        })
    }
}

fn lookup_flag(token: &str) -> Option<Attribute> {
    if token.starts_with('-') {
        Attribute::lookup(token)
    } else {
        None
    }
}

/// `-5mils` is a value, `-width` is a flag
fn is_number_start(token: &str) -> bool {
    token[1..]
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || c == '.')
        .unwrap_or(false)
}

// ============================================================================
// Block reader
// ============================================================================

/// Reads directive blocks from a line source into a [`ModelBuilder`]
pub struct BlockReader<'a, R> {
    source: &'a mut LineSource<R>,
    units: LengthUnit,
    replica_layout: ReplicaLayout,
}

impl<'a, R: BufRead> BlockReader<'a, R> {
    pub fn new(source: &'a mut LineSource<R>, units: LengthUnit, options: &ParseOptions) -> Self {
        Self {
            source,
            units,
            replica_layout: options.replica_layout,
        }
    }

    /// Next line from the underlying source
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.source.next_line()
    }

    #[inline]
    pub fn line_number(&self) -> usize {
        self.source.line_number()
    }

    /// Collect the attribute block starting at `first_line`, reading
    /// continuation lines as needed
    pub fn read_block(&mut self, first_line: &str, directive: Directive) -> Result<AttributeBlock> {
        let mut block = AttributeBlock {
            line: self.source.line_number(),
            ..AttributeBlock::default()
        };
        block.insert_line(first_line, block.line)?;

        let mut continued = is_continued(first_line);
        while continued {
            let line = self.source.next_line()?.ok_or(XsctnError::PrematureEof {
                context: directive.name(),
                line: self.source.line_number(),
            })?;
            block.insert_line(&line, self.source.line_number())?;
            continued = is_continued(&line);
        }
        Ok(block)
    }

    /// Parse one directive block into `builder`.
    ///
    /// An unknown conductor primitive is reported as
    /// [`XsctnError::InvalidPrimitive`] after its block has been consumed,
    /// so the caller may skip it and carry on.
    pub fn parse_directive(
        &mut self,
        directive: Directive,
        line: &str,
        builder: &mut ModelBuilder,
    ) -> Result<()> {
        match directive {
            Directive::GroundPlane => {
                self.read_block(line, directive)?;
                builder.declare_ground_plane();
                Ok(())
            }
            Directive::DielectricLayer => self.dielectric_layer(line, builder),
            Directive::RectangleDielectric => self.rectangle_dielectric(line, builder),
            Directive::Conductors => self.conductors(line, builder),
        }
    }

    fn dielectric_layer(&mut self, line: &str, builder: &mut ModelBuilder) -> Result<()> {
        if builder.ground_planes == 0 {
            return Err(XsctnError::MissingGroundPlane {
                line: self.source.line_number(),
            });
        }
        let block = self.read_block(line, Directive::DielectricLayer)?;

        let thickness = block.positive_length(Attribute::Thickness, self.units)?;
        let thickness = block.require(thickness, "DielectricLayer", Attribute::Thickness)?;
        let constant = block.float(Attribute::Permittivity)?.unwrap_or(1.0);
        let loss_tangent = block.float(Attribute::LossTangent)?.unwrap_or(0.0);

        builder.stack_dielectric(thickness, constant, loss_tangent);
        debug!(thickness, constant, top = builder.y_cursor, "dielectric layer");
        Ok(())
    }

    fn rectangle_dielectric(&mut self, line: &str, builder: &mut ModelBuilder) -> Result<()> {
        const DIRECTIVE: &str = "RectangleDielectric";
        let block = self.read_block(line, Directive::RectangleDielectric)?;

        let height = block.positive_length(Attribute::Height, self.units)?;
        let height = block.require(height, DIRECTIVE, Attribute::Height)?;
        let width = block.positive_length(Attribute::Width, self.units)?;
        let width = block.require(width, DIRECTIVE, Attribute::Width)?;
        let constant = block.float(Attribute::Permittivity)?.unwrap_or(1.0);
        let loss_tangent = block.float(Attribute::LossTangent)?.unwrap_or(0.0);
        let number = block.count(Attribute::Number)?.unwrap_or(1);
        let x_offset = block.length(Attribute::XOffset, self.units)?.unwrap_or(0.0);
        let y_offset = block.length(Attribute::YOffset, self.units)?.unwrap_or(0.0);
        let pitch = block.length(Attribute::Pitch, self.units)?;

        let (pitch, y_base) = match self.replica_layout {
            ReplicaLayout::Legacy => {
                if number > 1 {
                    warn!(
                        number,
                        line = block.line,
                        "rectangle dielectric replicas placed at the same x offset"
                    );
                }
                (0.0, builder.y_cursor)
            }
            ReplicaLayout::Pitched => {
                let pitch = if number > 1 {
                    block.require(pitch, DIRECTIVE, Attribute::Pitch)?
                } else {
                    pitch.unwrap_or(0.0)
                };
                (pitch, builder.y_cursor + y_offset)
            }
        };

        for k in 0..number {
            let x0 = x_offset + k as f64 * pitch;
            builder.add_dielectric(DielectricLayer {
                constant,
                loss_tangent,
                x0,
                y0: y_base,
                x1: x0 + width,
                y1: y_base + height,
            });
            builder.track_feature(height);
        }
        debug!(number, width, height, "rectangle dielectric");
        Ok(())
    }

    fn conductors(&mut self, line: &str, builder: &mut ModelBuilder) -> Result<()> {
        let tokens = tokenize(line);
        let keyword = tokens.first().copied().unwrap_or_default();
        let name = tokens.get(1).map(|t| strip_quotes(t).to_string());
        let kind = CONDUCTOR_KINDS
            .iter()
            .find(|(fragment, _)| keyword.contains(fragment))
            .map(|(_, kind)| *kind);

        let start_line = self.source.line_number();
        let block = self.read_block(line, Directive::Conductors)?;

        let Some(kind) = kind else {
            return Err(XsctnError::InvalidPrimitive {
                name: name.unwrap_or_else(|| keyword.to_string()),
                line: start_line,
            });
        };
        let name = name.ok_or(XsctnError::MissingAttribute {
            directive: "Conductors",
            attribute: "name",
            line: start_line,
        })?;

        let set = ConductorSet::from_block(kind, &block, self.units)?;
        let conductivity = block
            .conductivity()?
            .unwrap_or(builder.default_conductivity);

        set.build(&name, conductivity, builder);
        Ok(())
    }
}

// ============================================================================
// Conductor sets
// ============================================================================

/// Per-primitive dimensions, validated before any geometry is built
#[derive(Debug, Clone, Copy, PartialEq)]
enum Dimensions {
    Rectangle { width: f64, height: f64 },
    Trapezoid { top: f64, bottom: f64, height: f64 },
    Circle { diameter: f64 },
}

/// A replicated conductor set
#[derive(Debug, Clone, PartialEq)]
struct ConductorSet {
    kind: ConductorKind,
    dimensions: Dimensions,
    number: usize,
    x_offset: f64,
    y_offset: f64,
    pitch: f64,
}

impl ConductorSet {
    fn from_block(kind: ConductorKind, block: &AttributeBlock, units: LengthUnit) -> Result<Self> {
        const DIRECTIVE: &str = "Conductors";
        let required = |attribute: Attribute| -> Result<f64> {
            let value = block.length(attribute, units)?;
            block.require(value, DIRECTIVE, attribute)
        };
        let dimension = |attribute: Attribute| -> Result<f64> {
            let value = block.positive_length(attribute, units)?;
            block.require(value, DIRECTIVE, attribute)
        };

        let dimensions = match kind {
            ConductorKind::Rectangle => Dimensions::Rectangle {
                width: dimension(Attribute::Width)?,
                height: dimension(Attribute::Height)?,
            },
            ConductorKind::Trapezoid => Dimensions::Trapezoid {
                top: dimension(Attribute::TopWidth)?,
                bottom: dimension(Attribute::BottomWidth)?,
                height: dimension(Attribute::Height)?,
            },
            ConductorKind::Circle => Dimensions::Circle {
                diameter: dimension(Attribute::Diameter)?,
            },
        };

        let number = block.count(Attribute::Number)?.unwrap_or(1);
        let pitch = if number > 1 {
            required(Attribute::Pitch)?
        } else {
            block.length(Attribute::Pitch, units)?.unwrap_or(0.0)
        };

        Ok(Self {
            kind,
            dimensions,
            number,
            x_offset: block.length(Attribute::XOffset, units)?.unwrap_or(0.0),
            y_offset: block.length(Attribute::YOffset, units)?.unwrap_or(0.0),
            pitch,
        })
    }

    /// Widest extent of one conductor
    fn conductor_width(&self) -> f64 {
        match self.dimensions {
            Dimensions::Rectangle { width, .. } => width,
            Dimensions::Trapezoid { top, bottom, .. } => top.max(bottom),
            Dimensions::Circle { diameter } => diameter,
        }
    }

    /// `xOff + (n - 1) * pitch + width`
    fn total_width(&self) -> f64 {
        self.x_offset + (self.number - 1) as f64 * self.pitch + self.conductor_width()
    }

    fn build(&self, name: &str, conductivity: f64, builder: &mut ModelBuilder) {
        match self.dimensions {
            Dimensions::Rectangle { width, height } => {
                builder.track_feature(width);
                builder.track_feature(height);
            }
            Dimensions::Trapezoid { top, bottom, .. } => {
                builder.track_feature(top);
                builder.track_feature(bottom);
            }
            Dimensions::Circle { diameter } => builder.track_feature(diameter),
        }
        builder.track_set_width(self.total_width());

        let is_ground = name.starts_with(GROUND_PREFIX);
        let cy = builder.y_cursor + self.y_offset;

        for k in 0..self.number {
            let cx = self.x_offset + k as f64 * self.pitch;
            let shape = self.shape_at(cx, cy);
            for (a, b) in shape.edges() {
                builder.track_feature(a.distance(&b));
            }

            if is_ground {
                builder.add_ground_wire(shape);
            } else {
                builder.add_signal(name, self.kind.type_letter(), conductivity, shape);
            }
        }
        debug!(
            name,
            kind = ?self.kind,
            number = self.number,
            ground = is_ground,
            "conductor set"
        );
    }

    fn shape_at(&self, cx: f64, cy: f64) -> Shape {
        match self.dimensions {
            Dimensions::Rectangle { width, height } => Shape::Rectangle {
                x0: cx,
                y0: cy,
                x1: cx + width,
                y1: cy + height,
            },
            Dimensions::Circle { diameter } => {
                let radius = diameter * 0.5;
                Shape::Circle {
                    cx: cx + radius,
                    cy: cy + radius,
                    radius,
                }
            }
            Dimensions::Trapezoid { top, bottom, height } => {
                let center = cx + top.max(bottom) * 0.5;
                let points = vec![
                    Point::new(center - bottom * 0.5, cy),
                    Point::new(center - top * 0.5, cy + height),
                    Point::new(center + top * 0.5, cy + height),
                    Point::new(center + bottom * 0.5, cy),
                ];
                let perimeter = points
                    .iter()
                    .zip(points.iter().cycle().skip(1))
                    .map(|(a, b)| a.distance(b))
                    .sum();
                Shape::Polygon { points, perimeter }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MIL: f64 = METERS_PER_MIL;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1e-9)
    }

    /// Feed every directive in `text` through a block reader
    fn run(text: &str, options: &ParseOptions) -> Result<ModelBuilder> {
        let mut source = LineSource::new(Cursor::new(text.to_string()));
        let mut builder = ModelBuilder::new();
        let mut reader = BlockReader::new(&mut source, LengthUnit::Mils, options);
        while let Some(line) = reader.next_line()? {
            if let Some(directive) = classify(&line) {
                reader.parse_directive(directive, &line, &mut builder)?;
            }
        }
        Ok(builder)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("GroundPlane G1 \\"), Some(Directive::GroundPlane));
        assert_eq!(classify("DielectricLayer D1"), Some(Directive::DielectricLayer));
        assert_eq!(
            classify("RectangleDielectric RD1"),
            Some(Directive::RectangleDielectric)
        );
        assert_eq!(classify("CircleConductors c1"), Some(Directive::Conductors));
        assert_eq!(classify("  -width 5"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_attribute_lookup() {
        assert_eq!(Attribute::lookup("-xOffset"), Some(Attribute::XOffset));
        assert_eq!(Attribute::lookup("-topWidth"), Some(Attribute::TopWidth));
        assert_eq!(Attribute::lookup("-width"), Some(Attribute::Width));
        assert_eq!(Attribute::lookup("-permeability"), None);
        assert_eq!(Attribute::Pitch.flag(), "-pitch");
    }

    #[test]
    fn test_block_values_and_units() {
        let mut block = AttributeBlock::default();
        block
            .insert_line("-thickness 10 mils -permittivity 4.2 -yOffset -2 \\", 1)
            .unwrap();
        assert_eq!(block.raw(Attribute::Thickness), Some("10 mils"));
        assert_eq!(block.float(Attribute::Permittivity).unwrap(), Some(4.2));
        assert!(close(
            block.length(Attribute::YOffset, LengthUnit::Mils).unwrap().unwrap(),
            -2.0 * MIL
        ));
        assert!(block.raw(Attribute::Width).is_none());
    }

    #[test]
    fn test_flag_without_value() {
        let mut block = AttributeBlock::default();
        let err = block.insert_line("-width \\", 7).unwrap_err();
        assert!(matches!(
            err,
            XsctnError::InvalidValue {
                attribute: "-width",
                line: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_ground_plane_block_is_consumed() {
        let text = "GroundPlane G1 \\\n  -thickness 0.0 \\\n  -xOffset 0\nGroundPlane G2\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        assert_eq!(builder.ground_planes, 2);
        assert!(builder.dielectrics.is_empty());
    }

    #[test]
    fn test_dielectric_requires_ground_plane() {
        let err = run("DielectricLayer D1 -thickness 10\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, XsctnError::MissingGroundPlane { line: 1 }));
    }

    #[test]
    fn test_dielectric_missing_thickness() {
        let err = run(
            "GroundPlane G1\nDielectricLayer D1 \\\n -permittivity 4\n",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            XsctnError::MissingAttribute {
                attribute: "-thickness",
                line: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_eof_inside_block() {
        let err = run(
            "GroundPlane G1\nDielectricLayer D1 \\\n -thickness 10 \\\n",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            XsctnError::PrematureEof {
                context: "DielectricLayer",
                line: 3
            }
        ));
    }

    #[test]
    fn test_dielectric_stack() {
        let text = "GroundPlane G1\n\
                    DielectricLayer D1 \\\n -thickness 10 \\\n -lossTangent 0.02 \\\n -permittivity 4.2\n\
                    DielectricLayer D2 -thickness 5mils\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        assert_eq!(builder.dielectrics.len(), 2);
        let d1 = &builder.dielectrics[0];
        assert_eq!(d1.constant, 4.2);
        assert_eq!(d1.loss_tangent, 0.02);
        assert!(close(d1.y1, 10.0 * MIL));
        let d2 = &builder.dielectrics[1];
        assert_eq!(d2.constant, 1.0);
        assert!(close(d2.y0, 10.0 * MIL));
        assert!(close(builder.y_cursor, 15.0 * MIL));
        assert!(close(builder.minimum_dimension.unwrap(), 5.0 * MIL));
    }

    #[test]
    fn test_rectangle_conductor_replication() {
        let text = "RectangleConductors sig \\\n -width 5 \\\n -height 2 \\\n -number 3 \\\n -pitch 10 \\\n -xOffset 1 \\\n -yOffset 0\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        assert_eq!(builder.signals.len(), 3);
        for (k, signal) in builder.signals.iter().enumerate() {
            assert_eq!(signal.name, format!("sigR{}", k));
            assert_eq!(signal.conductivity, DEFAULT_CONDUCTIVITY);
            match signal.shape {
                Shape::Rectangle { x0, y0, x1, y1 } => {
                    assert!(close(x0, (1.0 + 10.0 * k as f64) * MIL));
                    assert!(close(x1 - x0, 5.0 * MIL));
                    assert_eq!(y0, 0.0);
                    assert!(close(y1, 2.0 * MIL));
                }
                ref other => panic!("unexpected shape {:?}", other),
            }
        }
        assert!(close(builder.total_width, (1.0 + 2.0 * 10.0 + 5.0) * MIL));
        assert!(close(builder.minimum_dimension.unwrap(), 2.0 * MIL));
    }

    #[test]
    fn test_conductors_sit_on_stack() {
        let text = "GroundPlane G1\nDielectricLayer D1 -thickness 10\n\
                    CircleConductors wire -diameter 4 -yOffset 1 -conductivity 1e6siemens/meter\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        let signal = &builder.signals[0];
        assert_eq!(signal.name, "wireC0");
        assert_eq!(signal.conductivity, 1e6);
        match signal.shape {
            Shape::Circle { cx, cy, radius } => {
                assert!(close(cx, 2.0 * MIL));
                assert!(close(cy, 13.0 * MIL));
                assert!(close(radius, 2.0 * MIL));
            }
            ref other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_trapezoid_points_and_perimeter() {
        let text = "TrapezoidConductors t -topWidth 2 -bottomWidth 4 -height 1 -xOffset 0\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        let Shape::Polygon {
            ref points,
            perimeter,
        } = builder.signals[0].shape
        else {
            panic!("expected polygon");
        };
        assert_eq!(builder.signals[0].name, "tT0");
        assert_eq!(points.len(), 4);
        assert!(close(points[0].x, 0.0));
        assert!(close(points[1].x, 1.0 * MIL));
        assert!(close(points[2].x, 3.0 * MIL));
        assert!(close(points[3].x, 4.0 * MIL));
        assert!(close(points[1].y, 1.0 * MIL));
        let slant = (2.0f64).sqrt() * MIL;
        assert!(close(perimeter, 2.0 * MIL + 4.0 * MIL + 2.0 * slant));
        // height is not a tracked feature for trapezoids
        assert!(close(builder.minimum_dimension.unwrap(), slant));
        assert!(close(builder.total_width, 4.0 * MIL));
    }

    #[test]
    fn test_ground_wire_classification() {
        let text = "RectangleConductors ground -width 5 -height 1 -conductivity 1e7\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        assert!(builder.signals.is_empty());
        assert_eq!(builder.ground_wires.len(), 1);
        assert_eq!(builder.ground_wires[0].conductivity, 0.0);
        assert!(builder.ground_wires[0].name.is_empty());
    }

    #[test]
    fn test_missing_conductor_dimension() {
        let err = run(
            "RectangleConductors sig -width 5 -xOffset 0\n",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            XsctnError::MissingAttribute {
                attribute: "-height",
                ..
            }
        ));
    }

    #[test]
    fn test_pitch_required_for_sets() {
        let err = run(
            "CircleConductors c -diameter 1 -number 2\n",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            XsctnError::MissingAttribute {
                attribute: "-pitch",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_count_rejected() {
        let err = run(
            "CircleConductors c -diameter 1 -number 0\n",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            XsctnError::InvalidValue {
                attribute: "-number",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_primitive_consumes_block() {
        let text = "PolygonConductors p \\\n -width 1\nCircleConductors c -diameter 1\n";
        let mut source = LineSource::new(Cursor::new(text.to_string()));
        let mut builder = ModelBuilder::new();
        let mut reader = BlockReader::new(&mut source, LengthUnit::Mils, &ParseOptions::default());

        let line = reader.next_line().unwrap().unwrap();
        let err = reader
            .parse_directive(Directive::Conductors, &line, &mut builder)
            .unwrap_err();
        assert!(matches!(err, XsctnError::InvalidPrimitive { ref name, line: 1 } if name == "p"));

        let line = reader.next_line().unwrap().unwrap();
        assert!(line.starts_with("CircleConductors"));
    }

    #[test]
    fn test_rectangle_dielectric_legacy_layout() {
        let text = "RectangleDielectric RD -width 2 -height 1 -number 3 -pitch 5 -xOffset 1 -yOffset 4\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        assert_eq!(builder.dielectrics.len(), 3);
        for layer in &builder.dielectrics {
            assert!(close(layer.x0, 1.0 * MIL));
            assert!(close(layer.x1, 3.0 * MIL));
            assert_eq!(layer.y0, 0.0);
        }
        assert_eq!(builder.y_cursor, 0.0);
    }

    #[test]
    fn test_rectangle_dielectric_pitched_layout() {
        let text = "RectangleDielectric RD -width 2 -height 1 -number 3 -pitch 5 -xOffset 1 -yOffset 4\n";
        let options = ParseOptions::new().with_replica_layout(ReplicaLayout::Pitched);
        let builder = run(text, &options).unwrap();
        let xs: Vec<f64> = builder.dielectrics.iter().map(|d| d.x0 / MIL).collect();
        assert!(close(xs[0], 1.0) && close(xs[1], 6.0) && close(xs[2], 11.0));
        assert!(close(builder.dielectrics[0].y0, 4.0 * MIL));
        assert_eq!(builder.y_cursor, 0.0);
    }

    #[test]
    fn test_non_positive_dimensions_rejected() {
        let cases = [
            ("GroundPlane G1\nDielectricLayer D1 -thickness -5\n", "-thickness"),
            ("RectangleDielectric r -width 2 -height 0\n", "-height"),
            ("RectangleConductors s -width 0 -height 1\n", "-width"),
            ("RectangleConductors s -width 1 -height -1\n", "-height"),
            (
                "TrapezoidConductors t -topWidth 1 -bottomWidth 0 -height 1\n",
                "-bottomWidth",
            ),
            ("CircleConductors c -diameter -2\n", "-diameter"),
        ];
        for (text, flag) in cases {
            let err = run(text, &ParseOptions::default()).unwrap_err();
            assert!(
                matches!(err, XsctnError::InvalidValue { attribute, .. } if attribute == flag),
                "{:?} for {:?}",
                err,
                text
            );
        }
    }

    #[test]
    fn test_offsets_and_pitch_stay_signed() {
        let text = "RectangleConductors s -width 1 -height 1 -number 2 \
                    -pitch -3 -xOffset -1 -yOffset -2\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        let Shape::Rectangle { x0, y0, .. } = builder.signals[1].shape else {
            panic!("expected rectangle");
        };
        assert!(close(x0, -4.0 * MIL));
        assert!(close(y0, -2.0 * MIL));
        assert!(builder.minimum_dimension.unwrap() > 0.0);
    }

    #[test]
    fn test_missing_offsets_default_to_zero() {
        let text = "GroundPlane G1\nDielectricLayer D1 -thickness 3\n\
                    RectangleConductors s -width 2 -height 1\n";
        let builder = run(text, &ParseOptions::default()).unwrap();
        let Shape::Rectangle { x0, y0, .. } = builder.signals[0].shape else {
            panic!("expected rectangle");
        };
        assert_eq!(x0, 0.0);
        assert!(close(y0, 3.0 * MIL));
    }

    #[test]
    fn test_eof_inside_every_block_kind() {
        let cases = [
            ("GroundPlane G1 \\\n -thickness 0 \\\n", "GroundPlane"),
            (
                "RectangleDielectric r \\\n -width 2 \\\n",
                "RectangleDielectric",
            ),
            ("CircleConductors c \\\n -diameter 2 \\\n", "Conductors"),
            (
                "TrapezoidConductors t \\\n -topWidth 1 \\\n",
                "Conductors",
            ),
        ];
        for (text, directive) in cases {
            let err = run(text, &ParseOptions::default()).unwrap_err();
            assert!(
                matches!(
                    err,
                    XsctnError::PrematureEof { context, line: 2 } if context == directive
                ),
                "{:?} for {:?}",
                err,
                text
            );
        }
    }
}
