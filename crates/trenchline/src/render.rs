//! Declarative rendering of a [`Scene`] into device-space draw commands.
//!
//! The renderer does not touch any drawing surface. It emits an ordered list
//! of [`DrawCommand`]s that a canvas, SVG, or raster backend replays.
//!
//! Z-order, back to front:
//! 1. grid and plot border
//! 2. excavation band and excavation line
//! 3. pipe body
//! 4. ground line
//! 5. invert and crown lines
//! 6. structure shafts and glyphs
//! 7. text labels and scale notes

use serde::{Deserialize, Serialize};

use crate::annotate::{elevation_ticks, station_ticks, LabelKind, TextAlign};
use crate::error::Result;
use crate::geometry::{ExcavationLine, Scene, StructureGlyph};
use crate::mapper::{CoordinateMapper, DeviceRect};
use crate::model::StructureKind;
use crate::types::{Point2D, Polyline};

/// An RGBA colour. Serialised as a CSS colour string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Opacity in `[0, 1]`.
    pub a: f64,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque colour.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Colour with opacity.
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let channel = |i: usize, len: usize| {
                let digits = hex.get(i * len..(i + 1) * len)?;
                let v = u8::from_str_radix(digits, 16).ok()?;
                Some(if len == 1 { v * 17 } else { v })
            };
            return match hex.len() {
                3 => Some(Self::rgb(channel(0, 1)?, channel(1, 1)?, channel(2, 1)?)),
                6 => Some(Self::rgb(channel(0, 2)?, channel(1, 2)?, channel(2, 2)?)),
                _ => None,
            };
        }
        let body = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let byte = |p: &str| p.parse::<u8>().ok();
        match parts.as_slice() {
            [r, g, b] => Some(Self::rgb(byte(r)?, byte(g)?, byte(b)?)),
            [r, g, b, a] => {
                let a = a.parse::<f64>().ok()?;
                Some(Self::rgba(byte(r)?, byte(g)?, byte(b)?, a.clamp(0.0, 1.0)))
            }
            _ => None,
        }
    }

    /// CSS representation.
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Color::parse(&s).ok_or_else(|| format!("invalid colour {:?}", s))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_css()
    }
}

/// Line style for strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Line colour.
    pub color: Color,
    /// Line width (px).
    pub width: f64,
    /// Dash pattern (px); empty for a solid line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dash: Vec<f64>,
}

impl Stroke {
    /// Solid stroke.
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash: Vec::new(),
        }
    }

    /// Dashed stroke.
    pub fn dashed(color: Color, width: f64, dash: Vec<f64>) -> Self {
        Self { color, width, dash }
    }
}

/// One backend-agnostic drawing instruction, in device pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Open polyline.
    StrokePolyline {
        /// Vertices.
        points: Vec<Point2D>,
        /// Line style.
        stroke: Stroke,
    },
    /// Closed filled polygon.
    FillPolygon {
        /// Vertices; the last connects back to the first.
        points: Vec<Point2D>,
        /// Fill colour.
        fill: Color,
        /// Optional outline.
        stroke: Option<Stroke>,
    },
    /// Circle.
    DrawCircle {
        /// Centre.
        center: Point2D,
        /// Radius (px).
        radius: f64,
        /// Optional fill.
        fill: Option<Color>,
        /// Optional outline.
        stroke: Option<Stroke>,
    },
    /// Axis-aligned, optionally rounded rectangle.
    DrawRect {
        /// Top-left corner.
        origin: Point2D,
        /// Width (px).
        width: f64,
        /// Height (px).
        height: f64,
        /// Corner radius (px).
        corner_radius: f64,
        /// Optional fill.
        fill: Option<Color>,
        /// Optional outline.
        stroke: Option<Stroke>,
    },
    /// Text, vertically centred on `position`.
    DrawText {
        /// Anchor point.
        position: Point2D,
        /// Content.
        text: String,
        /// Font size (px).
        font_size: f64,
        /// Bold weight.
        bold: bool,
        /// Text colour.
        color: Color,
        /// Horizontal alignment around the anchor.
        align: TextAlign,
    },
}

/// Lower edge of the filled excavation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcavationFill {
    /// Between the excavation line and the ground line (the trench).
    #[default]
    ToGround,
    /// Between the excavation line and the bottom of the drawing.
    ToLowerBound,
}

/// Colours, widths and sizes used by [`SceneRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Grid lines.
    pub grid: Stroke,
    /// Plot border.
    pub border: Stroke,
    /// Ground line.
    pub ground: Stroke,
    /// Invert line.
    pub invert: Stroke,
    /// Crown line.
    pub crown: Stroke,
    /// Design excavation line.
    pub excavation: Stroke,
    /// Structure-derived excavation line.
    pub structure_excavation: Stroke,
    /// Excavation band fill.
    pub excavation_fill: Color,
    /// Pipe body fill.
    pub pipe_fill: Color,
    /// Lower edge of the excavation band.
    pub excavation_band: ExcavationFill,
    /// Which excavation line to draw.
    pub excavation_line: ExcavationLine,
    /// Manhole symbol radius (px).
    pub manhole_radius: f64,
    /// Chamber symbol width (px).
    pub chamber_width: f64,
    /// Chamber symbol height (px).
    pub chamber_height: f64,
    /// Chamber symbol corner radius (px).
    pub chamber_corner_radius: f64,
    /// Structure shaft width (px).
    pub shaft_width: f64,
    /// Inner outline drawn on glyphs.
    pub glyph_outline: Stroke,
    /// Body text size (px).
    pub font_size: f64,
    /// Title size (px).
    pub title_font_size: f64,
    /// Section annotation size (px).
    pub annotation_font_size: f64,
    /// Level and tick text.
    pub text_color: Color,
    /// Axis tick text.
    pub tick_color: Color,
    /// Title and slope text.
    pub title_color: Color,
    /// Pipe size text.
    pub pipe_text_color: Color,
    /// Total length text.
    pub length_text_color: Color,
    /// Axis caption text.
    pub axis_title_color: Color,
    /// Scale note size (px).
    pub scale_font_size: f64,
    /// Scale note text.
    pub scale_color: Color,
    /// Printed size of one device pixel (mm), for the scale notes.
    pub pixel_size_mm: f64,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            grid: Stroke::solid(Color::rgb(0xe2, 0xe8, 0xf0), 1.0),
            border: Stroke::solid(Color::rgb(0x37, 0x41, 0x51), 2.0),
            ground: Stroke::solid(Color::rgb(0x8b, 0x5c, 0xf6), 3.0),
            invert: Stroke::solid(Color::rgb(0xdc, 0x26, 0x26), 3.0),
            crown: Stroke::solid(Color::rgb(0x99, 0x1b, 0x1b), 2.0),
            excavation: Stroke::dashed(Color::rgb(0xf5, 0x9e, 0x0b), 2.0, vec![5.0, 5.0]),
            structure_excavation: Stroke::dashed(
                Color::rgb(0xb4, 0x53, 0x09),
                1.5,
                vec![2.0, 4.0],
            ),
            excavation_fill: Color::rgba(245, 158, 11, 0.2),
            pipe_fill: Color::rgba(220, 38, 38, 0.7),
            excavation_band: ExcavationFill::default(),
            excavation_line: ExcavationLine::default(),
            manhole_radius: 15.0,
            chamber_width: 24.0,
            chamber_height: 20.0,
            chamber_corner_radius: 3.0,
            shaft_width: 8.0,
            glyph_outline: Stroke::solid(Color::WHITE, 2.0),
            font_size: 11.0,
            title_font_size: 16.0,
            annotation_font_size: 14.0,
            text_color: Color::rgb(0x37, 0x41, 0x51),
            tick_color: Color::rgb(0x64, 0x74, 0x8b),
            title_color: Color::rgb(0x1e, 0x40, 0xaf),
            pipe_text_color: Color::rgb(0xdc, 0x26, 0x26),
            length_text_color: Color::rgb(0x05, 0x96, 0x69),
            axis_title_color: Color::rgb(0x37, 0x41, 0x51),
            scale_font_size: 10.0,
            scale_color: Color::rgb(0x66, 0x66, 0x66),
            pixel_size_mm: 1.0,
        }
    }
}

/// Turns a scene into draw commands.
#[derive(Debug, Clone, Default)]
pub struct SceneRenderer {
    style: RenderStyle,
}

impl SceneRenderer {
    /// Renderer with the default style.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer with a custom style.
    pub fn with_style(style: RenderStyle) -> Self {
        Self { style }
    }

    /// Style in use.
    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Render `scene` onto `device`.
    ///
    /// Fails only if `device` has no drawable area.
    pub fn render(&self, scene: &Scene, device: DeviceRect) -> Result<Vec<DrawCommand>> {
        let mapper = CoordinateMapper::new(scene.bounds, device)?;
        let mut commands = Vec::new();

        self.draw_grid(scene, &mapper, &mut commands);
        self.draw_excavation(scene, &mapper, &mut commands);
        self.draw_pipe_body(scene, &mapper, &mut commands);

        commands.push(stroke(&mapper, &scene.ground, &self.style.ground));
        commands.push(stroke(&mapper, &scene.invert, &self.style.invert));
        commands.push(stroke(&mapper, &scene.crown, &self.style.crown));

        for glyph in &scene.glyphs {
            self.draw_glyph(glyph, &mapper, &mut commands);
        }
        self.draw_labels(scene, &mapper, &mut commands);
        self.draw_scale_notes(&mapper, &mut commands);

        log::debug!("rendered {} draw commands", commands.len());
        Ok(commands)
    }

    fn draw_grid(&self, scene: &Scene, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        let device = mapper.device();
        for station in station_ticks(&scene.bounds, scene.station_interval) {
            let x = mapper.world_to_device_x(station);
            out.push(DrawCommand::StrokePolyline {
                points: vec![Point2D::new(x, device.top()), Point2D::new(x, device.bottom())],
                stroke: self.style.grid.clone(),
            });
        }
        for elevation in elevation_ticks(&scene.bounds) {
            let y = mapper.world_to_device_y(elevation);
            out.push(DrawCommand::StrokePolyline {
                points: vec![Point2D::new(device.left(), y), Point2D::new(device.right(), y)],
                stroke: self.style.grid.clone(),
            });
        }
        out.push(DrawCommand::DrawRect {
            origin: Point2D::new(device.left(), device.top()),
            width: device.plot_width(),
            height: device.plot_height(),
            corner_radius: 0.0,
            fill: None,
            stroke: Some(self.style.border.clone()),
        });
    }

    fn draw_excavation(&self, scene: &Scene, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        let edge = match self.style.excavation_line {
            ExcavationLine::Structures => &scene.structure_excavation,
            ExcavationLine::Design | ExcavationLine::Both => &scene.excavation,
        };
        let (Some(first), Some(last)) = (edge.points.first(), edge.points.last()) else {
            return;
        };

        let mut band: Vec<Point2D> = edge.points.clone();
        match self.style.excavation_band {
            ExcavationFill::ToGround => band.extend(scene.ground.points.iter().rev()),
            ExcavationFill::ToLowerBound => {
                let floor = scene.bounds.min_elevation;
                band.push(Point2D::new(last.x, floor));
                band.push(Point2D::new(first.x, floor));
            }
        }
        out.push(DrawCommand::FillPolygon {
            points: mapper.map_points(&band),
            fill: self.style.excavation_fill,
            stroke: None,
        });

        if self.style.excavation_line != ExcavationLine::Structures {
            out.push(stroke(mapper, &scene.excavation, &self.style.excavation));
        }
        if self.style.excavation_line != ExcavationLine::Design {
            out.push(stroke(
                mapper,
                &scene.structure_excavation,
                &self.style.structure_excavation,
            ));
        }
    }

    fn draw_pipe_body(&self, scene: &Scene, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        let body: Vec<Point2D> = scene
            .invert
            .points
            .iter()
            .chain(scene.crown.points.iter().rev())
            .copied()
            .collect();
        out.push(DrawCommand::FillPolygon {
            points: mapper.map_points(&body),
            fill: self.style.pipe_fill,
            stroke: None,
        });
    }

    fn draw_glyph(&self, glyph: &StructureGlyph, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        let color = self.glyph_color(glyph);
        let x = mapper.world_to_device_x(glyph.station);
        let ground_y = mapper.world_to_device_y(glyph.cover_level);
        let excavation_y = mapper.world_to_device_y(glyph.excavation_level);

        out.push(DrawCommand::StrokePolyline {
            points: vec![Point2D::new(x, ground_y), Point2D::new(x, excavation_y)],
            stroke: Stroke::solid(color, self.style.shaft_width),
        });

        let center = Point2D::new(x, ground_y);
        match glyph.kind {
            StructureKind::Manhole => {
                let r = self.style.manhole_radius;
                out.push(DrawCommand::DrawCircle {
                    center,
                    radius: r,
                    fill: Some(color),
                    stroke: None,
                });
                out.push(DrawCommand::DrawCircle {
                    center,
                    radius: r * 2.0 / 3.0,
                    fill: None,
                    stroke: Some(self.style.glyph_outline.clone()),
                });
            }
            StructureKind::InspectionChamber => {
                let (w, h) = (self.style.chamber_width, self.style.chamber_height);
                out.push(DrawCommand::DrawRect {
                    origin: center.offset(-w / 2.0, -h / 2.0),
                    width: w,
                    height: h,
                    corner_radius: self.style.chamber_corner_radius,
                    fill: Some(color),
                    stroke: None,
                });
                let (iw, ih) = (w * 2.0 / 3.0, h * 0.6);
                out.push(DrawCommand::DrawRect {
                    origin: center.offset(-iw / 2.0, -ih / 2.0),
                    width: iw,
                    height: ih,
                    corner_radius: 0.0,
                    fill: None,
                    stroke: Some(self.style.glyph_outline.clone()),
                });
            }
        }
    }

    fn draw_labels(&self, scene: &Scene, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        for label in &scene.labels {
            let (font_size, bold, color) = match label.kind {
                LabelKind::Title => (self.style.title_font_size, true, self.style.title_color),
                LabelKind::Slope => (self.style.annotation_font_size, true, self.style.title_color),
                LabelKind::PipeSize => {
                    (self.style.annotation_font_size, true, self.style.pipe_text_color)
                }
                LabelKind::TotalLength => {
                    (self.style.annotation_font_size, true, self.style.length_text_color)
                }
                LabelKind::StructureName => {
                    let color = scene
                        .glyphs
                        .iter()
                        .find(|g| g.station == label.anchor.x && g.label == label.text)
                        .map(|g| self.glyph_color(g))
                        .unwrap_or(self.style.text_color);
                    (self.style.annotation_font_size, true, color)
                }
                LabelKind::GlyphTag => (self.style.font_size * 0.8, true, Color::WHITE),
                LabelKind::StationTick | LabelKind::ElevationTick => {
                    (self.style.font_size, false, self.style.tick_color)
                }
                LabelKind::CoverLevel | LabelKind::InvertLevel | LabelKind::ExcavationLevel => {
                    (self.style.font_size, false, self.style.text_color)
                }
                LabelKind::AxisTitle => (self.style.font_size, true, self.style.axis_title_color),
            };
            let anchor = mapper.world_to_device(label.anchor);
            out.push(DrawCommand::DrawText {
                position: anchor.offset(label.offset.x * font_size, -label.offset.y * font_size),
                text: label.text.clone(),
                font_size,
                bold,
                color,
                align: label.align,
            });
        }
    }

    /// `Horizontal Scale: 1:N` and `Vertical Scale: 1:N` above the plot.
    fn draw_scale_notes(&self, mapper: &CoordinateMapper, out: &mut Vec<DrawCommand>) {
        let device = mapper.device();
        let notes = [
            ("Horizontal", mapper.scale_x(), 20.0),
            ("Vertical", mapper.scale_y(), 5.0),
        ];
        for (axis, px_per_m, above) in notes {
            out.push(DrawCommand::DrawText {
                position: Point2D::new(device.left(), device.top() - above),
                text: format!(
                    "{} Scale: 1:{}",
                    axis,
                    scale_denominator(px_per_m, self.style.pixel_size_mm)
                ),
                font_size: self.style.scale_font_size,
                bold: false,
                color: self.style.scale_color,
                align: TextAlign::Left,
            });
        }
    }

    fn glyph_color(&self, glyph: &StructureGlyph) -> Color {
        Color::parse(&glyph.color).unwrap_or(match glyph.kind {
            StructureKind::Manhole => Color::rgb(0x25, 0x63, 0xeb),
            StructureKind::InspectionChamber => Color::rgb(0x05, 0x96, 0x69),
        })
    }
}

/// Drawing scale `1:N` for `px_per_m` device pixels of `pixel_size_mm` each.
fn scale_denominator(px_per_m: f64, pixel_size_mm: f64) -> i64 {
    (1000.0 / (px_per_m * pixel_size_mm)).round() as i64
}

fn stroke(mapper: &CoordinateMapper, line: &Polyline, style: &Stroke) -> DrawCommand {
    DrawCommand::StrokePolyline {
        points: mapper.map_points(&line.points),
        stroke: style.clone(),
    }
}
