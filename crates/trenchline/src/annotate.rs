//! Annotation text and placement for a profile scene.
//!
//! Labels are anchored in world coordinates. The offset from the anchor is
//! expressed in text-height units (x right, y up), so the screen renderer and
//! the DXF exporter place the same label consistently at their own scales.

use serde::{Deserialize, Serialize};

use crate::geometry::Scene;
use crate::model::PipelineParameters;
use crate::types::{Bounds, Point2D};

/// Upper limit on ticks per axis.
const MAX_TICKS: usize = 1000;

/// What a label annotates; selects its style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelKind {
    /// Drawing title.
    Title,
    /// Structure display name.
    StructureName,
    /// Short kind tag printed on the glyph.
    GlyphTag,
    /// Ground level at a structure.
    CoverLevel,
    /// Invert level at a structure.
    InvertLevel,
    /// Excavation level at a structure.
    ExcavationLevel,
    /// Gradient annotation.
    Slope,
    /// Pipe diameter annotation.
    PipeSize,
    /// Section length annotation.
    TotalLength,
    /// Station axis tick.
    StationTick,
    /// Elevation axis tick.
    ElevationTick,
    /// Axis caption.
    AxisTitle,
}

/// Horizontal text alignment relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    /// Text starts at the anchor.
    Left,
    /// Text is centred on the anchor.
    Center,
    /// Text ends at the anchor.
    Right,
}

/// A positioned text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Label kind.
    pub kind: LabelKind,
    /// Text content.
    pub text: String,
    /// World anchor point.
    pub anchor: Point2D,
    /// Offset from the anchor in text heights.
    pub offset: Point2D,
    /// Alignment around the anchor.
    pub align: TextAlign,
}

impl Label {
    fn new(kind: LabelKind, text: String, anchor: Point2D, offset: (f64, f64), align: TextAlign) -> Self {
        Self {
            kind,
            text,
            anchor,
            offset: Point2D::new(offset.0, offset.1),
            align,
        }
    }
}

/// Derives labels from parameters and a scene's geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationEngine {
    /// Title printed above the drawing.
    pub title: String,
}

impl Default for AnnotationEngine {
    fn default() -> Self {
        Self {
            title: "PIPELINE PROFILE".into(),
        }
    }
}

impl AnnotationEngine {
    /// Produce all labels for `scene`.
    ///
    /// Order: title, axis ticks, axis titles, per-structure labels in station
    /// order, then section annotations.
    pub fn annotate(&self, params: &PipelineParameters, scene: &Scene) -> Vec<Label> {
        let b = &scene.bounds;
        let mut labels = Vec::new();

        let title = if params.section_name.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, params.section_name)
        };
        labels.push(Label::new(
            LabelKind::Title,
            title,
            Point2D::new(b.mid_station(), b.max_elevation),
            (0.0, 1.5),
            TextAlign::Center,
        ));

        for station in station_ticks(b, scene.station_interval) {
            labels.push(Label::new(
                LabelKind::StationTick,
                format!("{}m", trimmed(station)),
                Point2D::new(station, b.min_elevation),
                (0.0, -1.5),
                TextAlign::Center,
            ));
        }

        let step = elevation_step(b.elevation_span());
        let decimals = step_decimals(step);
        for elevation in elevation_ticks(b) {
            labels.push(Label::new(
                LabelKind::ElevationTick,
                format!("{:.*}m", decimals, elevation),
                Point2D::new(b.min_station, elevation),
                (-0.6, 0.0),
                TextAlign::Right,
            ));
        }

        labels.push(Label::new(
            LabelKind::AxisTitle,
            "Chainage (m)".into(),
            Point2D::new(b.mid_station(), b.min_elevation),
            (0.0, -3.0),
            TextAlign::Center,
        ));
        labels.push(Label::new(
            LabelKind::AxisTitle,
            "Level (m)".into(),
            Point2D::new(b.min_station, b.max_elevation),
            (-0.6, 1.5),
            TextAlign::Right,
        ));

        for g in &scene.glyphs {
            let at = |elevation| Point2D::new(g.station, elevation);
            labels.push(Label::new(
                LabelKind::GlyphTag,
                g.kind.tag().to_string(),
                at(g.cover_level),
                (0.0, 0.0),
                TextAlign::Center,
            ));
            labels.push(Label::new(
                LabelKind::StructureName,
                g.label.clone(),
                at(g.cover_level),
                (0.0, 2.2),
                TextAlign::Center,
            ));
            labels.push(Label::new(
                LabelKind::CoverLevel,
                format!("GL: {:.3}m", g.cover_level),
                at(g.cover_level),
                (1.8, 0.0),
                TextAlign::Left,
            ));
            labels.push(Label::new(
                LabelKind::InvertLevel,
                format!("IL: {:.3}m", g.invert_level),
                at(g.invert_level),
                (1.8, 0.0),
                TextAlign::Left,
            ));
            labels.push(Label::new(
                LabelKind::ExcavationLevel,
                format!("EL: {:.3}m", g.excavation_level),
                at(g.excavation_level),
                (1.8, 0.0),
                TextAlign::Left,
            ));
        }

        let mid = b.mid_station();
        let top_cover = scene
            .glyphs
            .iter()
            .map(|g| g.cover_level)
            .fold(f64::NEG_INFINITY, f64::max);
        let bottom_excavation = scene
            .glyphs
            .iter()
            .map(|g| g.excavation_level)
            .fold(f64::INFINITY, f64::min);

        labels.push(Label::new(
            LabelKind::Slope,
            format!("Slope: {:.3}%", scene.slope_percent),
            Point2D::new(mid, (top_cover + bottom_excavation) / 2.0),
            (0.0, 0.0),
            TextAlign::Center,
        ));
        labels.push(Label::new(
            LabelKind::PipeSize,
            format!("Ø{}mm", trimmed(scene.pipe_diameter_mm)),
            Point2D::new(mid, params.invert_at(mid) + params.pipe_diameter_m() / 2.0),
            (0.8, 0.0),
            TextAlign::Left,
        ));
        labels.push(Label::new(
            LabelKind::TotalLength,
            format!("Total Length: {}m", trimmed(params.total_length)),
            Point2D::new(b.min_station, top_cover),
            (0.0, 3.5),
            TextAlign::Left,
        ));

        labels
    }
}

/// Round grid step for an elevation range: 1, 2 or 5 × 10ᵏ, near `range / 10`.
pub fn elevation_step(range: f64) -> f64 {
    if !(range.is_finite() && range > 0.0) {
        return 1.0;
    }
    let raw = range / 10.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized < 1.5 {
        1.0
    } else if normalized < 3.5 {
        2.0
    } else if normalized < 7.5 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Multiples of `interval` inside the station range.
pub fn station_ticks(bounds: &Bounds, interval: f64) -> Vec<f64> {
    multiples_within(bounds.min_station, bounds.max_station, interval)
}

/// Multiples of [`elevation_step`] inside the elevation range.
pub fn elevation_ticks(bounds: &Bounds) -> Vec<f64> {
    let step = elevation_step(bounds.elevation_span());
    multiples_within(bounds.min_elevation, bounds.max_elevation, step)
}

fn multiples_within(min: f64, max: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0 && min <= max) {
        return Vec::new();
    }
    let eps = step * 1e-9;
    let first = ((min - eps) / step).ceil() as i64;
    let last = ((max + eps) / step).floor() as i64;
    (first..=last)
        .take(MAX_TICKS)
        .map(|k| k as f64 * step)
        .collect()
}

fn step_decimals(step: f64) -> usize {
    (-step.log10().floor()).max(0.0) as usize
}

/// Format with up to three decimals, dropping trailing zeros.
pub(crate) fn trimmed(value: f64) -> String {
    let value = if value.abs() < 5e-4 { 0.0 } else { value };
    let s = format!("{:.3}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
