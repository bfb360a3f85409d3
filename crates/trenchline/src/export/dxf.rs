//! DXF export of a profile scene.
//!
//! Writes DXF R12 in world units (metres, station along X, elevation along
//! Y) with one layer per profile element:
//! - `GROUND`, `PIPE-INVERT`, `PIPE-CROWN` lines
//! - `EXCAVATION` line (dashed)
//! - `STRUCTURES` shafts and symbols
//! - `ANNOTATIONS` text
//!
//! Every entity carries a handle from a caller-owned [`HandleAllocator`], so
//! the same scene and allocator state always produce the same file.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::{Label, LabelKind, TextAlign};
use crate::error::Result;
use crate::geometry::{ExcavationLine, Scene, StructureGlyph};
use crate::model::StructureKind;
use crate::types::{Point2D, Polyline};

/// First handle handed out to entities. Table records use fixed handles below it.
pub const FIRST_ENTITY_HANDLE: u32 = 0x100;

/// Monotonic source of DXF entity handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    /// Allocator starting at [`FIRST_ENTITY_HANDLE`].
    pub fn new() -> Self {
        Self {
            next: FIRST_ENTITY_HANDLE,
        }
    }

    /// Allocator starting at `first`, raised to [`FIRST_ENTITY_HANDLE`] if lower.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: first.max(FIRST_ENTITY_HANDLE),
        }
    }

    /// Hand out the next handle.
    pub fn next_handle(&mut self) -> u32 {
        let h = self.next;
        self.next += 1;
        h
    }

    /// Handle the next call to [`next_handle`](Self::next_handle) returns.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// DXF representation of a handle (upper-case hex).
    pub fn hex(handle: u32) -> String {
        format!("{:X}", handle)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Drawing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Ground surface.
    Ground,
    /// Pipe invert.
    PipeInvert,
    /// Top of pipe.
    PipeCrown,
    /// Excavation bottom.
    Excavation,
    /// Manholes and chambers.
    Structures,
    /// Text.
    Annotations,
}

impl Layer {
    /// All layers in table order.
    pub const ALL: [Layer; 6] = [
        Layer::Ground,
        Layer::PipeInvert,
        Layer::PipeCrown,
        Layer::Excavation,
        Layer::Structures,
        Layer::Annotations,
    ];

    /// Layer name.
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Ground => "GROUND",
            Layer::PipeInvert => "PIPE-INVERT",
            Layer::PipeCrown => "PIPE-CROWN",
            Layer::Excavation => "EXCAVATION",
            Layer::Structures => "STRUCTURES",
            Layer::Annotations => "ANNOTATIONS",
        }
    }

    /// AutoCAD colour index.
    pub fn color_index(&self) -> u8 {
        match self {
            Layer::Ground => 6,
            Layer::PipeInvert => 1,
            Layer::PipeCrown => 14,
            Layer::Excavation => 30,
            Layer::Structures => 5,
            Layer::Annotations => 7,
        }
    }

    fn linetype(&self) -> &'static str {
        match self {
            Layer::Excavation => "DASHED",
            _ => "CONTINUOUS",
        }
    }
}

/// Sizes and content switches for DXF output, in drawing units (m).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DxfOptions {
    /// Body text height.
    pub text_height: f64,
    /// Manhole symbol radius.
    pub manhole_radius: f64,
    /// Chamber symbol width.
    pub chamber_width: f64,
    /// Chamber symbol height.
    pub chamber_height: f64,
    /// Which excavation line(s) to write.
    pub excavation_line: ExcavationLine,
    /// Write axis tick labels and axis titles.
    pub include_ticks: bool,
}

impl Default for DxfOptions {
    fn default() -> Self {
        Self {
            text_height: 0.15,
            manhole_radius: 0.3,
            chamber_width: 0.6,
            chamber_height: 0.5,
            excavation_line: ExcavationLine::Design,
            include_ticks: false,
        }
    }
}

enum Entity {
    Polyline {
        layer: Layer,
        points: Vec<Point2D>,
        closed: bool,
    },
    Line {
        layer: Layer,
        start: Point2D,
        end: Point2D,
    },
    Circle {
        layer: Layer,
        center: Point2D,
        radius: f64,
    },
    Text {
        layer: Layer,
        position: Point2D,
        height: f64,
        text: String,
        align: TextAlign,
    },
}

/// Group-code/value pair writer over an in-memory buffer.
struct DxfWriter {
    out: String,
}

impl DxfWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn pair(&mut self, code: u16, value: impl Display) {
        self.out.push_str(&format!("{}\n{}\n", code, value));
    }

    fn coord(&mut self, code: u16, value: f64) {
        self.pair(code, format!("{:.6}", value));
    }

    fn point(&mut self, x_code: u16, p: Point2D) {
        self.coord(x_code, p.x);
        self.coord(x_code + 10, p.y);
    }

    fn begin_section(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn end_section(&mut self) {
        self.pair(0, "ENDSEC");
    }
}

// Fixed handles of table objects
const LTYPE_TABLE_HANDLE: u32 = 0x05;
const LAYER_TABLE_HANDLE: u32 = 0x02;
const LTYPE_RECORD_HANDLE: u32 = 0x14;
const LAYER_RECORD_HANDLE: u32 = 0x20;

/// Writes scenes as DXF.
#[derive(Debug, Clone, Default)]
pub struct CadExporter {
    options: DxfOptions,
}

impl CadExporter {
    /// Exporter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter with explicit options.
    pub fn with_options(options: DxfOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &DxfOptions {
        &self.options
    }

    /// Export with a fresh handle allocator.
    pub fn export(&self, scene: &Scene) -> String {
        self.export_with(scene, &mut HandleAllocator::new())
    }

    /// Export, drawing entity handles from `handles`.
    pub fn export_with(&self, scene: &Scene, handles: &mut HandleAllocator) -> String {
        let entities = self.collect_entities(scene);
        let numbered: Vec<(u32, Entity)> = entities
            .into_iter()
            .map(|e| (handles.next_handle(), e))
            .collect();
        log::debug!(
            "exporting {} DXF entities, next handle {:X}",
            numbered.len(),
            handles.peek()
        );

        let mut w = DxfWriter::new();
        write_header(&mut w, handles.peek());
        write_tables(&mut w);

        w.begin_section("ENTITIES");
        for (handle, entity) in &numbered {
            write_entity(&mut w, *handle, entity);
        }
        w.end_section();

        w.pair(0, "EOF");
        w.out
    }

    /// Export into any writer.
    pub fn export_to_writer(&self, scene: &Scene, writer: &mut impl Write) -> Result<()> {
        writer.write_all(self.export(scene).as_bytes())?;
        Ok(())
    }

    /// Export to a file at `path`.
    pub fn export_to_file(&self, scene: &Scene, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.export_to_writer(scene, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn collect_entities(&self, scene: &Scene) -> Vec<Entity> {
        let open = |layer, line: &Polyline| Entity::Polyline {
            layer,
            points: line.points.clone(),
            closed: false,
        };
        let mut entities = vec![
            open(Layer::Ground, &scene.ground),
            open(Layer::PipeInvert, &scene.invert),
            open(Layer::PipeCrown, &scene.crown),
        ];
        if self.options.excavation_line != ExcavationLine::Structures {
            entities.push(open(Layer::Excavation, &scene.excavation));
        }
        if self.options.excavation_line != ExcavationLine::Design {
            entities.push(open(Layer::Excavation, &scene.structure_excavation));
        }

        for glyph in &scene.glyphs {
            self.glyph_entities(glyph, &mut entities);
        }

        for label in &scene.labels {
            let is_axis = matches!(
                label.kind,
                LabelKind::StationTick | LabelKind::ElevationTick | LabelKind::AxisTitle
            );
            // Glyph tags are screen-only
            if label.kind == LabelKind::GlyphTag || (is_axis && !self.options.include_ticks) {
                continue;
            }
            entities.push(self.text_entity(label));
        }
        entities
    }

    fn glyph_entities(&self, glyph: &StructureGlyph, out: &mut Vec<Entity>) {
        let top = Point2D::new(glyph.station, glyph.cover_level);
        out.push(Entity::Line {
            layer: Layer::Structures,
            start: top,
            end: Point2D::new(glyph.station, glyph.excavation_level),
        });
        match glyph.kind {
            StructureKind::Manhole => out.push(Entity::Circle {
                layer: Layer::Structures,
                center: top,
                radius: self.options.manhole_radius,
            }),
            StructureKind::InspectionChamber => {
                let (hw, hh) = (
                    self.options.chamber_width / 2.0,
                    self.options.chamber_height / 2.0,
                );
                out.push(Entity::Polyline {
                    layer: Layer::Structures,
                    points: vec![
                        top.offset(-hw, -hh),
                        top.offset(hw, -hh),
                        top.offset(hw, hh),
                        top.offset(-hw, hh),
                    ],
                    closed: true,
                });
            }
        }
    }

    fn text_entity(&self, label: &Label) -> Entity {
        let height = match label.kind {
            LabelKind::Title => self.options.text_height * 1.5,
            LabelKind::StructureName
            | LabelKind::Slope
            | LabelKind::PipeSize
            | LabelKind::TotalLength => self.options.text_height * 1.2,
            _ => self.options.text_height,
        };
        Entity::Text {
            layer: Layer::Annotations,
            position: label
                .anchor
                .offset(label.offset.x * height, label.offset.y * height),
            height,
            text: text_value(&label.text),
            align: label.align,
        }
    }
}

/// Group-1 text value: one line, with the diameter sign as `%%c`.
fn text_value(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .replace('Ø', "%%c")
}

fn write_header(w: &mut DxfWriter, handle_seed: u32) {
    w.begin_section("HEADER");
    w.pair(9, "$ACADVER");
    w.pair(1, "AC1009"); // DXF R12
    w.pair(9, "$HANDLING");
    w.pair(70, 1);
    w.pair(9, "$HANDSEED");
    w.pair(5, HandleAllocator::hex(handle_seed));
    w.pair(9, "$INSUNITS");
    w.pair(70, 6); // Metres
    w.end_section();
}

fn write_tables(w: &mut DxfWriter) {
    w.begin_section("TABLES");

    w.pair(0, "TABLE");
    w.pair(2, "LTYPE");
    w.pair(5, HandleAllocator::hex(LTYPE_TABLE_HANDLE));
    w.pair(70, 2);
    let ltypes: [(&str, &str, &[f64]); 2] = [
        ("CONTINUOUS", "Solid line", &[]),
        ("DASHED", "Dashed __ __ __", &[0.5, -0.25]),
    ];
    for (i, (name, description, pattern)) in ltypes.iter().enumerate() {
        w.pair(0, "LTYPE");
        w.pair(5, HandleAllocator::hex(LTYPE_RECORD_HANDLE + i as u32));
        w.pair(2, name);
        w.pair(70, 0);
        w.pair(3, description);
        w.pair(72, 65);
        w.pair(73, pattern.len());
        w.coord(40, pattern.iter().map(|d| d.abs()).sum());
        for dash in pattern.iter() {
            w.coord(49, *dash);
        }
    }
    w.pair(0, "ENDTAB");

    w.pair(0, "TABLE");
    w.pair(2, "LAYER");
    w.pair(5, HandleAllocator::hex(LAYER_TABLE_HANDLE));
    w.pair(70, Layer::ALL.len());
    for (i, layer) in Layer::ALL.iter().enumerate() {
        w.pair(0, "LAYER");
        w.pair(5, HandleAllocator::hex(LAYER_RECORD_HANDLE + i as u32));
        w.pair(2, layer.name());
        w.pair(70, 0);
        w.pair(62, layer.color_index());
        w.pair(6, layer.linetype());
    }
    w.pair(0, "ENDTAB");

    w.end_section();
}

fn write_entity(w: &mut DxfWriter, handle: u32, entity: &Entity) {
    let begin = |w: &mut DxfWriter, kind: &str, layer: Layer| {
        w.pair(0, kind);
        w.pair(5, HandleAllocator::hex(handle));
        w.pair(8, layer.name());
    };
    match entity {
        Entity::Polyline {
            layer,
            points,
            closed,
        } => {
            begin(w, "LWPOLYLINE", *layer);
            w.pair(90, points.len());
            w.pair(70, if *closed { 1 } else { 0 });
            for p in points {
                w.point(10, *p);
            }
        }
        Entity::Line { layer, start, end } => {
            begin(w, "LINE", *layer);
            w.point(10, *start);
            w.point(11, *end);
        }
        Entity::Circle {
            layer,
            center,
            radius,
        } => {
            begin(w, "CIRCLE", *layer);
            w.point(10, *center);
            w.coord(40, *radius);
        }
        Entity::Text {
            layer,
            position,
            height,
            text,
            align,
        } => {
            begin(w, "TEXT", *layer);
            w.point(10, *position);
            w.coord(40, *height);
            w.pair(1, text);
            let horizontal = match align {
                TextAlign::Left => 0,
                TextAlign::Center => 1,
                TextAlign::Right => 2,
            };
            w.pair(72, horizontal);
            // Alignment point; middle vertical alignment
            w.point(11, *position);
            w.pair(73, 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::model::{ExcavationDepths, PipelineParameters, Structure};

    fn scene() -> Scene {
        let depths = ExcavationDepths::default();
        let structures = vec![
            Structure::new(1, StructureKind::Manhole, "MH-1", 0.0, 601.0, 602.5, &depths),
            Structure::new(
                2,
                StructureKind::InspectionChamber,
                "IC Chamber 10",
                35.0,
                600.64,
                602.14,
                &depths,
            ),
        ];
        GeometryBuilder::new()
            .build(&PipelineParameters::default(), &structures)
            .unwrap()
    }

    /// (code, value) pairs of the ENTITIES section.
    fn entity_pairs(dxf: &str) -> Vec<(String, String)> {
        let lines: Vec<&str> = dxf.lines().collect();
        let pairs: Vec<(String, String)> = lines
            .chunks(2)
            .map(|c| (c[0].to_string(), c[1].to_string()))
            .collect();
        let start = pairs
            .iter()
            .position(|(c, v)| c == "2" && v == "ENTITIES")
            .unwrap();
        let end = pairs[start..]
            .iter()
            .position(|(c, v)| c == "0" && v == "ENDSEC")
            .unwrap()
            + start;
        pairs[start + 1..end].to_vec()
    }

    fn entity_handles(dxf: &str) -> Vec<u32> {
        entity_pairs(dxf)
            .iter()
            .filter(|(c, _)| c == "5")
            .map(|(_, v)| u32::from_str_radix(v, 16).unwrap())
            .collect()
    }

    #[test]
    fn test_handle_allocator() {
        let mut h = HandleAllocator::new();
        assert_eq!(h.next_handle(), 0x100);
        assert_eq!(h.next_handle(), 0x101);
        assert_eq!(h.peek(), 0x102);
        assert_eq!(HandleAllocator::starting_at(3).peek(), FIRST_ENTITY_HANDLE);
        assert_eq!(HandleAllocator::starting_at(0x2A0).next_handle(), 0x2A0);
        assert_eq!(HandleAllocator::hex(0x1ab), "1AB");
    }

    #[test]
    fn test_export_structure() {
        let dxf = CadExporter::new().export(&scene());
        assert!(dxf.starts_with("0\nSECTION\n2\nHEADER\n"));
        assert!(dxf.contains("AC1009"));
        assert!(dxf.ends_with("0\nEOF\n"));
        for layer in Layer::ALL {
            assert!(dxf.contains(&format!("2\n{}\n", layer.name())));
        }
        assert!(dxf.contains("CIRCLE"));
        assert!(dxf.contains("%%c200mm"));
        assert!(!dxf.contains('Ø'));
    }

    #[test]
    fn test_handles_unique_and_monotonic() {
        let dxf = CadExporter::new().export(&scene());
        let handles = entity_handles(&dxf);
        assert!(!handles.is_empty());
        assert_eq!(handles[0], FIRST_ENTITY_HANDLE);
        for w in handles.windows(2) {
            assert_eq!(w[1], w[0] + 1);
        }
        let seed = format!("$HANDSEED\n5\n{:X}\n", handles.last().unwrap() + 1);
        assert!(dxf.contains(&seed));
    }

    #[test]
    fn test_export_deterministic() {
        let s = scene();
        let exporter = CadExporter::new();
        assert_eq!(exporter.export(&s), exporter.export(&s));
    }

    #[test]
    fn test_caller_owned_allocator_continues() {
        let s = scene();
        let exporter = CadExporter::new();
        let mut handles = HandleAllocator::new();
        let first = exporter.export_with(&s, &mut handles);
        let second = exporter.export_with(&s, &mut handles);
        let a = entity_handles(&first);
        let b = entity_handles(&second);
        assert_eq!(b[0], a.last().unwrap() + 1);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_entity_layers() {
        let dxf = CadExporter::new().export(&scene());
        let pairs = entity_pairs(&dxf);
        let count = |kind: &str, layer: &str| {
            pairs
                .windows(3)
                .filter(|w| w[0].1 == kind && w[0].0 == "0" && w[2].1 == layer)
                .count()
        };
        assert_eq!(count("LWPOLYLINE", "GROUND"), 1);
        assert_eq!(count("LWPOLYLINE", "EXCAVATION"), 1);
        assert_eq!(count("LINE", "STRUCTURES"), 2);
        assert_eq!(count("CIRCLE", "STRUCTURES"), 1);
        assert_eq!(count("LWPOLYLINE", "STRUCTURES"), 1);
        assert!(count("TEXT", "ANNOTATIONS") > 0);
    }

    #[test]
    fn test_ticks_optional() {
        let s = scene();
        let plain = CadExporter::new().export(&s);
        let with_ticks = CadExporter::with_options(DxfOptions {
            include_ticks: true,
            ..Default::default()
        })
        .export(&s);
        assert!(!plain.contains("\n33m\n"));
        assert!(with_ticks.contains("\n33m\n"));
        assert!(!plain.contains("Chainage (m)"));
        assert!(with_ticks.contains("\n1\nChainage (m)\n"));
        assert!(with_ticks.contains("\n1\nLevel (m)\n"));
    }

    #[test]
    fn test_export_to_writer() {
        let s = scene();
        let mut buf = Vec::new();
        CadExporter::new().export_to_writer(&s, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), CadExporter::new().export(&s));
    }

    #[test]
    fn test_multiline_names_keep_pairs_aligned() {
        let depths = ExcavationDepths::default();
        let structures = vec![
            Structure::new(1, StructureKind::Manhole, "MH\n1", 0.0, 601.0, 602.5, &depths),
            Structure::new(
                2,
                StructureKind::InspectionChamber,
                "IC\r\n10",
                35.0,
                600.64,
                602.14,
                &depths,
            ),
        ];
        let params = PipelineParameters {
            section_name: "Line\tA\nB".into(),
            ..Default::default()
        };
        let scene = GeometryBuilder::new().build(&params, &structures).unwrap();
        let dxf = CadExporter::new().export(&scene);

        for (i, code) in dxf.lines().step_by(2).enumerate() {
            assert!(
                code.trim().parse::<u16>().is_ok(),
                "pair {} has group code {:?}",
                i,
                code
            );
        }
        assert!(dxf.contains("\n1\nMH 1\n"));
        assert!(dxf.contains("IC  10"));
    }

    #[test]
    fn test_text_value() {
        assert_eq!(text_value("Ø200mm"), "%%c200mm");
        assert_eq!(text_value("a\r\nb"), "a  b");
    }
}
