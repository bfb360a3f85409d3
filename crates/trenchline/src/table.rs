//! Per-station analysis table derived from a scene.

use std::fmt;

use serde::Serialize;

use crate::geometry::{Scene, StructureGlyph};

/// A structure is reported on a row when it lies this close to the station (m).
pub const STRUCTURE_MATCH_TOLERANCE: f64 = 0.1;

/// Structure values reported on a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureReading {
    /// Structure id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Structure invert (m).
    pub invert_level: f64,
    /// Structure cover level (m).
    pub cover_level: f64,
    /// Structure excavation level (m).
    pub excavation_level: f64,
    /// Cover minus excavation (m).
    pub reading: f64,
}

impl From<&StructureGlyph> for StructureReading {
    fn from(g: &StructureGlyph) -> Self {
        Self {
            id: g.id,
            name: g.label.clone(),
            invert_level: g.invert_level,
            cover_level: g.cover_level,
            excavation_level: g.excavation_level,
            reading: g.cover_level - g.excavation_level,
        }
    }
}

/// One sampled station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    /// Station (m).
    pub station: f64,
    /// Gradient invert (m).
    pub invert_level: f64,
    /// Top of pipe (m).
    pub top_of_pipe: f64,
    /// Invert drop since station 0 (m).
    pub cumulative_drop: f64,
    /// Design excavation level (m).
    pub excavation_level: f64,
    /// Interpolated ground level (m).
    pub ground_level: f64,
    /// Ground minus design excavation (m).
    pub excavation_reading: f64,
    /// Ground minus top of pipe (m).
    pub top_of_pipe_reading: f64,
    /// Structure at this station, if any.
    pub structure: Option<StructureReading>,
}

/// Tabular view of a scene, one row per sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisTable {
    /// Rows in station order.
    pub rows: Vec<AnalysisRow>,
}

impl AnalysisTable {
    /// Derive the table from the scene's samples and glyphs.
    pub fn from_scene(scene: &Scene) -> Self {
        let start_invert = scene
            .samples
            .first()
            .map(|s| s.invert_level)
            .unwrap_or_default();

        let rows = scene
            .samples
            .iter()
            .map(|s| AnalysisRow {
                station: s.station,
                invert_level: s.invert_level,
                top_of_pipe: s.top_of_pipe,
                cumulative_drop: start_invert - s.invert_level,
                excavation_level: s.excavation_level,
                ground_level: s.ground_level,
                excavation_reading: s.ground_level - s.excavation_level,
                top_of_pipe_reading: s.ground_level - s.top_of_pipe,
                structure: scene
                    .glyphs
                    .iter()
                    .find(|g| (g.station - s.station).abs() < STRUCTURE_MATCH_TOLERANCE)
                    .map(StructureReading::from),
            })
            .collect();

        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const HEADERS: [&str; 13] = [
    "Station", "Invert", "TopPipe", "Drop", "Excav", "Ground", "ExcRead", "TopRead",
    "Structure", "S.IL", "S.GL", "S.EL", "S.Read",
];

impl fmt::Display for AnalysisTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for h in &HEADERS[..8] {
            write!(f, "{:>10}", h)?;
        }
        write!(f, "  {:<16}", HEADERS[8])?;
        for h in &HEADERS[9..] {
            write!(f, "{:>10}", h)?;
        }
        writeln!(f)?;

        for row in &self.rows {
            for v in [
                row.station,
                row.invert_level,
                row.top_of_pipe,
                row.cumulative_drop,
                row.excavation_level,
                row.ground_level,
                row.excavation_reading,
                row.top_of_pipe_reading,
            ] {
                write!(f, "{:>10.3}", v)?;
            }
            match &row.structure {
                Some(s) => {
                    write!(f, "  {:<16}", s.name)?;
                    for v in [s.invert_level, s.cover_level, s.excavation_level, s.reading] {
                        write!(f, "{:>10.3}", v)?;
                    }
                }
                None => {
                    write!(f, "  {:<16}", "-")?;
                    for _ in 0..4 {
                        write!(f, "{:>10}", "-")?;
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::model::{ExcavationDepths, PipelineParameters, Structure, StructureKind};
    use approx::assert_abs_diff_eq;

    fn table() -> AnalysisTable {
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
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &structures)
            .unwrap();
        AnalysisTable::from_scene(&scene)
    }

    #[test]
    fn test_row_per_sample() {
        let t = table();
        assert_eq!(t.len(), 13);
        let first = &t.rows[0];
        assert_abs_diff_eq!(first.cumulative_drop, 0.0);
        assert_abs_diff_eq!(first.excavation_reading, 602.5 - 600.8, epsilon = 1e-9);
        assert_abs_diff_eq!(first.top_of_pipe_reading, 602.5 - 601.2, epsilon = 1e-9);

        let last = t.rows.last().unwrap();
        assert_abs_diff_eq!(last.cumulative_drop, 0.36, epsilon = 1e-9);
    }

    #[test]
    fn test_structures_matched_within_tolerance() {
        let t = table();
        let matched: Vec<&str> = t
            .rows
            .iter()
            .filter_map(|r| r.structure.as_ref().map(|s| s.name.as_str()))
            .collect();
        assert_eq!(matched, vec!["MH-1", "IC Chamber 10"]);

        let mh = t.rows[0].structure.as_ref().unwrap();
        assert_abs_diff_eq!(mh.reading, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_display_has_header_and_rows() {
        let text = table().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 14);
        assert!(lines[0].contains("Station"));
        assert!(lines[1].contains("MH-1"));
        assert!(lines[2].contains(" - "));
    }
}
