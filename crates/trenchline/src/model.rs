//! Survey structures and pipeline parameters.
//!
//! These are the fixed-shape input records of the profile engine. They are
//! validated here, at the data-model boundary, so the geometry stages can
//! assume consistent levels.

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// Minimum number of structures needed to define a profile.
pub const MIN_STRUCTURES: usize = 2;

/// Kind of access structure on the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Manhole, drawn as a circle.
    Manhole,
    /// Inspection chamber, drawn as a rounded rectangle.
    #[serde(alias = "ic_chamber")]
    InspectionChamber,
}

impl StructureKind {
    /// Default excavation depth below invert for this kind (m).
    pub fn default_depth(&self, depths: &ExcavationDepths) -> f64 {
        match self {
            StructureKind::Manhole => depths.manhole,
            StructureKind::InspectionChamber => depths.inspection_chamber,
        }
    }

    /// Short tag printed inside the glyph.
    pub fn tag(&self) -> &'static str {
        match self {
            StructureKind::Manhole => "MH",
            StructureKind::InspectionChamber => "IC",
        }
    }
}

/// Default excavation depth below invert per structure kind, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcavationDepths {
    /// Depth for manholes.
    pub manhole: f64,
    /// Depth for inspection chambers.
    pub inspection_chamber: f64,
}

impl Default for ExcavationDepths {
    fn default() -> Self {
        Self {
            manhole: 0.50,
            inspection_chamber: 0.35,
        }
    }
}

/// A physical access point on the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Stable identifier.
    pub id: u32,
    /// Distance along the pipeline axis (m). May be negative.
    pub station: f64,
    /// Structure kind.
    pub kind: StructureKind,
    /// Display label, not necessarily unique.
    pub name: String,
    /// Pipe bottom elevation at this structure (m).
    pub invert_level: f64,
    /// Ground surface elevation at this structure (m).
    pub cover_level: f64,
    /// Excavation bottom elevation at this structure (m).
    pub excavation_level: f64,
    /// Display accent as a CSS hex colour.
    pub color: String,
}

impl Structure {
    /// Create a structure whose excavation level is derived from its kind.
    pub fn new(
        id: u32,
        kind: StructureKind,
        name: impl Into<String>,
        station: f64,
        invert_level: f64,
        cover_level: f64,
        depths: &ExcavationDepths,
    ) -> Self {
        Self {
            id,
            station,
            kind,
            name: name.into(),
            invert_level,
            cover_level,
            excavation_level: invert_level - kind.default_depth(depths),
            color: default_color(kind).to_string(),
        }
    }

    /// Override the excavation level.
    pub fn with_excavation_level(mut self, level: f64) -> Self {
        self.excavation_level = level;
        self
    }

    /// Override the display colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Recompute the excavation level from the invert and kind.
    ///
    /// Call after editing `invert_level` or `kind`; a manually edited
    /// excavation level is discarded.
    pub fn rederive_excavation(&mut self, depths: &ExcavationDepths) {
        self.excavation_level = self.invert_level - self.kind.default_depth(depths);
    }

    /// Check level invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ProfileError::InvalidStructure {
            id: self.id,
            reason: reason.to_string(),
        };
        if ![
            self.station,
            self.invert_level,
            self.cover_level,
            self.excavation_level,
        ]
        .iter()
        .all(|v| v.is_finite())
        {
            return Err(invalid("station and levels must be finite"));
        }
        if self.cover_level <= self.invert_level {
            return Err(invalid("cover level must be above invert level"));
        }
        if self.excavation_level > self.invert_level {
            return Err(invalid("excavation level must not be above invert level"));
        }
        Ok(())
    }
}

fn default_color(kind: StructureKind) -> &'static str {
    match kind {
        StructureKind::Manhole => "#2563eb",
        StructureKind::InspectionChamber => "#059669",
    }
}

/// Owned collection of structures that keeps the minimum-cardinality rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureSet {
    structures: Vec<Structure>,
    next_id: u32,
}

impl StructureSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            structures: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a set from existing records, validating each one.
    pub fn from_structures(structures: Vec<Structure>) -> Result<Self> {
        for s in &structures {
            s.validate()?;
        }
        let next_id = structures.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        Ok(Self {
            structures,
            next_id,
        })
    }

    /// Add a structure with a fresh id and derived excavation level.
    pub fn add(
        &mut self,
        kind: StructureKind,
        name: impl Into<String>,
        station: f64,
        invert_level: f64,
        cover_level: f64,
        depths: &ExcavationDepths,
    ) -> Result<u32> {
        let id = self.next_id.max(1);
        let structure = Structure::new(id, kind, name, station, invert_level, cover_level, depths);
        structure.validate()?;
        self.structures.push(structure);
        self.next_id = id + 1;
        Ok(id)
    }

    /// Remove a structure, refusing to go below [`MIN_STRUCTURES`].
    pub fn remove(&mut self, id: u32) -> Result<Structure> {
        let index = self
            .structures
            .iter()
            .position(|s| s.id == id)
            .ok_or(ProfileError::UnknownStructure(id))?;
        if self.structures.len() <= MIN_STRUCTURES {
            return Err(ProfileError::InsufficientData(format!(
                "at least {} structures must remain",
                MIN_STRUCTURES
            )));
        }
        Ok(self.structures.remove(index))
    }

    /// Look up a structure by id.
    pub fn get(&self, id: u32) -> Option<&Structure> {
        self.structures.iter().find(|s| s.id == id)
    }

    /// Look up a structure by id for editing.
    ///
    /// Edits are not re-validated until the set is handed to the builder.
    pub fn get_mut(&mut self, id: u32) -> Option<&mut Structure> {
        self.structures.iter_mut().find(|s| s.id == id)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.iter()
    }

    /// Structures as a slice, in insertion order.
    pub fn as_slice(&self) -> &[Structure] {
        &self.structures
    }

    /// Number of structures.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}

/// Gradient description of the whole section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParameters {
    /// Invert at station 0 (m).
    pub start_invert: f64,
    /// Invert at `total_length` (m).
    pub end_invert: f64,
    /// Section length (m).
    pub total_length: f64,
    /// Nominal pipe diameter (mm).
    pub pipe_diameter: f64,
    /// Sampling step (m).
    pub station_interval: f64,
    /// Default excavation depths used when deriving structure levels.
    #[serde(default)]
    pub excavation_depths: ExcavationDepths,
    /// Section title shown on the drawing.
    #[serde(default)]
    pub section_name: String,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            start_invert: 601.000,
            end_invert: 600.640,
            total_length: 35.0,
            pipe_diameter: 200.0,
            station_interval: 3.0,
            excavation_depths: ExcavationDepths::default(),
            section_name: String::new(),
        }
    }
}

impl PipelineParameters {
    /// Gradient in percent, derived from the inverts and length.
    ///
    /// Returns 0 when `total_length` is not positive; such parameters are
    /// rejected by [`validate`](Self::validate).
    pub fn slope(&self) -> f64 {
        if self.total_length > 0.0 {
            (self.start_invert - self.end_invert) / self.total_length * 100.0
        } else {
            0.0
        }
    }

    /// Drop in invert from station 0 to `station` (m).
    pub fn cumulative_drop(&self, station: f64) -> f64 {
        station * self.slope() / 100.0
    }

    /// Gradient invert elevation at `station` (m).
    pub fn invert_at(&self, station: f64) -> f64 {
        self.start_invert - self.cumulative_drop(station)
    }

    /// Pipe diameter in meters.
    pub fn pipe_diameter_m(&self) -> f64 {
        self.pipe_diameter / 1000.0
    }

    /// Top-of-pipe elevation at `station` (m).
    pub fn crown_at(&self, station: f64) -> f64 {
        self.invert_at(station) + self.pipe_diameter_m()
    }

    /// Take the inverts, length and section name from the end structures.
    ///
    /// Structures are ordered by station (ties keep their input order). The
    /// first and last set `start_invert`, `end_invert` and `total_length`,
    /// and the section is named `"<first> - <last>"`.
    pub fn derive_from(&mut self, structures: &[Structure]) -> Result<()> {
        if structures.len() < MIN_STRUCTURES {
            return Err(ProfileError::InsufficientData(format!(
                "at least {} structures are needed to derive parameters",
                MIN_STRUCTURES
            )));
        }
        let mut ordered: Vec<&Structure> = structures.iter().collect();
        ordered.sort_by(|a, b| a.station.total_cmp(&b.station));
        let (first, last) = match (ordered.first(), ordered.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(ProfileError::InsufficientData("no structures".into())),
        };

        self.section_name = format!("{} - {}", first.name, last.name);
        self.start_invert = first.invert_level;
        self.end_invert = last.invert_level;
        self.total_length = last.station - first.station;
        log::debug!(
            "derived parameters from {} to {}: {:.3}m",
            first.name,
            last.name,
            self.total_length
        );
        Ok(())
    }

    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        if ![
            self.start_invert,
            self.end_invert,
            self.total_length,
            self.pipe_diameter,
            self.station_interval,
        ]
        .iter()
        .all(|v| v.is_finite())
        {
            return Err(ProfileError::InvalidParameter(
                "pipeline parameters must be finite".into(),
            ));
        }
        if self.total_length <= 0.0 {
            return Err(ProfileError::InsufficientData(
                "total_length must be positive".into(),
            ));
        }
        if self.station_interval <= 0.0 {
            return Err(ProfileError::InvalidParameter(
                "station_interval must be positive".into(),
            ));
        }
        if self.pipe_diameter < 0.0 {
            return Err(ProfileError::InvalidParameter(
                "pipe_diameter must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_set() -> StructureSet {
        let depths = ExcavationDepths::default();
        let mut set = StructureSet::new();
        set.add(StructureKind::Manhole, "MH-1", 0.0, 601.0, 602.5, &depths)
            .unwrap();
        set.add(
            StructureKind::InspectionChamber,
            "IC Chamber 10",
            35.0,
            600.64,
            602.14,
            &depths,
        )
        .unwrap();
        set
    }

    #[test]
    fn test_slope_derived() {
        let params = PipelineParameters::default();
        assert_relative_eq!(params.slope(), 1.0285714285714285, epsilon = 1e-12);
        assert_relative_eq!(params.invert_at(10.0), 600.8971428571429, epsilon = 1e-9);
        assert_relative_eq!(params.crown_at(0.0), 601.2, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_length_rejected() {
        let params = PipelineParameters {
            total_length: 0.0,
            ..Default::default()
        };
        assert_eq!(params.slope(), 0.0);
        assert!(matches!(
            params.validate(),
            Err(ProfileError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_interval_rejected() {
        let params = PipelineParameters {
            station_interval: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ProfileError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_excavation_derived_by_kind() {
        let set = sample_set();
        let mh = set.get(1).unwrap();
        let ic = set.get(2).unwrap();
        assert_relative_eq!(mh.excavation_level, 600.5, epsilon = 1e-9);
        assert_relative_eq!(ic.excavation_level, 600.29, epsilon = 1e-9);
        assert_eq!(ic.color, "#059669");
    }

    #[test]
    fn test_rederive_after_kind_change() {
        let mut set = sample_set();
        let depths = ExcavationDepths::default();
        let s = set.get_mut(2).unwrap();
        s.kind = StructureKind::Manhole;
        s.rederive_excavation(&depths);
        assert_relative_eq!(s.excavation_level, 600.14, epsilon = 1e-9);
    }

    #[test]
    fn test_remove_keeps_minimum() {
        let mut set = sample_set();
        let err = set.remove(1).unwrap_err();
        assert!(matches!(err, ProfileError::InsufficientData(_)));
        assert_eq!(set.len(), 2);

        let depths = ExcavationDepths::default();
        let id = set
            .add(StructureKind::Manhole, "MH-2", 20.0, 600.8, 602.3, &depths)
            .unwrap();
        assert_eq!(id, 3);
        assert!(set.remove(id).is_ok());
        assert!(matches!(
            set.remove(99),
            Err(ProfileError::UnknownStructure(99))
        ));
    }

    #[test]
    fn test_validate_levels() {
        let depths = ExcavationDepths::default();
        let bad_cover = Structure::new(7, StructureKind::Manhole, "X", 0.0, 601.0, 600.0, &depths);
        assert!(matches!(
            bad_cover.validate(),
            Err(ProfileError::InvalidStructure { id: 7, .. })
        ));

        let bad_exc = Structure::new(8, StructureKind::Manhole, "Y", 0.0, 601.0, 602.0, &depths)
            .with_excavation_level(601.5);
        assert!(bad_exc.validate().is_err());

        let at_invert = Structure::new(9, StructureKind::Manhole, "Z", 0.0, 601.0, 602.0, &depths)
            .with_excavation_level(601.0);
        assert!(at_invert.validate().is_ok());
    }

    #[test]
    fn test_kind_serde_alias() {
        let kind: StructureKind = serde_json::from_str("\"ic_chamber\"").unwrap();
        assert_eq!(kind, StructureKind::InspectionChamber);
        let json = serde_json::to_string(&StructureKind::Manhole).unwrap();
        assert_eq!(json, "\"manhole\"");
    }

    #[test]
    fn test_derive_from_reversed_structures() {
        let depths = ExcavationDepths::default();
        let structures = vec![
            Structure::new(1, StructureKind::InspectionChamber, "IC 10", 35.0, 600.64, 602.14, &depths),
            Structure::new(2, StructureKind::Manhole, "MH-2", 12.0, 600.9, 602.3, &depths),
            Structure::new(3, StructureKind::Manhole, "MH-1", 2.0, 601.0, 602.5, &depths),
        ];
        let mut params = PipelineParameters::default();
        params.derive_from(&structures).unwrap();
        assert_eq!(params.section_name, "MH-1 - IC 10");
        assert_relative_eq!(params.start_invert, 601.0);
        assert_relative_eq!(params.end_invert, 600.64);
        assert_relative_eq!(params.total_length, 33.0);
        assert_eq!(params.pipe_diameter, 200.0);
    }

    #[test]
    fn test_derive_from_needs_two_structures() {
        let depths = ExcavationDepths::default();
        let one = vec![Structure::new(1, StructureKind::Manhole, "MH-1", 0.0, 601.0, 602.5, &depths)];
        let mut params = PipelineParameters::default();
        assert!(matches!(
            params.derive_from(&one),
            Err(ProfileError::InsufficientData(_))
        ));
        assert_eq!(params, PipelineParameters::default());
    }

    #[test]
    fn test_derive_from_equal_stations_keep_order() {
        let set = sample_set();
        let mut structures = set.as_slice().to_vec();
        structures[1].station = 0.0;
        let mut params = PipelineParameters::default();
        params.derive_from(&structures).unwrap();
        assert_eq!(params.section_name, "MH-1 - IC Chamber 10");
        assert_eq!(params.total_length, 0.0);
        assert!(params.validate().is_err());
    }
}
