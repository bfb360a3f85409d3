//! Project files: a whole profile section and its output settings in TOML.
//!
//! ```toml
//! [parameters]
//! start_invert = 601.0
//! end_invert = 600.64
//! total_length = 35.0
//! pipe_diameter = 200.0
//! station_interval = 3.0
//!
//! [[structures]]
//! kind = "manhole"
//! name = "MH-1"
//! station = 0.0
//! invert_level = 601.0
//! cover_level = 602.5
//! ```
//!
//! Everything except `[parameters]` and the structure list is optional.
//! With `derive_parameters = true` at the top of the file, the inverts,
//! length and section name are taken from the first and last structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::export::dxf::{CadExporter, DxfOptions};
use crate::geometry::{BuildOptions, GeometryBuilder, Scene};
use crate::mapper::DeviceRect;
use crate::model::{PipelineParameters, Structure, StructureKind, StructureSet};
use crate::render::{RenderStyle, SceneRenderer};

/// One `[[structures]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEntry {
    /// Explicit id; assigned in file order when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Structure kind.
    #[serde(alias = "type")]
    pub kind: StructureKind,
    /// Display name.
    pub name: String,
    /// Station (m).
    pub station: f64,
    /// Invert level (m).
    pub invert_level: f64,
    /// Cover level (m).
    pub cover_level: f64,
    /// Excavation level (m); derived from the kind's default depth when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excavation_level: Option<f64>,
    /// Display colour; the kind's default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// `[render]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Target surface.
    pub device: DeviceRect,
    /// Drawing style.
    pub style: RenderStyle,
}

/// A complete project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Take inverts, length and section name from the end structures.
    #[serde(default)]
    pub derive_parameters: bool,
    /// Gradient parameters.
    pub parameters: PipelineParameters,
    /// Structures along the section.
    #[serde(default)]
    pub structures: Vec<StructureEntry>,
    /// Geometry options.
    #[serde(default)]
    pub build: BuildOptions,
    /// Screen rendering settings.
    #[serde(default)]
    pub render: RenderSettings,
    /// CAD export settings.
    #[serde(default)]
    pub dxf: DxfOptions,
}

impl ProjectFile {
    /// Read and parse a project file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("loading project {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse a project from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validated structures with ids and excavation levels filled in.
    pub fn structure_set(&self) -> Result<StructureSet> {
        let depths = &self.parameters.excavation_depths;
        let mut taken: Vec<u32> = self.structures.iter().filter_map(|e| e.id).collect();
        let mut next_id = 1;
        let mut structures = Vec::with_capacity(self.structures.len());

        for entry in &self.structures {
            let id = match entry.id {
                Some(id) => id,
                None => {
                    while taken.contains(&next_id) {
                        next_id += 1;
                    }
                    taken.push(next_id);
                    next_id
                }
            };
            if structures.iter().any(|s: &Structure| s.id == id) {
                return Err(ProfileError::InvalidStructure {
                    id,
                    reason: "duplicate id".into(),
                });
            }

            let mut s = Structure::new(
                id,
                entry.kind,
                entry.name.clone(),
                entry.station,
                entry.invert_level,
                entry.cover_level,
                depths,
            );
            if let Some(level) = entry.excavation_level {
                s = s.with_excavation_level(level);
            }
            if let Some(color) = &entry.color {
                s = s.with_color(color.clone());
            }
            structures.push(s);
        }

        StructureSet::from_structures(structures)
    }

    /// Parameters used for the scene, derived from the structures when
    /// `derive_parameters` is set.
    pub fn effective_parameters(&self, set: &StructureSet) -> Result<PipelineParameters> {
        let mut params = self.parameters.clone();
        if self.derive_parameters {
            params.derive_from(set.as_slice())?;
        }
        Ok(params)
    }

    /// Validate the project and build its scene.
    pub fn build_scene(&self) -> Result<Scene> {
        let set = self.structure_set()?;
        let params = self.effective_parameters(&set)?;
        GeometryBuilder::with_options(self.build).build(&params, set.as_slice())
    }

    /// Renderer configured from `[render]`.
    pub fn renderer(&self) -> SceneRenderer {
        SceneRenderer::with_style(self.render.style.clone())
    }

    /// Exporter configured from `[dxf]`.
    pub fn exporter(&self) -> CadExporter {
        CadExporter::with_options(self.dxf.clone())
    }
}
