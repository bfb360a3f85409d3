#![warn(missing_docs)]

//! trenchline: longitudinal pipeline profiles for excavation surveying
//!
//! Turns a pipeline section (start/end invert, length, pipe size) and the
//! manholes and inspection chambers along it into a [`Scene`]: ground,
//! invert, crown and excavation polylines, structure glyphs and labels.
//! The scene is then drawn as backend-agnostic [`DrawCommand`]s or written
//! to DXF.
//!
//! # Example
//!
//! ```rust
//! use trenchline::{
//!     CadExporter, DeviceRect, ExcavationDepths, GeometryBuilder, PipelineParameters,
//!     SceneRenderer, Structure, StructureKind,
//! };
//!
//! let depths = ExcavationDepths::default();
//! let structures = vec![
//!     Structure::new(1, StructureKind::Manhole, "MH-1", 0.0, 601.0, 602.5, &depths),
//!     Structure::new(2, StructureKind::InspectionChamber, "IC-1", 35.0, 600.64, 602.14, &depths),
//! ];
//! let scene = GeometryBuilder::new()
//!     .build(&PipelineParameters::default(), &structures)
//!     .unwrap();
//!
//! let commands = SceneRenderer::new().render(&scene, DeviceRect::default()).unwrap();
//! let dxf = CadExporter::new().export(&scene);
//! assert!(!commands.is_empty());
//! assert!(dxf.ends_with("EOF\n"));
//! ```

pub mod annotate;
pub mod error;
pub mod export;
pub mod geometry;
pub mod interpolate;
pub mod mapper;
pub mod model;
pub mod project;
pub mod render;
pub mod table;
pub mod types;

pub use annotate::{AnnotationEngine, Label, LabelKind, TextAlign};
pub use error::{ProfileError, Result};
pub use export::{CadExporter, DxfOptions, HandleAllocator};
pub use geometry::{
    BuildOptions, ExcavationLine, GeometryBuilder, GeometryWarning, Sample, Scene, StructureGlyph,
};
pub use interpolate::ProfileInterpolator;
pub use mapper::{CoordinateMapper, DeviceRect};
pub use model::{ExcavationDepths, PipelineParameters, Structure, StructureKind, StructureSet};
pub use project::ProjectFile;
pub use render::{Color, DrawCommand, ExcavationFill, RenderStyle, SceneRenderer, Stroke};
pub use table::{AnalysisRow, AnalysisTable};
pub use types::{Bounds, Point2D, Polyline};
