//! CAD export formats.

pub mod dxf;

pub use dxf::{CadExporter, DxfOptions, HandleAllocator, Layer, FIRST_ENTITY_HANDLE};
