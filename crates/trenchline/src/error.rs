//! Error types for profile building and export.

use thiserror::Error;

/// Errors that can occur while building, drawing, or exporting a profile.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Not enough input to define a profile (fewer than two structures,
    /// or a non-positive section length).
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A world or device extent has zero (or negative) size, so no scale
    /// can be derived from it.
    #[error("degenerate bounds: {0}")]
    DegenerateBounds(String),

    /// A pipeline parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A structure record violates its level invariants.
    #[error("invalid structure {id}: {reason}")]
    InvalidStructure {
        /// Identifier of the offending structure.
        id: u32,
        /// Which invariant was violated.
        reason: String,
    },

    /// No structure with the given identifier exists.
    #[error("unknown structure id {0}")]
    UnknownStructure(u32),

    /// IO failure while reading a project or writing an export.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed project file.
    #[error("project file error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
