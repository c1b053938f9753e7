//! Error types for the mesh exporters.

use crate::nbt::NbtError;
use std::fmt;
use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error while creating or writing an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The binary tag writer was used out of order.
    #[error("NBT error: {0}")]
    Nbt(#[from] NbtError),

    /// No export method matches the requested name or extension.
    #[error("Unknown export method: {0}")]
    UnknownMethod(String),

    /// Another method is already registered under this extension.
    #[error("Export method already registered for extension: {0}")]
    DuplicateExtension(String),

    /// The method cannot be registered (e.g. it has no extension).
    #[error("Invalid export method: {0}")]
    InvalidMethod(String),

    /// The requested objects contain nothing to write.
    #[error("Nothing to export: {0}")]
    NothingToExport(EmptyExport),

    /// Mesh data is inconsistent (bad indices, mismatched attribute arrays).
    #[error("Invalid mesh '{name}': {reason}")]
    InvalidMesh { name: String, reason: String },

    /// A mesh is too large for an exporter's index encoding.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A binary STL stream could not be parsed.
    #[error("Invalid STL: {0}")]
    InvalidStl(String),

    /// A scene description could not be turned into a scene.
    #[error("Scene error: {0}")]
    Scene(String),

    /// Format-specific export failure.
    #[error("Export error: {0}")]
    Export(String),
}

/// Why an export was judged empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyExport {
    /// No objects were requested at all.
    NoObjects,
    /// Objects were requested but none of them carries a mesh.
    NoMeshes,
    /// Exactly one mesh was found and it has no triangles.
    EmptyMesh,
    /// Several meshes were found and none has any triangles.
    AllMeshesEmpty,
}

impl fmt::Display for EmptyExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            EmptyExport::NoObjects => "there is nothing to export",
            EmptyExport::NoMeshes => "there are objects to export but none has a mesh",
            EmptyExport::EmptyMesh => "the selected mesh is empty",
            EmptyExport::AllMeshesEmpty => "the selected meshes are all empty",
        };
        f.write_str(message)
    }
}
