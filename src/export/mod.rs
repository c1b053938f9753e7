//! Mesh export formats.
//!
//! Every format implements [`MeshExporter`]: meshes are fed one at a time
//! through [`MeshExporter::export_mesh`] and the output is finalized by
//! [`MeshExporter::close`]. [`SceneTraversal`] walks a scene hierarchy and
//! decides which meshes reach the exporter.

pub mod counting;
pub mod gltf;
pub mod method;
pub mod obj;
pub mod schematic;
pub mod settings;
pub mod stl;
pub mod svg;
pub mod traversal;

pub use counting::CountingExporter;
pub use gltf::GlbExporter;
pub use method::{ExportMethod, ExportMethodRegistry, ExporterFactory};
pub use obj::ObjExporter;
pub use schematic::SchematicExporter;
pub use settings::ExportSettings;
pub use stl::{read_stl, StlExporter, StlMesh};
pub use svg::SvgExporter;
pub use traversal::SceneTraversal;

use crate::error::Result;
use crate::types::MeshInfo;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// A sink for meshes.
pub trait MeshExporter {
    fn settings(&self) -> &ExportSettings;

    /// Write one mesh.
    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()>;

    /// Finish the output. Calling it more than once has no further effect.
    fn close(&mut self) -> Result<()>;
}

/// Create `path` for writing, creating missing parent directories first.
pub(crate) fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    log::debug!("Writing {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}

/// Close an exporter from `Drop`, where errors can only be logged.
pub(crate) fn close_on_drop<E: MeshExporter + ?Sized>(exporter: &mut E) {
    if let Err(e) = exporter.close() {
        log::error!(
            "Failed to close {} export to {}: {}",
            exporter.settings().method().name(),
            exporter.settings().destination().display(),
            e
        );
    }
}
