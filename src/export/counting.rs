//! An exporter that writes nothing and only counts what it receives.

use super::{ExportMethod, ExportSettings, MeshExporter};
use crate::error::Result;
use crate::types::{AxisConvention, MeshInfo};

/// The counting method. Its extension is empty, so it cannot be registered.
pub fn method() -> ExportMethod {
    ExportMethod::new("counting", "", "", AxisConvention::LeftHandedYUp, build)
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(CountingExporter::with_settings(settings)))
}

/// Counts meshes, triangles and vertices.
#[derive(Debug, Clone)]
pub struct CountingExporter {
    settings: ExportSettings,
    meshes: usize,
    triangles: usize,
    vertices: usize,
}

impl CountingExporter {
    pub fn new() -> Self {
        Self::with_settings(method().default_settings("", 1.0))
    }

    pub fn with_settings(settings: ExportSettings) -> Self {
        Self {
            settings,
            meshes: 0,
            triangles: 0,
            vertices: 0,
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices
    }
}

impl Default for CountingExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshExporter for CountingExporter {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        self.meshes += 1;
        self.triangles += mesh.triangle_count();
        self.vertices += mesh.vertex_count();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures;

    #[test]
    fn test_counts_accumulate() {
        let cube = fixtures::cube("Box", 1.0);
        let triangle = fixtures::triangle("Tri");
        let mut counter = CountingExporter::new();
        counter.export_mesh(&MeshInfo::from_mesh(&cube).unwrap()).unwrap();
        counter.export_mesh(&MeshInfo::from_mesh(&triangle).unwrap()).unwrap();
        counter.close().unwrap();
        assert_eq!(counter.mesh_count(), 2);
        assert_eq!(counter.triangle_count(), 13);
        assert_eq!(counter.vertex_count(), 11);
    }
}
