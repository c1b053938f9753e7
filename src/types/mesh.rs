//! Triangle mesh data as handed to the exporters.

use crate::error::{ExportError, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh with optional per-vertex normals and UVs.
///
/// `normals` and `uvs` are either empty (attribute absent) or exactly as
/// long as `positions`. Each submesh is a flat list of index triples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub name: String,
    pub positions: Vec<Vec3>,
    #[serde(default)]
    pub normals: Vec<Vec3>,
    #[serde(default)]
    pub uvs: Vec<Vec2>,
    #[serde(default)]
    pub submeshes: Vec<Vec<u32>>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, position: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        index
    }

    /// Start a new, empty submesh and return its index.
    pub fn add_submesh(&mut self) -> usize {
        self.submeshes.push(Vec::new());
        self.submeshes.len() - 1
    }

    /// Add a triangle to the last submesh, creating one if needed.
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        if self.submeshes.is_empty() {
            self.add_submesh();
        }
        if let Some(indices) = self.submeshes.last_mut() {
            indices.extend_from_slice(&[i0, i1, i2]);
        }
    }

    /// Add a quad (two triangles sharing the `i0`-`i2` diagonal).
    pub fn add_quad(&mut self, i0: u32, i1: u32, i2: u32, i3: u32) {
        self.add_triangle(i0, i1, i2);
        self.add_triangle(i0, i2, i3);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles over all submeshes.
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len() / 3).sum()
    }

    /// A mesh without triangles is empty, even if it has vertices.
    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Triangles of one submesh.
    pub fn submesh_triangles(&self, submesh: usize) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.submeshes
            .get(submesh)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Triangles of all submeshes, in submesh order.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.submeshes
            .iter()
            .flat_map(|s| s.chunks_exact(3).map(|t| [t[0], t[1], t[2]]))
    }

    /// Check index ranges and attribute array lengths.
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        if self.has_normals() && self.normals.len() != count {
            return Err(self.invalid(format!(
                "{} normals for {} positions",
                self.normals.len(),
                count
            )));
        }
        if self.has_uvs() && self.uvs.len() != count {
            return Err(self.invalid(format!("{} uvs for {} positions", self.uvs.len(), count)));
        }
        for (i, indices) in self.submeshes.iter().enumerate() {
            if indices.len() % 3 != 0 {
                return Err(self.invalid(format!(
                    "submesh {} has {} indices, not a multiple of 3",
                    i,
                    indices.len()
                )));
            }
            if let Some(bad) = indices.iter().find(|&&index| index as usize >= count) {
                return Err(self.invalid(format!(
                    "submesh {} references vertex {} of {}",
                    i, bad, count
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> ExportError {
        ExportError::InvalidMesh {
            name: self.name.clone(),
            reason,
        }
    }
}
