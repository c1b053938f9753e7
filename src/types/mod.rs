//! Shared types used throughout the library.

mod axes;
mod material;
mod mesh;

pub use axes::AxisConvention;
pub use material::{Material, RenderMode};
pub use mesh::Mesh;

#[cfg(test)]
pub(crate) use mesh::fixtures;

use crate::error::Result;
use crate::scene::{MaterialId, Node, NodeId, Scene};
use glam::{Mat4, Vec2, Vec3};
use std::borrow::Cow;

/// Where a mesh came from in the scene.
#[derive(Debug, Clone, Copy)]
pub struct MeshSource<'a> {
    pub scene: &'a Scene,
    pub node: NodeId,
}

impl<'a> MeshSource<'a> {
    pub fn node(&self) -> &'a Node {
        self.scene.node(self.node)
    }

    /// Materials of the node's renderer, one per submesh. The mesh renderer
    /// wins over the skinned renderer.
    pub fn material_ids(&self) -> &'a [MaterialId] {
        let node = self.node();
        if let Some(renderer) = &node.renderer {
            &renderer.materials
        } else if let Some(skinned) = &node.skinned {
            &skinned.materials
        } else {
            &[]
        }
    }
}

/// A mesh ready for export: geometry, placement in the world, and an
/// optional back-reference used for naming and materials.
#[derive(Debug, Clone)]
pub struct MeshInfo<'a> {
    transform: Mat4,
    mesh: Cow<'a, Mesh>,
    source: Option<MeshSource<'a>>,
}

impl<'a> MeshInfo<'a> {
    /// Validates the mesh so that exporters can index it freely.
    pub fn new(mesh: Cow<'a, Mesh>, transform: Mat4, source: Option<MeshSource<'a>>) -> Result<Self> {
        mesh.validate()?;
        Ok(Self {
            transform,
            mesh,
            source,
        })
    }

    /// A standalone mesh placed at the origin.
    pub fn from_mesh(mesh: &'a Mesh) -> Result<Self> {
        Self::new(Cow::Borrowed(mesh), Mat4::IDENTITY, None)
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn source(&self) -> Option<&MeshSource<'a>> {
        self.source.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.mesh.name
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.mesh.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.mesh.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.mesh.uvs
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.mesh.triangles()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl Iterator<Item = Vec3>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for p in points {
            bounds = Some(match bounds {
                Some(b) => Self::new(b.min.min(p), b.max.max(p)),
                None => Self::new(p, p),
            });
        }
        bounds
    }

    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}
