//! Linear blend skinning used to bake skinned meshes into static snapshots.

use crate::error::{ExportError, Result};
use crate::types::Mesh;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Maximum number of bones influencing one vertex.
pub const MAX_INFLUENCES: usize = 4;

/// One bone's influence on a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneWeight {
    pub bone: u32,
    pub weight: f32,
}

/// Bone matrices plus per-vertex weights.
///
/// Each matrix maps the bind-pose mesh into the renderer's local space in
/// the current pose (bone transform times inverse bind pose).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skin {
    pub bones: Vec<Mat4>,
    /// Empty, or one entry per vertex.
    pub weights: Vec<Vec<BoneWeight>>,
}

impl Skin {
    /// Produce a deformed copy of `mesh`. Vertices without weights keep
    /// their bind-pose position.
    pub fn apply(&self, mesh: &Mesh) -> Result<Mesh> {
        let mut baked = mesh.clone();
        if self.weights.is_empty() {
            return Ok(baked);
        }
        if self.weights.len() != mesh.vertex_count() {
            return Err(invalid(mesh, format!(
                "{} weight sets for {} vertices",
                self.weights.len(),
                mesh.vertex_count()
            )));
        }

        for (vertex, influences) in self.weights.iter().enumerate() {
            if influences.len() > MAX_INFLUENCES {
                return Err(invalid(mesh, format!(
                    "vertex {} has {} bone influences",
                    vertex,
                    influences.len()
                )));
            }

            let mut total = 0.0;
            let mut position = Vec3::ZERO;
            let mut normal = Vec3::ZERO;
            for influence in influences {
                let bone = self.bones.get(influence.bone as usize).ok_or_else(|| {
                    invalid(mesh, format!("vertex {} references bone {}", vertex, influence.bone))
                })?;
                total += influence.weight;
                position += bone.transform_point3(mesh.positions[vertex]) * influence.weight;
                if let Some(n) = mesh.normals.get(vertex) {
                    normal += bone.transform_vector3(*n) * influence.weight;
                }
            }

            if total <= f32::EPSILON {
                continue;
            }
            baked.positions[vertex] = position / total;
            if let Some(n) = baked.normals.get_mut(vertex) {
                *n = normal.normalize_or_zero();
            }
        }

        Ok(baked)
    }
}

fn invalid(mesh: &Mesh, reason: String) -> ExportError {
    ExportError::InvalidMesh {
        name: mesh.name.clone(),
        reason,
    }
}
