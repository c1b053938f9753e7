//! JSON scene description.
//!
//! Meshes and materials are declared once by name; nodes nest and refer to
//! them by name, and export markers refer to other nodes by slash path.

use super::{
    ExportMarker, MaterialId, MeshRenderer, NodeId, PerspectiveCamera, Scene, Skin,
    SkinnedMeshRenderer, Transform,
};
use crate::error::{ExportError, Result};
use crate::types::{Material, Mesh};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// Top-level scene document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub nodes: Vec<NodeDescription>,
    pub camera: Option<PerspectiveCamera>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub transform: Transform,
    /// Mesh filter mesh, by name.
    #[serde(default)]
    pub mesh: Option<String>,
    /// Defaults to an enabled renderer without materials when `mesh` is set.
    #[serde(default)]
    pub renderer: Option<RendererDescription>,
    #[serde(default)]
    pub skinned: Option<SkinnedRendererDescription>,
    #[serde(default)]
    pub markers: Vec<MarkerDescription>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererDescription {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinnedRendererDescription {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub skin: Skin,
    #[serde(default)]
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDescription {
    #[serde(default = "default_true")]
    pub export_self: bool,
    #[serde(default = "default_true")]
    pub export_children: bool,
    #[serde(default = "default_true")]
    pub require_renderer: bool,
    /// Slash paths of nodes exported alongside the marked node.
    #[serde(default)]
    pub other_objects: Vec<String>,
}

struct PendingMarker {
    node: NodeId,
    marker: usize,
    paths: Vec<String>,
}

impl SceneDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the scene arena, resolving every name and path reference.
    pub fn into_scene(self) -> Result<Scene> {
        let mut scene = Scene::new();
        scene.set_main_camera(self.camera);

        let mut mesh_ids = HashMap::new();
        for mesh in self.meshes {
            let name = mesh.name.clone();
            let id = scene.add_mesh(mesh);
            if mesh_ids.insert(name.clone(), id).is_some() {
                return Err(ExportError::Scene(format!("duplicate mesh name '{}'", name)));
            }
        }

        let mut material_ids = HashMap::new();
        for material in self.materials {
            let name = material.name.clone();
            let id = scene.add_material(material);
            if material_ids.insert(name.clone(), id).is_some() {
                return Err(ExportError::Scene(format!("duplicate material name '{}'", name)));
            }
        }

        let mut pending = Vec::new();
        let mut stack: Vec<(Option<NodeId>, NodeDescription)> =
            self.nodes.into_iter().rev().map(|n| (None, n)).collect();

        while let Some((parent, desc)) = stack.pop() {
            let NodeDescription {
                name,
                active,
                transform,
                mesh,
                renderer,
                skinned,
                markers,
                children,
            } = desc;

            let id = match parent {
                Some(parent) => scene.add_child(parent, name),
                None => scene.add_root(name),
            };

            let mesh_filter = mesh
                .map(|name| lookup(&mesh_ids, "mesh", &name))
                .transpose()?;
            let renderer = match renderer {
                Some(r) => Some(MeshRenderer {
                    enabled: r.enabled,
                    materials: lookup_all(&material_ids, &r.materials)?,
                }),
                None if mesh_filter.is_some() => Some(MeshRenderer {
                    enabled: true,
                    materials: Vec::new(),
                }),
                None => None,
            };
            let skinned = match skinned {
                Some(s) => Some(SkinnedMeshRenderer {
                    enabled: s.enabled,
                    mesh: s.mesh.map(|name| lookup(&mesh_ids, "mesh", &name)).transpose()?,
                    skin: s.skin,
                    materials: lookup_all(&material_ids, &s.materials)?,
                }),
                None => None,
            };

            let mut node_markers = Vec::with_capacity(markers.len());
            for (index, marker) in markers.into_iter().enumerate() {
                if !marker.other_objects.is_empty() {
                    pending.push(PendingMarker {
                        node: id,
                        marker: index,
                        paths: marker.other_objects,
                    });
                }
                node_markers.push(ExportMarker {
                    export_self: marker.export_self,
                    export_children: marker.export_children,
                    require_renderer: marker.require_renderer,
                    other_objects: Vec::new(),
                });
            }

            let node = scene.node_mut(id);
            node.active = active;
            node.transform = transform;
            node.mesh_filter = mesh_filter;
            node.renderer = renderer;
            node.skinned = skinned;
            node.markers = node_markers;

            for child in children.into_iter().rev() {
                stack.push((Some(id), child));
            }
        }

        for marker in pending {
            let mut targets = Vec::with_capacity(marker.paths.len());
            for path in &marker.paths {
                let target = scene.find_by_path(path).ok_or_else(|| {
                    ExportError::Scene(format!("marker references unknown node '{}'", path))
                })?;
                targets.push(target);
            }
            scene.node_mut(marker.node).markers[marker.marker].other_objects = targets;
        }

        Ok(scene)
    }
}

fn lookup<T: Copy>(ids: &HashMap<String, T>, kind: &str, name: &str) -> Result<T> {
    ids.get(name)
        .copied()
        .ok_or_else(|| ExportError::Scene(format!("unknown {} '{}'", kind, name)))
}

fn lookup_all(ids: &HashMap<String, MaterialId>, names: &[String]) -> Result<Vec<MaterialId>> {
    names.iter().map(|name| lookup(ids, "material", name)).collect()
}
