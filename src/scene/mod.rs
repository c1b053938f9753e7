//! Arena-backed scene hierarchy consumed by the exporters.
//!
//! Nodes, meshes and materials live in flat vectors and refer to each other
//! through copyable ids. Parent and child links are both stored, so the
//! hierarchy can be walked in either direction.

mod camera;
mod description;
mod skinning;

pub use camera::PerspectiveCamera;
pub use description::{
    MarkerDescription, NodeDescription, RendererDescription, SceneDescription,
    SkinnedRendererDescription,
};
pub use skinning::{BoneWeight, Skin};

use crate::error::Result;
use crate::types::{Material, Mesh};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Handle to a node of a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handle to a mesh stored in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

/// Handle to a material stored in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl MeshId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl MaterialId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Local translation, rotation and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Per-node export directives. When a node carries several markers, the
/// last one decides the flags while every marker's extra objects are added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMarker {
    pub export_self: bool,
    pub export_children: bool,
    pub require_renderer: bool,
    /// Nodes exported alongside the marked node.
    pub other_objects: Vec<NodeId>,
}

impl Default for ExportMarker {
    fn default() -> Self {
        Self {
            export_self: true,
            export_children: true,
            require_renderer: true,
            other_objects: Vec::new(),
        }
    }
}

/// Draws the node's mesh filter mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRenderer {
    pub enabled: bool,
    pub materials: Vec<MaterialId>,
}

/// Draws a deformed mesh; exported as a baked snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedMeshRenderer {
    pub enabled: bool,
    pub mesh: Option<MeshId>,
    pub skin: Skin,
    pub materials: Vec<MaterialId>,
}

impl SkinnedMeshRenderer {
    /// Deform the shared mesh with the current bone matrices.
    pub fn bake(&self, scene: &Scene) -> Option<Result<Mesh>> {
        self.mesh.map(|id| self.skin.apply(scene.mesh(id)))
    }
}

/// A scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Locally active; see [`Scene::is_active_in_hierarchy`].
    pub active: bool,
    pub transform: Transform,
    pub markers: Vec<ExportMarker>,
    pub mesh_filter: Option<MeshId>,
    pub renderer: Option<MeshRenderer>,
    pub skinned: Option<SkinnedMeshRenderer>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            active: true,
            transform: Transform::default(),
            markers: Vec::new(),
            mesh_filter: None,
            renderer: None,
            skinned: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The scene: a forest of nodes plus the meshes and materials they use.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<Node>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    main_camera: Option<PerspectiveCamera>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> NodeId {
        self.nodes.push(Node::new(name, None));
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach a mesh filter and an enabled renderer to `node`.
    pub fn set_mesh(&mut self, node: NodeId, mesh: MeshId, materials: Vec<MaterialId>) {
        let node = &mut self.nodes[node.0];
        node.mesh_filter = Some(mesh);
        node.renderer = Some(MeshRenderer {
            enabled: true,
            materials,
        });
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn mesh(&self, id: MeshId) -> &Mesh {
        &self.meshes[id.0]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Nodes without a parent, in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids().filter(|&id| self.nodes[id.0].parent.is_none())
    }

    pub fn main_camera(&self) -> Option<&PerspectiveCamera> {
        self.main_camera.as_ref()
    }

    pub fn set_main_camera(&mut self, camera: Option<PerspectiveCamera>) {
        self.main_camera = camera;
    }

    /// The node and its ancestors, root first.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut lineage = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            lineage.push(parent);
            current = parent;
        }
        lineage.reverse();
        lineage
    }

    /// A node is active in the hierarchy when it and all its ancestors are.
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        self.lineage(id).iter().all(|&n| self.nodes[n.0].active)
    }

    pub fn local_to_world(&self, id: NodeId) -> Mat4 {
        self.lineage(id)
            .iter()
            .fold(Mat4::IDENTITY, |m, &n| m * self.nodes[n.0].transform.matrix())
    }

    /// Slash-separated names from the root down to the node.
    pub fn path(&self, id: NodeId) -> String {
        self.lineage(id)
            .iter()
            .map(|&n| self.nodes[n.0].name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Find a node by its slash path. The first match wins when siblings
    /// share a name.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.trim_matches('/').split('/');
        let first = segments.next()?;
        let mut current = self.roots().find(|&id| self.nodes[id.0].name == first)?;
        for segment in segments {
            current = self.nodes[current.0]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child.0].name == segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    #[test]
    fn test_hierarchy_and_paths() {
        let mut scene = Scene::new();
        let root = scene.add_root("World");
        let arm = scene.add_child(root, "Arm");
        let hand = scene.add_child(arm, "Hand");

        assert_eq!(scene.path(hand), "World/Arm/Hand");
        assert_eq!(scene.find_by_path("World/Arm/Hand"), Some(hand));
        assert_eq!(scene.find_by_path("/World/Arm"), Some(arm));
        assert_eq!(scene.find_by_path("World/Leg"), None);
        assert_eq!(scene.node(arm).children(), &[hand]);
        assert_eq!(scene.roots().collect::<Vec<_>>(), vec![root]);
    }

    #[test]
    fn test_active_in_hierarchy() {
        let mut scene = Scene::new();
        let root = scene.add_root("Root");
        let child = scene.add_child(root, "Child");
        assert!(scene.is_active_in_hierarchy(child));
        scene.node_mut(root).active = false;
        assert!(!scene.is_active_in_hierarchy(child));
        assert!(scene.node(child).active);
    }

    #[test]
    fn test_local_to_world_composes_parents() {
        let mut scene = Scene::new();
        let root = scene.add_root("Root");
        let child = scene.add_child(root, "Child");
        scene.node_mut(root).transform = Transform {
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        scene.node_mut(child).transform = Transform::from_translation(Vec3::new(0.0, 1.0, 0.0));

        let world = scene.local_to_world(child) * Vec3::ZERO.extend(1.0);
        assert_eq!(world.xyz(), Vec3::new(10.0, 2.0, 0.0));
    }
}
