//! Depth-first walk over scene nodes, feeding their meshes to an exporter.

use super::MeshExporter;
use crate::error::Result;
use crate::scene::{NodeId, Scene};
use crate::types::{MeshInfo, MeshSource};
use std::borrow::Cow;
use std::collections::HashSet;

/// Walks node hierarchies and exports each node at most once.
///
/// The visited set survives across [`export`](Self::export) calls, so one
/// traversal can be fed several selections without duplicating meshes.
#[derive(Debug, Default)]
pub struct SceneTraversal {
    stack: Vec<NodeId>,
    visited: HashSet<NodeId>,
}

impl SceneTraversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    /// Export `roots` and everything their markers and children pull in.
    /// Returns the number of meshes handed to the exporter.
    pub fn export(
        &mut self,
        scene: &Scene,
        roots: impl IntoIterator<Item = NodeId>,
        exporter: &mut dyn MeshExporter,
    ) -> Result<usize> {
        self.stack.extend(roots);
        let result = self.drain(scene, exporter);
        if result.is_err() {
            self.stack.clear();
        }
        result
    }

    fn drain(&mut self, scene: &Scene, exporter: &mut dyn MeshExporter) -> Result<usize> {
        let mut exported = 0;
        while let Some(id) = self.stack.pop() {
            if !scene.is_active_in_hierarchy(id) || !self.visited.insert(id) {
                continue;
            }

            let node = scene.node(id);
            let mut export_self = true;
            let mut export_children = true;
            let mut require_renderer = true;
            for marker in &node.markers {
                export_self = marker.export_self;
                export_children = marker.export_children;
                require_renderer = marker.require_renderer;
                self.stack.extend_from_slice(&marker.other_objects);
            }

            if export_children {
                self.stack.extend_from_slice(node.children());
            }
            if export_self {
                exported += export_node(scene, id, require_renderer, exporter)?;
            }
        }
        Ok(exported)
    }
}

/// Export the static mesh, then the skinned mesh, of one node.
fn export_node(scene: &Scene, id: NodeId, require_renderer: bool, exporter: &mut dyn MeshExporter) -> Result<usize> {
    let node = scene.node(id);
    let transform = scene.local_to_world(id);
    let source = Some(MeshSource { scene, node: id });
    let mut exported = 0;

    let rendered = !require_renderer || node.renderer.as_ref().is_some_and(|r| r.enabled);
    match node.mesh_filter {
        Some(mesh) if rendered => {
            let info = MeshInfo::new(Cow::Borrowed(scene.mesh(mesh)), transform, source)?;
            exporter.export_mesh(&info)?;
            exported += 1;
        }
        _ => {}
    }

    if let Some(skinned) = &node.skinned {
        if skinned.enabled || !require_renderer {
            if let Some(baked) = skinned.bake(scene) {
                let info = MeshInfo::new(Cow::Owned(baked?), transform, source)?;
                exporter.export_mesh(&info)?;
                exported += 1;
            }
        }
    }

    if exported == 0 {
        log::trace!("Node '{}' has nothing to export", node.name);
    }
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::CountingExporter;
    use crate::scene::{BoneWeight, ExportMarker, Skin, SkinnedMeshRenderer};
    use crate::types::fixtures;
    use glam::{Mat4, Vec3};

    fn scene_with_cubes(names: &[&str]) -> (Scene, Vec<NodeId>) {
        let mut scene = Scene::new();
        let cube = scene.add_mesh(fixtures::cube("Box", 1.0));
        let ids = names
            .iter()
            .map(|name| {
                let id = scene.add_root(*name);
                scene.set_mesh(id, cube, Vec::new());
                id
            })
            .collect();
        (scene, ids)
    }

    fn run(scene: &Scene, roots: &[NodeId]) -> (usize, CountingExporter) {
        let mut counter = CountingExporter::new();
        let exported = SceneTraversal::new()
            .export(scene, roots.iter().copied(), &mut counter)
            .unwrap();
        (exported, counter)
    }

    #[test]
    fn test_children_are_exported() {
        let (mut scene, ids) = scene_with_cubes(&["Parent"]);
        let child = scene.add_child(ids[0], "Child");
        let cube = scene.node(ids[0]).mesh_filter.unwrap();
        scene.set_mesh(child, cube, Vec::new());

        let (exported, counter) = run(&scene, &ids);
        assert_eq!(exported, 2);
        assert_eq!(counter.triangle_count(), 24);
    }

    #[test]
    fn test_inactive_subtree_is_skipped() {
        let (mut scene, ids) = scene_with_cubes(&["Parent"]);
        let child = scene.add_child(ids[0], "Child");
        let cube = scene.node(ids[0]).mesh_filter.unwrap();
        scene.set_mesh(child, cube, Vec::new());
        scene.node_mut(ids[0]).active = false;

        assert_eq!(run(&scene, &ids).0, 0);
        // Selecting the child directly does not help: it is inactive in the hierarchy.
        assert_eq!(run(&scene, &[child]).0, 0);
    }

    #[test]
    fn test_nodes_are_visited_once() {
        let (scene, ids) = scene_with_cubes(&["A"]);
        let mut counter = CountingExporter::new();
        let mut traversal = SceneTraversal::new();
        assert_eq!(traversal.export(&scene, [ids[0], ids[0]], &mut counter).unwrap(), 1);
        assert_eq!(traversal.export(&scene, [ids[0]], &mut counter).unwrap(), 0);
        assert!(traversal.visited(ids[0]));
        assert_eq!(counter.mesh_count(), 1);
    }

    #[test]
    fn test_disabled_renderer_is_respected_unless_not_required() {
        let (mut scene, ids) = scene_with_cubes(&["A"]);
        scene.node_mut(ids[0]).renderer.as_mut().unwrap().enabled = false;
        assert_eq!(run(&scene, &ids).0, 0);

        scene.node_mut(ids[0]).markers.push(ExportMarker {
            require_renderer: false,
            ..ExportMarker::default()
        });
        assert_eq!(run(&scene, &ids).0, 1);

        // A mesh filter is always needed.
        scene.node_mut(ids[0]).mesh_filter = None;
        assert_eq!(run(&scene, &ids).0, 0);
    }

    #[test]
    fn test_last_marker_wins_but_other_objects_accumulate() {
        let (mut scene, ids) = scene_with_cubes(&["A", "B", "C"]);
        let child = scene.add_child(ids[0], "Child");
        let cube = scene.node(ids[0]).mesh_filter.unwrap();
        scene.set_mesh(child, cube, Vec::new());

        scene.node_mut(ids[0]).markers = vec![
            ExportMarker {
                other_objects: vec![ids[1]],
                ..ExportMarker::default()
            },
            ExportMarker {
                export_self: false,
                export_children: false,
                require_renderer: true,
                other_objects: vec![ids[2]],
            },
        ];

        // A itself and its child are skipped, B and C come along.
        let mut counter = CountingExporter::new();
        let mut traversal = SceneTraversal::new();
        assert_eq!(traversal.export(&scene, [ids[0]], &mut counter).unwrap(), 2);
        assert!(traversal.visited(ids[1]));
        assert!(traversal.visited(ids[2]));
        assert!(!traversal.visited(child));
    }

    #[test]
    fn test_skinned_mesh_is_baked_in_world_space() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(fixtures::triangle("Skin"));
        let id = scene.add_root("Skinned");
        scene.node_mut(id).transform.translation = Vec3::new(0.0, 0.0, 5.0);
        scene.node_mut(id).skinned = Some(SkinnedMeshRenderer {
            enabled: true,
            mesh: Some(mesh),
            skin: Skin {
                bones: vec![Mat4::from_translation(Vec3::X)],
                weights: vec![vec![BoneWeight { bone: 0, weight: 1.0 }]; 3],
            },
            materials: Vec::new(),
        });

        struct Capture(CountingExporter, Vec<Vec3>);
        impl MeshExporter for Capture {
            fn settings(&self) -> &crate::export::ExportSettings {
                self.0.settings()
            }
            fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
                let transform = *mesh.transform();
                self.1
                    .extend(mesh.positions().iter().map(|p| transform.transform_point3(*p)));
                self.0.export_mesh(mesh)
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut capture = Capture(CountingExporter::new(), Vec::new());
        SceneTraversal::new().export(&scene, [id], &mut capture).unwrap();
        assert_eq!(capture.0.mesh_count(), 1);
        assert_eq!(capture.1[0], Vec3::new(1.0, 0.0, 5.0));

        // Disabled skinned renderers only export when not required.
        scene.node_mut(id).skinned.as_mut().unwrap().enabled = false;
        assert_eq!(run(&scene, &[id]).0, 0);
    }

    #[test]
    fn test_exporter_errors_abort() {
        struct Failing(CountingExporter);
        impl MeshExporter for Failing {
            fn settings(&self) -> &crate::export::ExportSettings {
                self.0.settings()
            }
            fn export_mesh(&mut self, _: &MeshInfo<'_>) -> Result<()> {
                Err(crate::error::ExportError::Export("disk full".to_string()))
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let (scene, ids) = scene_with_cubes(&["A", "B"]);
        let mut traversal = SceneTraversal::new();
        let mut failing = Failing(CountingExporter::new());
        assert!(traversal.export(&scene, ids.iter().copied(), &mut failing).is_err());
        assert!(traversal.stack.is_empty());
    }
}
