//! # Mesh Exporters
//!
//! Export the meshes of a scene hierarchy to files.
//!
//! ## Overview
//!
//! A [`Scene`] holds nodes, meshes and materials. Selected nodes are walked
//! by a [`SceneTraversal`], which honors export markers, inactive subtrees
//! and disabled renderers, and feeds each mesh to a [`MeshExporter`].
//! Supported formats:
//!
//! - binary STL
//! - Wavefront OBJ with an MTL material library
//! - wireframe SVG of the silhouette and sharp edges
//! - binary glTF (GLB)
//! - Minecraft `.schematic`, voxelized through an octree
//!
//! ## Quick Start
//!
//! ```ignore
//! use mesh_exporters::{export, ExportMethodRegistry, ExportObject, ExportRequest, SceneDescription};
//!
//! let scene = SceneDescription::from_json(&json)?.into_scene()?;
//! let request = ExportRequest::new("out/model.obj")
//!     .with_objects(scene.roots().map(ExportObject::Node));
//! let report = export(ExportMethodRegistry::global(), &scene, &request)?;
//! println!("{} triangles", report.triangles);
//! ```

pub mod driver;
pub mod error;
pub mod export;
pub mod geometry;
pub mod nbt;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use driver::{
    check_export_is_empty, export, export_all, DestinationPrompt, ExportObject, ExportReport, ExportRequest,
    SelectionExporter,
};
pub use error::{EmptyExport, ExportError, Result};
pub use export::{
    read_stl, CountingExporter, ExportMethod, ExportMethodRegistry, ExportSettings, GlbExporter, MeshExporter,
    ObjExporter, SceneTraversal, SchematicExporter, StlExporter, StlMesh, SvgExporter,
};
pub use scene::{MeshId, NodeId, PerspectiveCamera, Scene, SceneDescription};
pub use types::{AxisConvention, BoundingBox, Material, Mesh, MeshInfo};
