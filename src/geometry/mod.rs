//! Geometry primitives used by the voxelizing exporter.

mod box_triangle;
mod octree;

pub use box_triangle::box_triangle_overlap;
pub use octree::{Leaves, Octree, OctreeNode};
