//! Separating-axis overlap test between an axis-aligned box and a triangle.

use glam::Vec3;

/// Returns true if the closed box `[box_min, box_max]` and triangle `abc`
/// share at least one point.
///
/// Tests the 13 candidate axes: the three box face normals, the triangle
/// normal, and the nine cross products of the triangle edges with the
/// coordinate axes. Intervals that only touch count as overlapping, and a
/// degenerate (zero) axis never separates.
pub fn box_triangle_overlap(box_min: Vec3, box_max: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    // Box face normals
    for axis in 0..3 {
        let (lo, hi) = min_max(a[axis], b[axis], c[axis]);
        if lo > box_max[axis] || hi < box_min[axis] {
            return false;
        }
    }

    // Triangle normal: the triangle projects to a single value
    let normal = (b - a).cross(c - a);
    let d = normal.dot(a);
    let (box_lo, box_hi) = project_box(box_min, box_max, normal);
    if d < box_lo || d > box_hi {
        return false;
    }

    let edges = [b - a, c - b, a - c];
    for edge in edges {
        for unit in [Vec3::X, Vec3::Y, Vec3::Z] {
            let axis = edge.cross(unit);
            let (lo, hi) = min_max(axis.dot(a), axis.dot(b), axis.dot(c));
            let (box_lo, box_hi) = project_box(box_min, box_max, axis);
            if lo > box_hi || hi < box_lo {
                return false;
            }
        }
    }

    true
}

fn min_max(x0: f32, x1: f32, x2: f32) -> (f32, f32) {
    (x0.min(x1).min(x2), x0.max(x1).max(x2))
}

/// Project the box onto `axis` by picking, per component, the corner
/// coordinate that minimizes or maximizes the dot product.
fn project_box(box_min: Vec3, box_max: Vec3, axis: Vec3) -> (f32, f32) {
    let mut lo = 0.0f64;
    let mut hi = 0.0f64;
    for i in 0..3 {
        let n = axis[i] as f64;
        let (near, far) = if n >= 0.0 {
            (box_min[i] as f64, box_max[i] as f64)
        } else {
            (box_max[i] as f64, box_min[i] as f64)
        };
        lo += n * near;
        hi += n * far;
    }
    (lo as f32, hi as f32)
}
