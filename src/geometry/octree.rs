//! Sparse cubic octree with per-leaf payloads, used for triangle voxelization.

use super::box_triangle::box_triangle_overlap;
use glam::Vec3;

/// A cubic cell: either a leaf carrying a payload or eight equal children.
///
/// Child `i` covers the upper half of the x axis when bit 0 of `i` is set,
/// the upper half of y for bit 1 and of z for bit 2.
#[derive(Debug, Clone)]
pub struct Octree<T> {
    min: Vec3,
    size: f32,
    node: OctreeNode<T>,
}

/// Contents of an octree cell.
#[derive(Debug, Clone)]
pub enum OctreeNode<T> {
    Leaf(T),
    Internal(Box<[Octree<T>; 8]>),
}

impl<T> Octree<T> {
    /// Create a single leaf cell with minimum corner `min` and edge length `size`.
    pub fn new(min: Vec3, size: f32, payload: T) -> Self {
        Self {
            min,
            size,
            node: OctreeNode::Leaf(payload),
        }
    }

    pub fn min_corner(&self) -> Vec3 {
        self.min
    }

    pub fn max_corner(&self) -> Vec3 {
        self.min + Vec3::splat(self.size)
    }

    pub fn center(&self) -> Vec3 {
        self.min + Vec3::splat(self.size * 0.5)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn node(&self) -> &OctreeNode<T> {
        &self.node
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.node, OctreeNode::Leaf(_))
    }

    /// The payload of a leaf, `None` for internal cells.
    pub fn payload(&self) -> Option<&T> {
        match &self.node {
            OctreeNode::Leaf(payload) => Some(payload),
            OctreeNode::Internal(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[Octree<T>; 8]> {
        match &self.node {
            OctreeNode::Leaf(_) => None,
            OctreeNode::Internal(children) => Some(children),
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut [Octree<T>; 8]> {
        match &mut self.node {
            OctreeNode::Leaf(_) => None,
            OctreeNode::Internal(children) => Some(children),
        }
    }

    /// Turn this cell into a leaf with the given payload, dropping any children.
    pub fn set_payload(&mut self, payload: T) {
        self.node = OctreeNode::Leaf(payload);
    }

    /// Collapse the children back into a single leaf.
    pub fn unsplit(&mut self, payload: T) {
        self.set_payload(payload);
    }

    /// Half-open containment: `min <= p < max` on every axis.
    pub fn contains_point(&self, p: Vec3) -> bool {
        let max = self.max_corner();
        p.cmpge(self.min).all() && p.cmplt(max).all()
    }

    /// Index of the child octant containing `p`; points on the center plane
    /// belong to the upper half.
    pub fn octant_index(&self, p: Vec3) -> usize {
        let c = self.center();
        let mut index = 0;
        if p.x >= c.x {
            index |= 1;
        }
        if p.y >= c.y {
            index |= 2;
        }
        if p.z >= c.z {
            index |= 4;
        }
        index
    }

    /// The child containing `p`, or `None` for a leaf.
    pub fn find_child(&self, p: Vec3) -> Option<&Octree<T>> {
        self.children().map(|children| &children[self.octant_index(p)])
    }

    /// The deepest cell containing `p`.
    pub fn find_leaf(&self, p: Vec3) -> &Octree<T> {
        let mut cell = self;
        while let Some(child) = cell.find_child(p) {
            cell = child;
        }
        cell
    }

    /// Bit mask of child octants the triangle's vertices may touch, based
    /// only on which side of each center plane the vertices lie.
    pub fn octants_intersecting_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> u8 {
        let center = self.center();
        let mut sides = [[false; 2]; 3];
        for axis in 0..3 {
            for p in [a, b, c] {
                if p[axis] >= center[axis] {
                    sides[axis][1] = true;
                } else {
                    sides[axis][0] = true;
                }
            }
        }

        let mut mask = 0u8;
        for i in 0..8 {
            let x = sides[0][i & 1];
            let y = sides[1][(i >> 1) & 1];
            let z = sides[2][(i >> 2) & 1];
            if x && y && z {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// Exact box/triangle test against this cell's bounds.
    pub fn does_triangle_intersect(&self, a: Vec3, b: Vec3, c: Vec3) -> bool {
        box_triangle_overlap(self.min, self.max_corner(), a, b, c)
    }

    /// Depth-first iterator over all leaf cells.
    pub fn leaves(&self) -> Leaves<'_, T> {
        Leaves { stack: vec![self] }
    }
}

impl<T: Clone> Octree<T> {
    /// Split a leaf into eight equal leaves carrying `payload`. Internal
    /// cells are left untouched.
    pub fn split(&mut self, payload: T) {
        if !self.is_leaf() {
            return;
        }
        let half = self.size * 0.5;
        let min = self.min;
        let children = std::array::from_fn(|i| {
            let offset = Vec3::new(
                if i & 1 != 0 { half } else { 0.0 },
                if i & 2 != 0 { half } else { 0.0 },
                if i & 4 != 0 { half } else { 0.0 },
            );
            Octree::new(min + offset, half, payload.clone())
        });
        self.node = OctreeNode::Internal(Box::new(children));
    }

    /// Mark every cell of edge length `voxel_size` (or smaller) touched by
    /// the triangle with `voxel`, splitting larger leaves on the way down
    /// and giving newly created cells the `internal` payload.
    pub fn voxelize_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, voxel_size: f32, internal: T, voxel: T) {
        if !self.does_triangle_intersect(a, b, c) {
            return;
        }

        let mut stack: Vec<&mut Octree<T>> = vec![self];
        while let Some(cell) = stack.pop() {
            if cell.size <= voxel_size {
                cell.set_payload(voxel.clone());
                continue;
            }
            if cell.is_leaf() {
                cell.split(internal.clone());
            }
            let mask = cell.octants_intersecting_triangle(a, b, c);
            if let OctreeNode::Internal(children) = &mut cell.node {
                for (i, child) in children.iter_mut().enumerate() {
                    if mask & (1 << i) != 0 {
                        stack.push(child);
                    }
                }
            }
        }
    }
}

/// Iterator returned by [`Octree::leaves`].
pub struct Leaves<'a, T> {
    stack: Vec<&'a Octree<T>>,
}

impl<'a, T> Iterator for Leaves<'a, T> {
    type Item = &'a Octree<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(cell) = self.stack.pop() {
            match &cell.node {
                OctreeNode::Leaf(_) => return Some(cell),
                OctreeNode::Internal(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_children_layout() {
        let mut tree = Octree::new(Vec3::ZERO, 2.0, 0u8);
        tree.split(5);
        let children = tree.children().unwrap();
        for (i, child) in children.iter().enumerate() {
            assert_eq!(child.size(), 1.0);
            assert_eq!(child.payload(), Some(&5));
            let expected = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
            assert_eq!(child.min_corner(), expected);
        }
        assert_eq!(tree.payload(), None);

        tree.unsplit(9);
        assert!(tree.is_leaf());
        assert_eq!(tree.payload(), Some(&9));
    }

    #[test]
    fn test_contains_point_is_half_open() {
        let tree = Octree::new(Vec3::ZERO, 1.0, ());
        assert!(tree.contains_point(Vec3::ZERO));
        assert!(tree.contains_point(Vec3::splat(0.999)));
        assert!(!tree.contains_point(Vec3::new(1.0, 0.5, 0.5)));
        assert!(!tree.contains_point(Vec3::new(-0.1, 0.5, 0.5)));
    }

    #[test]
    fn test_octant_mask() {
        let tree = Octree::new(Vec3::ZERO, 2.0, ());
        // Entirely in the lower x, lower y, lower z octant.
        let mask = tree.octants_intersecting_triangle(
            Vec3::splat(0.1),
            Vec3::new(0.5, 0.1, 0.1),
            Vec3::new(0.1, 0.5, 0.1),
        );
        assert_eq!(mask, 0b0000_0001);

        // Spans both x halves at low y and z.
        let mask = tree.octants_intersecting_triangle(
            Vec3::splat(0.1),
            Vec3::new(1.5, 0.1, 0.1),
            Vec3::new(0.1, 0.5, 0.1),
        );
        assert_eq!(mask, 0b0000_0011);

        // A vertex on the center plane counts as the upper side.
        let mask = tree.octants_intersecting_triangle(Vec3::ONE, Vec3::ONE, Vec3::ONE);
        assert_eq!(mask, 0b1000_0000);
    }

    #[test]
    fn test_find_leaf() {
        let mut tree = Octree::new(Vec3::ZERO, 4.0, 0);
        tree.split(1);
        if let OctreeNode::Internal(children) = &mut tree.node {
            children[7].split(2);
        }
        let leaf = tree.find_leaf(Vec3::splat(3.5));
        assert_eq!(leaf.size(), 1.0);
        assert_eq!(leaf.payload(), Some(&2));
        assert_eq!(tree.find_leaf(Vec3::splat(0.5)).payload(), Some(&1));
        assert_eq!(tree.leaves().count(), 15);
    }

    #[test]
    fn test_voxelize_covers_triangle() {
        let mut tree = Octree::new(Vec3::splat(-8.0), 16.0, false);
        let a = Vec3::new(-3.3, 0.7, 1.1);
        let b = Vec3::new(4.1, -2.6, 0.4);
        let c = Vec3::new(0.9, 3.8, -2.2);
        tree.voxelize_triangle(a, b, c, 1.0, false, true);

        for leaf in tree.leaves().filter(|leaf| leaf.payload() == Some(&true)) {
            assert!(leaf.size() <= 1.0);
        }

        let steps = 24;
        for i in 0..=steps {
            for j in 0..=(steps - i) {
                let u = i as f32 / steps as f32;
                let v = j as f32 / steps as f32;
                let p = a + (b - a) * u + (c - a) * v;
                assert_eq!(tree.find_leaf(p).payload(), Some(&true), "point {:?} not covered", p);
            }
        }
    }

    #[test]
    fn test_voxelize_misses_outside_triangle() {
        let mut tree = Octree::new(Vec3::ZERO, 8.0, false);
        let far = Vec3::splat(100.0);
        tree.voxelize_triangle(far, far + Vec3::X, far + Vec3::Y, 1.0, false, true);
        assert!(tree.is_leaf());
        assert_eq!(tree.payload(), Some(&false));
    }
}
