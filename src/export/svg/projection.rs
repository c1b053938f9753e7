//! World-to-screen projections for the wireframe exporter.

use crate::scene::PerspectiveCamera;
use crate::types::BoundingBox;
use glam::{Vec2, Vec3};

/// The set of points `x` with `(x - origin) · normal > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfSpace {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl HalfSpace {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self { origin, normal }
    }

    /// Strictly inside; points on the plane are outside.
    pub fn contains(&self, p: Vec3) -> bool {
        (p - self.origin).dot(self.normal) > 0.0
    }

    /// Parameter `t` where `a + t (b - a)` meets the plane, or `+inf` when
    /// the segment is parallel to it.
    pub fn intersect_segment(&self, a: Vec3, b: Vec3) -> f32 {
        let denominator = (b - a).dot(self.normal);
        if denominator == 0.0 {
            f32::INFINITY
        } else {
            (self.origin - a).dot(self.normal) / denominator
        }
    }

    /// Narrow `[tmin, tmax]` to the part of segment `ab` inside this
    /// half-space. An empty range is returned as `tmin >= tmax`.
    pub fn clip(&self, a: Vec3, b: Vec3, tmin: &mut f32, tmax: &mut f32) {
        let a_inside = self.contains(a);
        let b_inside = self.contains(b);
        match (a_inside, b_inside) {
            (false, false) => {
                *tmin = 1.0;
                *tmax = 0.0;
            }
            (true, true) => {}
            (true, false) => *tmax = tmax.min(self.intersect_segment(a, b)),
            (false, true) => *tmin = tmin.max(self.intersect_segment(a, b)),
        }
    }
}

/// Maps world space to screen pixels for the wireframe exporter.
pub trait Projection {
    /// Screen x and y in pixels (origin bottom-left) plus view depth.
    /// Only meaningful for points inside the clip planes.
    fn world_to_screen(&self, world: Vec3) -> Vec3;

    fn camera_position(&self) -> Vec3;

    /// Half-spaces bounding the visible volume.
    fn clip_planes(&self) -> &[HalfSpace];

    fn pixel_width(&self) -> f32;

    fn pixel_height(&self) -> f32;
}

/// Perspective projection through a camera, clipped to its frustum.
#[derive(Debug, Clone)]
pub struct CameraProjection {
    camera: PerspectiveCamera,
    planes: Vec<HalfSpace>,
}

impl CameraProjection {
    pub fn new(camera: PerspectiveCamera) -> Self {
        let forward = camera.forward();
        let mut planes = Vec::with_capacity(6);
        planes.push(HalfSpace::new(camera.viewport_to_world(0.5, 0.5, camera.near), forward));
        planes.push(HalfSpace::new(camera.viewport_to_world(0.5, 0.5, camera.far), -forward));

        const CORNERS: [(f32, f32); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let near = CORNERS.map(|(x, y)| camera.viewport_to_world(x, y, camera.near));
        let far = CORNERS.map(|(x, y)| camera.viewport_to_world(x, y, camera.far));
        for i in 0..4 {
            let point = near[i];
            let normal = (far[i] - point).cross(near[(i + 1) % 4] - point).normalize_or_zero();
            planes.push(HalfSpace::new(point, normal));
        }

        Self { camera, planes }
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }
}

impl Projection for CameraProjection {
    fn world_to_screen(&self, world: Vec3) -> Vec3 {
        self.camera.world_to_screen(world)
    }

    fn camera_position(&self) -> Vec3 {
        self.camera.position
    }

    fn clip_planes(&self) -> &[HalfSpace] {
        &self.planes
    }

    fn pixel_width(&self) -> f32 {
        self.camera.pixel_width
    }

    fn pixel_height(&self) -> f32 {
        self.camera.pixel_height
    }
}

/// Orthographic view straight down the Y axis, fitting the XZ extent of
/// `bounds` into a target rectangle.
#[derive(Debug, Clone, Copy)]
pub struct TopDownProjection {
    world_center: Vec2,
    world_y: f32,
    world_scale: f32,
    screen_center: Vec2,
    screen_scale: f32,
    screen_size: Vec2,
}

impl TopDownProjection {
    /// Target rectangle from `(0, 0)` to `(width, height)`.
    pub fn new(bounds: BoundingBox, width: f32, height: f32) -> Self {
        Self::with_target(bounds, Vec2::ZERO, Vec2::new(width, height))
    }

    pub fn with_target(bounds: BoundingBox, target_min: Vec2, target_max: Vec2) -> Self {
        let center = bounds.center();
        let size = bounds.dimensions();
        let world_scale = size.x.max(size.z);
        let screen_size = target_max - target_min;
        Self {
            world_center: Vec2::new(center.x, center.z),
            world_y: bounds.max.y,
            world_scale: if world_scale > 0.0 { world_scale } else { 1.0 },
            screen_center: (target_min + target_max) * 0.5,
            screen_scale: screen_size.x.max(screen_size.y),
            screen_size,
        }
    }
}

impl Projection for TopDownProjection {
    fn world_to_screen(&self, world: Vec3) -> Vec3 {
        let ratio = self.screen_scale / self.world_scale;
        Vec3::new(
            self.screen_center.x + ratio * (world.x - self.world_center.x),
            self.screen_center.y + ratio * (world.z - self.world_center.y),
            self.world_y - world.y,
        )
    }

    // High above the bounds rather than at infinity.
    fn camera_position(&self) -> Vec3 {
        Vec3::new(self.world_center.x, 1e6, self.world_center.y)
    }

    fn clip_planes(&self) -> &[HalfSpace] {
        &[]
    }

    fn pixel_width(&self) -> f32 {
        self.screen_size.x
    }

    fn pixel_height(&self) -> f32 {
        self.screen_size.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_space_is_strict() {
        let plane = HalfSpace::new(Vec3::ZERO, Vec3::Y);
        assert!(plane.contains(Vec3::new(0.0, 0.1, 0.0)));
        assert!(!plane.contains(Vec3::new(5.0, 0.0, 5.0)));
        assert!(!plane.contains(Vec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_clip_segment() {
        let plane = HalfSpace::new(Vec3::ZERO, Vec3::X);
        let (a, b) = (Vec3::new(-1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0));

        let (mut tmin, mut tmax) = (0.0, 1.0);
        plane.clip(a, b, &mut tmin, &mut tmax);
        assert_eq!((tmin, tmax), (0.25, 1.0));

        let (mut tmin, mut tmax) = (0.0, 1.0);
        plane.clip(b, a, &mut tmin, &mut tmax);
        assert_eq!((tmin, tmax), (0.0, 0.75));

        let (mut tmin, mut tmax) = (0.0, 1.0);
        plane.clip(a, a * 2.0, &mut tmin, &mut tmax);
        assert!(tmin >= tmax);
    }

    #[test]
    fn test_parallel_segment_never_intersects() {
        let plane = HalfSpace::new(Vec3::ZERO, Vec3::X);
        assert_eq!(plane.intersect_segment(Vec3::Y, Vec3::Z), f32::INFINITY);
    }

    #[test]
    fn test_camera_frustum_planes() {
        let camera = PerspectiveCamera::default();
        let projection = CameraProjection::new(camera);
        let planes = projection.clip_planes();
        assert_eq!(planes.len(), 6);

        let inside = camera.viewport_to_world(0.5, 0.5, 10.0);
        assert!(planes.iter().all(|p| p.contains(inside)));

        let behind = camera.position - camera.forward();
        assert!(!planes[0].contains(behind));
        let beyond = camera.viewport_to_world(0.5, 0.5, 2000.0);
        assert!(!planes[1].contains(beyond));
        let left = camera.viewport_to_world(-0.5, 0.5, 10.0);
        assert!(planes[2..].iter().any(|p| !p.contains(left)));
        let above = camera.viewport_to_world(0.5, 1.5, 10.0);
        assert!(planes[2..].iter().any(|p| !p.contains(above)));
    }

    #[test]
    fn test_top_down_maps_bounds_to_target() {
        let bounds = BoundingBox::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 2.0));
        let projection = TopDownProjection::new(bounds, 100.0, 100.0);
        assert_eq!(projection.world_to_screen(Vec3::ZERO), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(
            projection.world_to_screen(Vec3::new(2.0, 1.0, 2.0)),
            Vec3::new(100.0, 100.0, 0.0)
        );
        assert_eq!(projection.camera_position(), Vec3::new(1.0, 1e6, 1.0));
        assert!(projection.clip_planes().is_empty());
        assert_eq!(projection.pixel_height(), 100.0);
    }
}
