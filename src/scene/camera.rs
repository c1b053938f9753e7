//! Pinhole camera used by the wireframe exporter.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A perspective camera looking down its local +Z axis, with +Y up and
/// +X to the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub pixel_width: f32,
    pub pixel_height: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, -10.0),
            rotation: Quat::IDENTITY,
            fov_y_degrees: 60.0,
            near: 0.3,
            far: 1000.0,
            pixel_width: 1024.0,
            pixel_height: 768.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn aspect(&self) -> f32 {
        self.pixel_width / self.pixel_height
    }

    fn half_extents(&self, depth: f32) -> (f32, f32) {
        let half_height = depth * (self.fov_y_degrees.to_radians() * 0.5).tan();
        (half_height * self.aspect(), half_height)
    }

    /// World position of a viewport point (`(0,0)` bottom-left, `(1,1)`
    /// top-right) at `depth` along the view direction.
    pub fn viewport_to_world(&self, vx: f32, vy: f32, depth: f32) -> Vec3 {
        let (half_width, half_height) = self.half_extents(depth);
        self.position
            + self.forward() * depth
            + self.right() * ((vx * 2.0 - 1.0) * half_width)
            + self.up() * ((vy * 2.0 - 1.0) * half_height)
    }

    /// Pixel coordinates (origin bottom-left) and view depth of a world point.
    pub fn world_to_screen(&self, p: Vec3) -> Vec3 {
        let d = p - self.position;
        let depth = d.dot(self.forward());
        let (half_width, half_height) = self.half_extents(depth);
        let x = d.dot(self.right()) / half_width;
        let y = d.dot(self.up()) / half_height;
        Vec3::new(
            (x * 0.5 + 0.5) * self.pixel_width,
            (y * 0.5 + 0.5) * self.pixel_height,
            depth,
        )
    }
}
