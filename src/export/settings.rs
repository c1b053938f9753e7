//! Per-export configuration and coordinate conversion.

use super::method::ExportMethod;
use crate::scene::PerspectiveCamera;
use crate::types::AxisConvention;
use glam::{Mat4, Vec3};
use std::path::{Path, PathBuf};

/// Immutable settings for one export. Use the `with_*` methods to derive
/// modified copies.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    method: ExportMethod,
    destination: PathBuf,
    scale: f32,
    axes: AxisConvention,
    camera: Option<PerspectiveCamera>,
}

impl ExportSettings {
    pub fn new(method: ExportMethod, destination: impl Into<PathBuf>, scale: f32, axes: AxisConvention) -> Self {
        Self {
            method,
            destination: destination.into(),
            scale,
            axes,
            camera: None,
        }
    }

    pub fn method(&self) -> &ExportMethod {
        &self.method
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn axes(&self) -> AxisConvention {
        self.axes
    }

    /// Camera for exporters that render a view of the scene.
    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.camera.as_ref()
    }

    pub fn with_method(&self, method: ExportMethod) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    pub fn with_destination(&self, destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..self.clone()
        }
    }

    pub fn with_scale(&self, scale: f32) -> Self {
        Self { scale, ..self.clone() }
    }

    pub fn with_axes(&self, axes: AxisConvention) -> Self {
        Self { axes, ..self.clone() }
    }

    pub fn with_camera(&self, camera: Option<PerspectiveCamera>) -> Self {
        Self {
            camera,
            ..self.clone()
        }
    }

    /// Local point to output space: transform, scale, then axis remap.
    pub fn convert_point(&self, transform: &Mat4, p: Vec3) -> Vec3 {
        self.axes.remap(transform.transform_point3(p) * self.scale)
    }

    /// Local normal to output space: transform as a direction, normalize,
    /// then axis remap. Zero vectors stay zero.
    pub fn convert_normal(&self, transform: &Mat4, n: Vec3) -> Vec3 {
        self.axes.remap(transform.transform_vector3(n).normalize_or_zero())
    }

    /// Reverse the winding for right-handed outputs.
    pub fn convert_triangle(&self, [i0, i1, i2]: [u32; 3]) -> [u32; 3] {
        if self.axes.flips_winding() {
            [i0, i2, i1]
        } else {
            [i0, i1, i2]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::counting;

    fn settings(axes: AxisConvention, scale: f32) -> ExportSettings {
        ExportSettings::new(counting::method(), "out", scale, axes)
    }

    #[test]
    fn test_convert_point() {
        let transform = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(
            settings(AxisConvention::LeftHandedYUp, 2.0).convert_point(&transform, p),
            Vec3::new(4.0, 4.0, 6.0)
        );
        assert_eq!(
            settings(AxisConvention::RightHandedYUp, 1.0).convert_point(&transform, p),
            Vec3::new(2.0, 2.0, -3.0)
        );
        assert_eq!(
            settings(AxisConvention::RightHandedZUp, 1.0).convert_point(&transform, p),
            Vec3::new(2.0, -3.0, 2.0)
        );
    }

    #[test]
    fn test_convert_normal_ignores_translation_and_scale() {
        let transform = Mat4::from_translation(Vec3::splat(5.0)) * Mat4::from_scale(Vec3::splat(3.0));
        let s = settings(AxisConvention::RightHandedZUp, 10.0);
        assert_eq!(s.convert_normal(&transform, Vec3::new(0.0, 0.0, 2.0)), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(s.convert_normal(&transform, Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_convert_triangle() {
        assert_eq!(settings(AxisConvention::LeftHandedYUp, 1.0).convert_triangle([0, 1, 2]), [0, 1, 2]);
        assert_eq!(settings(AxisConvention::RightHandedYUp, 1.0).convert_triangle([0, 1, 2]), [0, 2, 1]);
        assert_eq!(settings(AxisConvention::RightHandedZUp, 1.0).convert_triangle([0, 1, 2]), [0, 2, 1]);
    }

    #[test]
    fn test_with_methods_leave_original_untouched() {
        let original = settings(AxisConvention::LeftHandedYUp, 1.0);
        let changed = original.with_scale(4.0).with_destination("elsewhere");
        assert_eq!(original.scale(), 1.0);
        assert_eq!(original.destination(), Path::new("out"));
        assert_eq!(changed.scale(), 4.0);
        assert_eq!(changed.destination(), Path::new("elsewhere"));
    }
}
