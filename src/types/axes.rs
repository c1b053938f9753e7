//! Output coordinate conventions.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Handedness and up axis of an output file.
///
/// Scene data is left-handed with +Y up; exporters remap into the
/// convention their format expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisConvention {
    #[default]
    LeftHandedYUp,
    RightHandedYUp,
    RightHandedZUp,
}

impl AxisConvention {
    pub const ALL: [AxisConvention; 3] = [
        AxisConvention::LeftHandedYUp,
        AxisConvention::RightHandedYUp,
        AxisConvention::RightHandedZUp,
    ];

    /// Map a scene-space vector into this convention.
    pub fn remap(&self, v: Vec3) -> Vec3 {
        match self {
            AxisConvention::LeftHandedYUp => v,
            AxisConvention::RightHandedYUp => Vec3::new(v.x, v.y, -v.z),
            AxisConvention::RightHandedZUp => Vec3::new(v.x, -v.z, v.y),
        }
    }

    /// Map a vector in this convention back to scene space.
    pub fn invert(&self, v: Vec3) -> Vec3 {
        match self {
            AxisConvention::LeftHandedYUp => v,
            AxisConvention::RightHandedYUp => Vec3::new(v.x, v.y, -v.z),
            AxisConvention::RightHandedZUp => Vec3::new(v.x, v.z, -v.y),
        }
    }

    /// Right-handed outputs need reversed triangle winding.
    pub fn flips_winding(&self) -> bool {
        !matches!(self, AxisConvention::LeftHandedYUp)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AxisConvention::LeftHandedYUp => "left_handed_y_up",
            AxisConvention::RightHandedYUp => "right_handed_y_up",
            AxisConvention::RightHandedZUp => "right_handed_z_up",
        }
    }

    /// Parse from string (case-insensitive, `-` or `_` separated).
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|axes| axes.name() == normalized)
    }
}
