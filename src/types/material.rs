//! Surface materials referenced by mesh renderers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a material blends with what is behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Opaque,
    Cutout,
    Fade,
    Transparent,
}

impl RenderMode {
    /// Fade and transparent materials carry an alpha value.
    pub fn is_translucent(&self) -> bool {
        matches!(self, RenderMode::Fade | RenderMode::Transparent)
    }
}

/// A material as far as the exporters care about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub name: String,
    /// Shader name; a name containing "specular" enables specular output.
    pub shader: String,
    /// Diffuse RGBA color.
    pub color: Option<[f32; 4]>,
    pub specular_color: Option<[f32; 3]>,
    /// Glossiness in `[0, 1]`.
    pub glossiness: Option<f32>,
    pub render_mode: RenderMode,
    pub main_texture: Option<PathBuf>,
    pub specular_map: Option<PathBuf>,
    pub normal_map: Option<PathBuf>,
    pub bump_scale: Option<f32>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_shader(mut self, shader: impl Into<String>) -> Self {
        self.shader = shader.into();
        self
    }

    pub fn is_specular(&self) -> bool {
        self.shader.to_lowercase().contains("specular")
    }
}
