//! Export method descriptors and the extension-keyed registry.

use super::settings::ExportSettings;
use super::{gltf, obj, schematic, stl, svg, MeshExporter};
use crate::error::{ExportError, Result};
use crate::types::AxisConvention;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Creates an exporter for the given settings.
pub type ExporterFactory = fn(ExportSettings) -> Result<Box<dyn MeshExporter>>;

/// A named output format: display name, file extension, MIME type,
/// default axis convention and exporter factory.
#[derive(Clone)]
pub struct ExportMethod {
    name: String,
    extension: String,
    mime_type: String,
    default_axes: AxisConvention,
    factory: ExporterFactory,
}

impl ExportMethod {
    pub fn new(
        name: impl Into<String>,
        extension: impl Into<String>,
        mime_type: impl Into<String>,
        default_axes: AxisConvention,
        factory: ExporterFactory,
    ) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            mime_type: mime_type.into(),
            default_axes,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn default_axes(&self) -> AxisConvention {
        self.default_axes
    }

    /// Settings for this method with its default axis convention.
    pub fn default_settings(&self, destination: impl Into<PathBuf>, scale: f32) -> ExportSettings {
        ExportSettings::new(self.clone(), destination, scale, self.default_axes)
    }

    pub fn instantiate(&self, settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
        (self.factory)(settings)
    }

    /// Append the extension unless the path already ends with it
    /// (case-insensitive).
    pub fn extend_path(&self, path: &Path) -> PathBuf {
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if matches || self.extension.is_empty() {
            return path.to_path_buf();
        }
        let mut extended = path.as_os_str().to_owned();
        extended.push(".");
        extended.push(&self.extension);
        PathBuf::from(extended)
    }
}

impl PartialEq for ExportMethod {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.extension == other.extension
    }
}

impl fmt::Debug for ExportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportMethod")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("mime_type", &self.mime_type)
            .field("default_axes", &self.default_axes)
            .finish()
    }
}

/// Export methods keyed by lowercase extension.
#[derive(Debug, Clone, Default)]
pub struct ExportMethodRegistry {
    methods: BTreeMap<String, ExportMethod>,
}

impl ExportMethodRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every file format this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for method in [
            stl::method(),
            obj::method(),
            svg::method(),
            schematic::method(),
            gltf::method(),
        ] {
            registry.methods.insert(method.extension().to_lowercase(), method);
        }
        registry
    }

    /// Process-wide registry of the builtin methods.
    pub fn global() -> &'static ExportMethodRegistry {
        static GLOBAL: OnceLock<ExportMethodRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtin)
    }

    pub fn register(&mut self, method: ExportMethod) -> Result<()> {
        let key = method.extension().trim_start_matches('.').to_lowercase();
        if key.is_empty() {
            return Err(ExportError::InvalidMethod(format!(
                "'{}' has no file extension",
                method.name()
            )));
        }
        if self.methods.contains_key(&key) {
            return Err(ExportError::DuplicateExtension(key));
        }
        log::debug!("Registered export method '{}' for .{}", method.name(), key);
        self.methods.insert(key, method);
        Ok(())
    }

    /// Look up by extension, with or without the leading dot, any case.
    pub fn get(&self, extension: &str) -> Option<&ExportMethod> {
        self.methods
            .get(&extension.trim_start_matches('.').to_lowercase())
    }

    /// Look up by display name or extension, case-insensitive.
    pub fn by_name(&self, name: &str) -> Option<&ExportMethod> {
        self.methods
            .values()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .or_else(|| self.get(name))
    }

    /// Look up by the extension of `path`.
    pub fn guess_by_extension(&self, path: &Path) -> Option<&ExportMethod> {
        path.extension().and_then(|e| e.to_str()).and_then(|e| self.get(e))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportMethod> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Fallback when neither the caller nor the history names a method.
pub(crate) fn default_method(registry: &ExportMethodRegistry) -> ExportMethod {
    registry.get("stl").cloned().unwrap_or_else(stl::method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::counting;

    #[test]
    fn test_builtin_registry() {
        let registry = ExportMethodRegistry::with_builtin();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.get("STL").unwrap().name(), "STL");
        assert_eq!(registry.get(".obj").unwrap().name(), "OBJ wavefront");
        assert_eq!(registry.by_name("wireframe svg").unwrap().extension(), "svg");
        assert_eq!(registry.by_name("schematic").unwrap().mime_type(), "application/mcschematic");
        assert!(registry.get("fbx").is_none());
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = ExportMethodRegistry::global() as *const _;
        let b = ExportMethodRegistry::global() as *const _;
        assert_eq!(a, b);
        assert!(ExportMethodRegistry::global().get("glb").is_some());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ExportMethodRegistry::with_builtin();
        let result = registry.register(stl::method());
        assert!(matches!(result, Err(ExportError::DuplicateExtension(ext)) if ext == "stl"));
    }

    #[test]
    fn test_counting_method_cannot_be_registered() {
        let mut registry = ExportMethodRegistry::new();
        assert!(matches!(
            registry.register(counting::method()),
            Err(ExportError::InvalidMethod(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guess_by_extension() {
        let registry = ExportMethodRegistry::with_builtin();
        assert_eq!(
            registry.guess_by_extension(Path::new("out/Model.SVG")).unwrap().extension(),
            "svg"
        );
        assert!(registry.guess_by_extension(Path::new("out/model")).is_none());
    }

    #[test]
    fn test_extend_path() {
        let method = stl::method();
        assert_eq!(method.extend_path(Path::new("a/b.stl")), PathBuf::from("a/b.stl"));
        assert_eq!(method.extend_path(Path::new("a/b.STL")), PathBuf::from("a/b.STL"));
        assert_eq!(method.extend_path(Path::new("a/b.obj")), PathBuf::from("a/b.obj.stl"));
        assert_eq!(method.extend_path(Path::new("a/b")), PathBuf::from("a/b.stl"));
    }
}
