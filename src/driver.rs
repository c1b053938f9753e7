//! High-level export entry points: resolve a method, reject empty exports,
//! normalize the destination, then run the traversal and close the output.

use crate::error::{EmptyExport, ExportError, Result};
use crate::export::method::default_method;
use crate::export::{
    CountingExporter, ExportMethod, ExportMethodRegistry, ExportSettings, MeshExporter, SceneTraversal,
};
use crate::scene::{MeshId, NodeId, Scene};
use crate::types::{AxisConvention, MeshInfo};
use std::path::{Path, PathBuf};

/// Something the caller asked to export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportObject {
    /// A node and whatever its markers and children pull in.
    Node(NodeId),
    /// A standalone mesh, exported at the origin.
    Mesh(MeshId),
    /// An object the exporters cannot handle, described for diagnostics.
    Unsupported(String),
}

/// Parameters of one [`export`] call.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub destination: PathBuf,
    /// Method name or extension used when guessing fails or is disabled.
    pub method_name: String,
    /// Try the destination's extension first.
    pub guess_method: bool,
    /// Write a file even when nothing would end up in it.
    pub export_even_if_empty: bool,
    pub scale: f32,
    /// Base for relative destinations.
    pub base_dir: Option<PathBuf>,
    pub objects: Vec<ExportObject>,
    /// Overrides the method's default axis convention.
    pub axes: Option<AxisConvention>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            destination: PathBuf::new(),
            method_name: "stl".to_string(),
            guess_method: true,
            export_even_if_empty: false,
            scale: 1.0,
            base_dir: None,
            objects: Vec::new(),
            axes: None,
        }
    }
}

impl ExportRequest {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    pub fn with_guess_method(mut self, guess: bool) -> Self {
        self.guess_method = guess;
        self
    }

    pub fn with_export_even_if_empty(mut self, even_if_empty: bool) -> Self {
        self.export_even_if_empty = even_if_empty;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_axes(mut self, axes: AxisConvention) -> Self {
        self.axes = Some(axes);
        self
    }

    pub fn with_object(mut self, object: ExportObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_objects(mut self, objects: impl IntoIterator<Item = ExportObject>) -> Self {
        self.objects.extend(objects);
        self
    }
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub method: String,
    /// Requested objects that were exportable.
    pub objects: usize,
    pub meshes: usize,
    pub triangles: usize,
}

/// Export `request.objects` from `scene` to a file.
///
/// Nothing is created when the method cannot be resolved or the export
/// would be empty. Once the exporter exists it is always closed, and the
/// first error (export or close) is returned.
pub fn export(registry: &ExportMethodRegistry, scene: &Scene, request: &ExportRequest) -> Result<ExportReport> {
    let method = resolve_method(registry, request)?;

    if !request.export_even_if_empty {
        if let Some(empty) = check_export_is_empty(scene, &request.objects)? {
            log::warn!("Not exporting to {}: {}", request.destination.display(), empty);
            return Err(ExportError::NothingToExport(empty));
        }
    }

    let mut path = request.destination.clone();
    if path.is_relative() {
        if let Some(base) = &request.base_dir {
            path = base.join(path);
        }
    }
    let path = method.extend_path(&path);

    let mut settings = method
        .default_settings(path, request.scale)
        .with_camera(scene.main_camera().copied());
    if let Some(axes) = request.axes {
        settings = settings.with_axes(axes);
    }
    run(settings, scene, &request.objects)
}

fn resolve_method(registry: &ExportMethodRegistry, request: &ExportRequest) -> Result<ExportMethod> {
    let guessed = if request.guess_method {
        registry.guess_by_extension(&request.destination)
    } else {
        None
    };
    match guessed.or_else(|| registry.by_name(&request.method_name)) {
        Some(method) => Ok(method.clone()),
        None => {
            log::warn!(
                "Unknown export method '{}' for {}",
                request.method_name,
                request.destination.display()
            );
            Err(ExportError::UnknownMethod(request.method_name.clone()))
        }
    }
}

/// Instantiate the exporter, feed it and always close it.
fn run(settings: ExportSettings, scene: &Scene, objects: &[ExportObject]) -> Result<ExportReport> {
    let factory = settings.method().clone();
    let method = factory.name().to_string();
    let path = settings.destination().to_path_buf();
    let mut exporter = factory.instantiate(settings)?;

    let mut tally = Tally::new(exporter.as_mut());
    let exported = export_all(&mut tally, scene, objects, false);
    let (meshes, triangles) = (tally.meshes, tally.triangles);
    let closed = exporter.close();

    let objects = exported?;
    closed?;
    log::info!(
        "Exported {} meshes ({} triangles) to {} as {}",
        meshes,
        triangles,
        path.display(),
        method
    );
    Ok(ExportReport {
        path,
        method,
        objects,
        meshes,
        triangles,
    })
}

/// Feed `objects` to `exporter`: nodes through a single traversal (so a
/// node reachable from several objects is exported once), standalone
/// meshes directly. Returns how many objects were exportable.
pub fn export_all(
    exporter: &mut dyn MeshExporter,
    scene: &Scene,
    objects: &[ExportObject],
    warn: bool,
) -> Result<usize> {
    let mut traversal = SceneTraversal::new();
    let mut count = 0;
    for object in objects {
        match object {
            ExportObject::Node(id) => {
                count += 1;
                traversal.export(scene, [*id], exporter)?;
            }
            ExportObject::Mesh(id) => {
                count += 1;
                exporter.export_mesh(&MeshInfo::from_mesh(scene.mesh(*id))?)?;
            }
            ExportObject::Unsupported(what) => {
                if warn {
                    log::warn!("Not exporting object of type {}", what);
                }
            }
        }
    }
    Ok(count)
}

/// Dry-run `objects` through a counting exporter and report why the
/// export would be empty, if it would.
pub fn check_export_is_empty(scene: &Scene, objects: &[ExportObject]) -> Result<Option<EmptyExport>> {
    let mut counter = CountingExporter::new();
    let count = export_all(&mut counter, scene, objects, true)?;
    if counter.triangle_count() > 0 {
        return Ok(None);
    }
    Ok(Some(match (counter.mesh_count(), count) {
        (0, 0) => EmptyExport::NoObjects,
        (0, _) => EmptyExport::NoMeshes,
        (1, _) => EmptyExport::EmptyMesh,
        _ => EmptyExport::AllMeshesEmpty,
    }))
}

/// Counts what passes through to the wrapped exporter.
struct Tally<'a> {
    inner: &'a mut dyn MeshExporter,
    meshes: usize,
    triangles: usize,
}

impl<'a> Tally<'a> {
    fn new(inner: &'a mut dyn MeshExporter) -> Self {
        Self {
            inner,
            meshes: 0,
            triangles: 0,
        }
    }
}

impl MeshExporter for Tally<'_> {
    fn settings(&self) -> &ExportSettings {
        self.inner.settings()
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        self.inner.export_mesh(mesh)?;
        self.meshes += 1;
        self.triangles += mesh.triangle_count();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Asks the user where to save an interactive export.
pub trait DestinationPrompt {
    /// Return the chosen path, or `None` to cancel.
    fn choose_destination(&mut self, suggested: &Path, method: &ExportMethod) -> Option<PathBuf>;
}

/// Interactive "export selection" flow that remembers the previous
/// destination and method between calls.
#[derive(Debug, Clone, Default)]
pub struct SelectionExporter {
    last_path: Option<PathBuf>,
    last_method: Option<ExportMethod>,
}

impl SelectionExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    pub fn last_method(&self) -> Option<&ExportMethod> {
        self.last_method.as_ref()
    }

    /// Export `selection` at scale 1.
    ///
    /// Without an explicit `method` the last one is reused, or STL the
    /// first time. The extension of the chosen path decides the actual
    /// method; an unknown extension gets the requested method's extension
    /// appended. Returns `Ok(None)` when the prompt is cancelled.
    pub fn export_selection(
        &mut self,
        registry: &ExportMethodRegistry,
        scene: &Scene,
        selection: &[ExportObject],
        method: Option<&ExportMethod>,
        prompt: &mut dyn DestinationPrompt,
    ) -> Result<Option<ExportReport>> {
        if let Some(empty) = check_export_is_empty(scene, selection)? {
            log::warn!("Export selected meshes: {}", empty);
            return Err(ExportError::NothingToExport(empty));
        }

        let method = method
            .cloned()
            .or_else(|| self.last_method.clone())
            .unwrap_or_else(|| default_method(registry));

        let suggested = self.suggest_path(&method);
        let Some(path) = prompt.choose_destination(&suggested, &method) else {
            log::debug!("Export cancelled");
            return Ok(None);
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let (path, actual) = if extension == method.extension() {
            (path, method)
        } else if let Some(found) = registry.get(&extension) {
            (path, found.clone())
        } else {
            (method.extend_path(&path), method)
        };

        let settings = actual
            .default_settings(path.clone(), 1.0)
            .with_camera(scene.main_camera().copied());
        let report = run(settings, scene, selection)?;

        self.last_path = Some(path);
        self.last_method = Some(actual);
        Ok(Some(report))
    }

    /// Last directory and file stem with the method's extension.
    fn suggest_path(&self, method: &ExportMethod) -> PathBuf {
        let (directory, stem) = match &self.last_path {
            Some(last) => (
                last.parent().map(Path::to_path_buf).unwrap_or_default(),
                last.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "mesh".to_string()),
            ),
            None => (PathBuf::new(), "mesh".to_string()),
        };
        directory.join(format!("{}.{}", stem, method.extension()))
    }
}
