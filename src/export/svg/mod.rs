//! Wireframe SVG export.
//!
//! Only the edges that shape the silhouette are drawn: boundary and
//! non-manifold edges, edges between a front face and a back face, and
//! edges whose two faces meet at an angle at or above the sharp-angle
//! threshold. Segments are clipped to the projection's half-spaces before
//! being projected to pixels.

mod projection;

pub use projection::{CameraProjection, HalfSpace, Projection, TopDownProjection};

use super::{close_on_drop, create_output_file, ExportMethod, ExportSettings, MeshExporter};
use crate::error::{ExportError, Result};
use crate::types::{AxisConvention, MeshInfo};
use glam::Vec3;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};

/// Default sharp-edge threshold in degrees.
pub const DEFAULT_SHARP_ANGLE: f32 = 60.0;

pub fn method() -> ExportMethod {
    ExportMethod::new(
        "Wireframe SVG",
        "svg",
        "image/svg+xml",
        AxisConvention::RightHandedZUp,
        build,
    )
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(SvgExporter::create(settings)?))
}

/// Faces sharing an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeFaces {
    One(u32),
    Two(u32, u32),
    NonManifold,
}

impl EdgeFaces {
    fn add(self, face: u32) -> Self {
        match self {
            EdgeFaces::One(f0) => EdgeFaces::Two(f0, face),
            _ => EdgeFaces::NonManifold,
        }
    }
}

/// Writes the sharp edges of each mesh as SVG `<line>` elements.
pub struct SvgExporter<W: Write> {
    settings: ExportSettings,
    writer: Option<W>,
    projection: Box<dyn Projection>,
    sharp_angle: f32,
    segment_count: u64,
    header_written: bool,
    closed: bool,
}

impl SvgExporter<BufWriter<File>> {
    /// Create the destination file, projecting through the settings' camera
    /// or the default camera.
    pub fn create(settings: ExportSettings) -> Result<Self> {
        let file = create_output_file(settings.destination())?;
        Ok(Self::from_writer(settings, file))
    }
}

impl<W: Write> SvgExporter<W> {
    pub fn from_writer(settings: ExportSettings, writer: W) -> Self {
        let camera = settings.camera().copied().unwrap_or_default();
        Self::with_projection(settings, writer, Box::new(CameraProjection::new(camera)))
    }

    pub fn with_projection(settings: ExportSettings, writer: W, projection: Box<dyn Projection>) -> Self {
        Self {
            settings,
            writer: Some(writer),
            projection,
            sharp_angle: DEFAULT_SHARP_ANGLE,
            segment_count: 0,
            header_written: false,
            closed: false,
        }
    }

    /// Set the sharp-edge threshold in degrees.
    pub fn with_sharp_angle(mut self, degrees: f32) -> Self {
        self.sharp_angle = degrees;
        self
    }

    /// Number of `<line>` elements written so far.
    pub fn segment_count(&self) -> u64 {
        self.segment_count
    }

    /// Close and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| ExportError::Export("SVG writer already released".to_string()))
    }

    fn writer(&mut self) -> Result<&mut W> {
        match (self.closed, self.writer.as_mut()) {
            (false, Some(writer)) => Ok(writer),
            _ => Err(ExportError::Export("SVG exporter is closed".to_string())),
        }
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        let (width, height) = (self.projection.pixel_width(), self.projection.pixel_height());
        let writer = self.writer()?;
        writeln!(
            writer,
            "<svg version=\"1.1\"\n     width=\"{}px\" height=\"{}px\"\n    baseProfile=\"full\"\n     xmlns=\"http://www.w3.org/2000/svg\"\n     xmlns:xlink=\"http://www.w3.org/1999/xlink\"\n     xmlns:ev=\"http://www.w3.org/2001/xml-events\">",
            width, height
        )?;
        writeln!(writer, "<g stroke=\"black\" stroke-width=\"1\">")?;
        Ok(())
    }

    fn is_sharp(&self, faces: EdgeFaces, normals: &[Vec3], back_face: &[bool]) -> bool {
        let (f0, f1) = match faces {
            EdgeFaces::NonManifold | EdgeFaces::One(_) => return true,
            EdgeFaces::Two(f0, f1) => (f0 as usize, f1 as usize),
        };
        if back_face[f0] != back_face[f1] {
            return true;
        }
        angle_degrees(normals[f0], normals[f1]) >= self.sharp_angle
    }

    /// Clip a world-space segment and write what is left in screen space.
    fn write_segment(&mut self, a: Vec3, b: Vec3) -> Result<()> {
        let mut tmin = 0.0f32;
        let mut tmax = 1.0f32;
        for plane in self.projection.clip_planes() {
            plane.clip(a, b, &mut tmin, &mut tmax);
            if tmin >= tmax {
                return Ok(());
            }
        }

        let p1 = self.projection.world_to_screen(a + (b - a) * tmin);
        let p2 = self.projection.world_to_screen(a + (b - a) * tmax);
        let height = self.projection.pixel_height();
        writeln!(
            self.writer()?,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"/>",
            p1.x,
            height - p1.y,
            p2.x,
            height - p2.y
        )?;
        self.segment_count += 1;
        Ok(())
    }
}

impl<W: Write> MeshExporter for SvgExporter<W> {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        self.writer()?;
        self.write_header()?;
        writeln!(self.writer()?, "<g id=\"{}\">", escape_xml(mesh.name()))?;

        // Vertices sharing a local position collapse onto the first one.
        let transform = mesh.transform();
        let positions = mesh.positions();
        let mut first_at: HashMap<[u32; 3], u32> = HashMap::new();
        let mut unique = Vec::with_capacity(positions.len());
        let mut world = Vec::with_capacity(positions.len());
        for (v, p) in positions.iter().enumerate() {
            let index = u32::try_from(v).map_err(|_| too_many("vertices", mesh))?;
            let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            let first = *first_at.entry(key).or_insert(index);
            unique.push(first);
            world.push(if first == index {
                transform.transform_point3(*p)
            } else {
                world[first as usize]
            });
        }

        let camera = self.projection.camera_position();
        let mut normals = Vec::with_capacity(mesh.triangle_count());
        let mut back_face = Vec::with_capacity(mesh.triangle_count());
        let mut edges: BTreeMap<(u32, u32), EdgeFaces> = BTreeMap::new();
        for (face, triangle) in mesh.triangles().enumerate() {
            let face = u32::try_from(face).map_err(|_| too_many("faces", mesh))?;
            let [v0, v1, v2] = triangle.map(|i| world[i as usize]);
            let normal = (v1 - v0).cross(v2 - v1);
            normals.push(normal);
            back_face.push(!HalfSpace::new(v0, normal).contains(camera));

            for j in 0..3 {
                let a = unique[triangle[j] as usize];
                let b = unique[triangle[(j + 1) % 3] as usize];
                let key = if a < b { (a, b) } else { (b, a) };
                edges
                    .entry(key)
                    .and_modify(|faces| *faces = faces.add(face))
                    .or_insert(EdgeFaces::One(face));
            }
        }

        for ((a, b), faces) in edges {
            if self.is_sharp(faces, &normals, &back_face) {
                self.write_segment(world[a as usize], world[b as usize])?;
            }
        }

        writeln!(self.writer()?, "</g>")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.write_header()?;
        let writer = self.writer()?;
        writeln!(writer, "</g></svg>")?;
        writer.flush()?;
        self.closed = true;
        log::debug!("Wrote {} SVG segments", self.segment_count);
        Ok(())
    }
}

impl<W: Write> Drop for SvgExporter<W> {
    fn drop(&mut self) {
        close_on_drop(self);
    }
}

fn too_many(what: &str, mesh: &MeshInfo<'_>) -> ExportError {
    ExportError::CapacityExceeded(format!("mesh '{}' has more than u32::MAX {}", mesh.name(), what))
}

/// Unsigned angle between two vectors in degrees; zero for degenerate input.
fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    let denominator = (a.length_squared() as f64 * b.length_squared() as f64).sqrt();
    if denominator < 1e-15 {
        return 0.0;
    }
    let cos = (a.dot(b) as f64 / denominator).clamp(-1.0, 1.0);
    cos.acos().to_degrees() as f32
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
