//! Binary STL export and import.
//!
//! Layout: an 80-byte header (zeros), a little-endian u32 triangle count,
//! then per triangle the facet normal and three vertices as f32 triples
//! followed by a u16 attribute word. The count is only known at the end,
//! so it is patched in when the exporter is closed.

use super::{close_on_drop, create_output_file, ExportMethod, ExportSettings, MeshExporter};
use crate::error::{ExportError, Result};
use crate::types::{AxisConvention, BoundingBox, Mesh, MeshInfo};
use glam::Vec3;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

pub fn method() -> ExportMethod {
    ExportMethod::new("STL", "stl", "application/sla", AxisConvention::RightHandedZUp, build)
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(StlExporter::create(settings)?))
}

/// Streams triangles to a binary STL file.
pub struct StlExporter<W: Write + Seek> {
    settings: ExportSettings,
    writer: Option<W>,
    triangle_count: u32,
    closed: bool,
}

impl StlExporter<BufWriter<File>> {
    /// Create the destination file named in `settings`.
    pub fn create(settings: ExportSettings) -> Result<Self> {
        let file = create_output_file(settings.destination())?;
        Self::from_writer(settings, file)
    }
}

impl<W: Write + Seek> StlExporter<W> {
    /// Write the header and placeholder count to `writer`.
    pub fn from_writer(settings: ExportSettings, mut writer: W) -> Result<Self> {
        writer.write_all(&[0u8; HEADER_LEN])?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            settings,
            writer: Some(writer),
            triangle_count: 0,
            closed: false,
        })
    }

    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }

    /// Close and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| ExportError::Export("STL writer already released".to_string()))
    }
}

impl<W: Write + Seek> MeshExporter for StlExporter<W> {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        let settings = &self.settings;
        let writer = match (self.closed, self.writer.as_mut()) {
            (false, Some(writer)) => writer,
            _ => return Err(ExportError::Export("STL exporter is closed".to_string())),
        };

        let transform = mesh.transform();
        let positions = mesh.positions();
        let normals = mesh.normals();
        let has_normals = !normals.is_empty();

        let mut written = 0u32;
        for triangle in mesh.triangles() {
            let [i0, i1, i2] = settings.convert_triangle(triangle).map(|i| i as usize);
            let v0 = settings.convert_point(transform, positions[i0]);
            let v1 = settings.convert_point(transform, positions[i1]);
            let v2 = settings.convert_point(transform, positions[i2]);

            let normal = if has_normals {
                let sum = normals[i0].normalize_or_zero()
                    + normals[i1].normalize_or_zero()
                    + normals[i2].normalize_or_zero();
                settings.convert_normal(transform, sum)
            } else {
                let n0 = (v1 - v0).cross(v2 - v1).normalize_or_zero();
                let n1 = (v2 - v1).cross(v0 - v1).normalize_or_zero();
                let n2 = (v0 - v2).cross(v1 - v2).normalize_or_zero();
                (n0 + n1 + n2).normalize_or_zero()
            };

            for v in [normal, v0, v1, v2] {
                write_vec3(writer, v)?;
            }
            writer.write_all(&0u16.to_le_bytes())?;
            written += 1;
        }

        self.triangle_count = self
            .triangle_count
            .checked_add(written)
            .ok_or_else(|| ExportError::CapacityExceeded("more than u32::MAX STL triangles".to_string()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let count = self.triangle_count;
        if let Some(writer) = self.writer.as_mut() {
            writer.seek(SeekFrom::Start(HEADER_LEN as u64))?;
            writer.write_all(&count.to_le_bytes())?;
            writer.seek(SeekFrom::End(0))?;
            writer.flush()?;
        }
        log::debug!("Wrote {} STL triangles", count);
        Ok(())
    }
}

impl<W: Write + Seek> Drop for StlExporter<W> {
    fn drop(&mut self) {
        close_on_drop(self);
    }
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> io::Result<()> {
    writer.write_all(&v.x.to_le_bytes())?;
    writer.write_all(&v.y.to_le_bytes())?;
    writer.write_all(&v.z.to_le_bytes())
}

/// Triangles read back from a binary STL stream. Each facet gets three
/// fresh vertices carrying the facet normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StlMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl StlMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions.iter().copied())
    }

    pub fn into_mesh(self, name: impl Into<String>) -> Mesh {
        Mesh {
            name: name.into(),
            positions: self.positions,
            normals: self.normals,
            uvs: Vec::new(),
            submeshes: vec![self.indices],
        }
    }
}

/// Parse a binary STL stream. A file without triangles is an error.
pub fn read_stl<R: Read>(reader: &mut R) -> Result<StlMesh> {
    let mut header = [0u8; HEADER_LEN + 4];
    read_exact(reader, &mut header, "header")?;
    let count = u32::from_le_bytes([header[80], header[81], header[82], header[83]]) as usize;
    if count == 0 {
        return Err(ExportError::InvalidStl("file contains no triangles".to_string()));
    }

    let capacity = count.min(1 << 20);
    let mut mesh = StlMesh {
        positions: Vec::with_capacity(capacity * 3),
        normals: Vec::with_capacity(capacity * 3),
        indices: Vec::with_capacity(capacity * 3),
    };

    let mut facet = [0u8; FACET_LEN];
    for _ in 0..count {
        read_exact(reader, &mut facet, "facet")?;
        let normal = read_vec3(&facet[0..12]);
        for corner in 0..3 {
            let start = 12 + corner * 12;
            mesh.indices.push(mesh.positions.len() as u32);
            mesh.positions.push(read_vec3(&facet[start..start + 12]));
            mesh.normals.push(normal);
        }
    }
    Ok(mesh)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ExportError::InvalidStl(format!("truncated {}", what)),
        _ => ExportError::Io(e),
    })
}

fn read_vec3(bytes: &[u8]) -> Vec3 {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Vec3::new(f(0), f(4), f(8))
}
