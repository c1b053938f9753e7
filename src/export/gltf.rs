//! glTF/GLB export.
//!
//! Vertex and index data accumulate in one binary buffer as meshes arrive;
//! the JSON document and the GLB container are assembled on close. Each
//! exported mesh becomes one glTF mesh (one primitive per non-empty
//! submesh) referenced by its own root node.

use super::{close_on_drop, create_output_file, ExportMethod, ExportSettings, MeshExporter};
use crate::error::{ExportError, Result};
use crate::types::{AxisConvention, MeshInfo};
use gltf_json as json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

pub fn method() -> ExportMethod {
    ExportMethod::new(
        "glTF binary",
        "glb",
        "model/gltf-binary",
        AxisConvention::RightHandedYUp,
        build,
    )
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(GlbExporter::create(settings)?))
}

/// Collects meshes into a single GLB file.
pub struct GlbExporter<W: Write> {
    settings: ExportSettings,
    writer: Option<W>,
    buffer: Vec<u8>,
    buffer_views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
    meshes: Vec<json::Mesh>,
    closed: bool,
}

impl GlbExporter<BufWriter<File>> {
    pub fn create(settings: ExportSettings) -> Result<Self> {
        let file = create_output_file(settings.destination())?;
        Ok(Self::from_writer(settings, file))
    }
}

impl<W: Write> GlbExporter<W> {
    pub fn from_writer(settings: ExportSettings, writer: W) -> Self {
        Self {
            settings,
            writer: Some(writer),
            buffer: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            meshes: Vec::new(),
            closed: false,
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Close and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| ExportError::Export("GLB writer already released".to_string()))
    }

    /// Append raw bytes as a new buffer view and return its index.
    fn push_view(&mut self, bytes: &[u8], target: json::buffer::Target) -> u32 {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.buffer_views.push(create_buffer_view(offset, bytes.len(), Some(target)));
        self.buffer_views.len() as u32 - 1
    }

    fn push_accessor(&mut self, accessor: json::Accessor) -> u32 {
        self.accessors.push(accessor);
        self.accessors.len() as u32 - 1
    }

    /// Serialize the document and write the GLB container.
    fn write_glb(&mut self) -> Result<()> {
        let nodes: Vec<json::Node> = (0..self.meshes.len() as u32).map(create_node).collect();
        let buffers = if self.buffer.is_empty() {
            Vec::new()
        } else {
            vec![json::Buffer {
                byte_length: USize64(self.buffer.len() as u64),
                extensions: Default::default(),
                extras: Default::default(),
                uri: None,
            }]
        };

        let root = json::Root {
            accessors: std::mem::take(&mut self.accessors),
            buffers,
            buffer_views: std::mem::take(&mut self.buffer_views),
            meshes: std::mem::take(&mut self.meshes),
            scenes: vec![json::Scene {
                extensions: Default::default(),
                extras: Default::default(),
                nodes: (0..nodes.len() as u32).map(json::Index::new).collect(),
            }],
            nodes,
            scene: Some(json::Index::new(0)),
            ..Default::default()
        };

        let json_string = json::serialize::to_string(&root)
            .map_err(|e| ExportError::Export(format!("Failed to serialize glTF JSON: {}", e)))?;
        let glb = assemble_glb(json_string.as_bytes(), &self.buffer)?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ExportError::Export("GLB writer already released".to_string()))?;
        writer.write_all(&glb)?;
        writer.flush()?;
        log::debug!("Wrote {} byte GLB with {} meshes", glb.len(), root.meshes.len());
        Ok(())
    }
}

impl<W: Write> MeshExporter for GlbExporter<W> {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        if self.closed {
            return Err(ExportError::Export("GLB exporter is closed".to_string()));
        }
        if mesh.triangle_count() == 0 {
            log::debug!("Skipping mesh '{}' without triangles", mesh.name());
            return Ok(());
        }
        let vertex_count = mesh.vertex_count();
        if u32::try_from(vertex_count).is_err() {
            return Err(ExportError::CapacityExceeded(format!(
                "mesh '{}' has more than u32::MAX vertices",
                mesh.name()
            )));
        }

        let transform = *mesh.transform();
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut bytes = Vec::with_capacity(vertex_count * 12);
        for p in mesh.positions() {
            let p = self.settings.convert_point(&transform, *p).to_array();
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
            extend_f32(&mut bytes, &p);
        }
        let view = self.push_view(&bytes, json::buffer::Target::ArrayBuffer);
        let positions = self.push_accessor(create_accessor(
            view,
            vertex_count,
            json::accessor::Type::Vec3,
            json::accessor::ComponentType::F32,
            Some(min),
            Some(max),
        ));

        let mut attributes = BTreeMap::new();
        attributes.insert(Valid(json::mesh::Semantic::Positions), json::Index::new(positions));

        if !mesh.normals().is_empty() {
            bytes.clear();
            for n in mesh.normals() {
                extend_f32(&mut bytes, &self.settings.convert_normal(&transform, *n).to_array());
            }
            let view = self.push_view(&bytes, json::buffer::Target::ArrayBuffer);
            let normals = self.push_accessor(create_accessor(
                view,
                vertex_count,
                json::accessor::Type::Vec3,
                json::accessor::ComponentType::F32,
                None,
                None,
            ));
            attributes.insert(Valid(json::mesh::Semantic::Normals), json::Index::new(normals));
        }

        // glTF puts the texture origin at the top-left.
        if !mesh.uvs().is_empty() {
            bytes.clear();
            for uv in mesh.uvs() {
                extend_f32(&mut bytes, &[uv.x, 1.0 - uv.y]);
            }
            let view = self.push_view(&bytes, json::buffer::Target::ArrayBuffer);
            let uvs = self.push_accessor(create_accessor(
                view,
                vertex_count,
                json::accessor::Type::Vec2,
                json::accessor::ComponentType::F32,
                None,
                None,
            ));
            attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), json::Index::new(uvs));
        }

        let mut primitives = Vec::new();
        for submesh in 0..mesh.mesh().submeshes.len() {
            bytes.clear();
            let mut index_count = 0;
            for triangle in mesh.mesh().submesh_triangles(submesh) {
                for index in self.settings.convert_triangle(triangle) {
                    bytes.extend_from_slice(&index.to_le_bytes());
                }
                index_count += 3;
            }
            if index_count == 0 {
                continue;
            }
            let view = self.push_view(&bytes, json::buffer::Target::ElementArrayBuffer);
            let indices = self.push_accessor(create_accessor(
                view,
                index_count,
                json::accessor::Type::Scalar,
                json::accessor::ComponentType::U32,
                None,
                None,
            ));
            primitives.push(json::mesh::Primitive {
                attributes: attributes.clone(),
                extensions: Default::default(),
                extras: Default::default(),
                indices: Some(json::Index::new(indices)),
                material: None,
                mode: Valid(json::mesh::Mode::Triangles),
                targets: None,
            });
        }

        self.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            primitives,
            weights: None,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write_glb()
    }
}

impl<W: Write> Drop for GlbExporter<W> {
    fn drop(&mut self) {
        close_on_drop(self);
    }
}

/// Wrap a JSON document and binary buffer in a GLB container. The BIN
/// chunk is left out when the buffer is empty.
fn assemble_glb(json_bytes: &[u8], buffer: &[u8]) -> Result<Vec<u8>> {
    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;

    // Pad buffer to 4-byte alignment
    let buffer_padding = (4 - (buffer.len() % 4)) % 4;
    let padded_buffer_len = buffer.len() + buffer_padding;

    let mut total_size = 12 + 8 + padded_json_len;
    if !buffer.is_empty() {
        total_size += 8 + padded_buffer_len;
    }
    let total_u32 = u32::try_from(total_size)
        .map_err(|_| ExportError::CapacityExceeded(format!("GLB of {} bytes", total_size)))?;

    let mut glb = Vec::with_capacity(total_size);

    // GLB Header
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_u32.to_le_bytes());

    // JSON Chunk
    glb.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat(0x20u8).take(json_padding));

    // BIN Chunk
    if !buffer.is_empty() {
        glb.extend_from_slice(&(padded_buffer_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(buffer);
        glb.extend(std::iter::repeat(0u8).take(buffer_padding));
    }

    Ok(glb)
}

fn extend_f32(bytes: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
}

fn create_buffer_view(
    offset: usize,
    size: usize,
    target: Option<json::buffer::Target>,
) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64(size as u64),
        byte_offset: Some(USize64(offset as u64)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        target: target.map(Valid),
    }
}

fn create_accessor(
    buffer_view: u32,
    count: usize,
    type_: json::accessor::Type,
    component_type: json::accessor::ComponentType,
    min: Option<[f32; 3]>,
    max: Option<[f32; 3]>,
) -> json::Accessor {
    json::Accessor {
        buffer_view: Some(json::Index::new(buffer_view)),
        byte_offset: Some(USize64(0)),
        count: USize64(count as u64),
        component_type: Valid(json::accessor::GenericComponentType(component_type)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(type_),
        min: min.map(|m| json::Value::from(m.to_vec())),
        max: max.map(|m| json::Value::from(m.to_vec())),
        normalized: false,
        sparse: None,
    }
}

fn create_node(mesh: u32) -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: Some(json::Index::new(mesh)),
        rotation: None,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fixtures, Mesh};
    use glam::{Vec2, Vec3};
    use serde_json::Value;

    fn exporter() -> GlbExporter<Vec<u8>> {
        GlbExporter::from_writer(method().default_settings("mem.glb", 1.0), Vec::new())
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    /// Split a GLB into its JSON document and BIN chunk.
    fn parse(glb: &[u8]) -> (Value, Vec<u8>) {
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32_at(glb, 4), 2);
        assert_eq!(u32_at(glb, 8) as usize, glb.len());
        let json_len = u32_at(glb, 12) as usize;
        assert_eq!(u32_at(glb, 16), CHUNK_JSON);
        assert_eq!(json_len % 4, 0);
        let doc: Value = serde_json::from_slice(&glb[20..20 + json_len]).unwrap();
        let bin_at = 20 + json_len;
        let bin = if bin_at < glb.len() {
            assert_eq!(u32_at(glb, bin_at + 4), CHUNK_BIN);
            let bin_len = u32_at(glb, bin_at) as usize;
            glb[bin_at + 8..bin_at + 8 + bin_len].to_vec()
        } else {
            Vec::new()
        };
        (doc, bin)
    }

    #[test]
    fn test_empty_export_is_valid() {
        let glb = exporter().finish().unwrap();
        let (doc, bin) = parse(&glb);
        assert!(bin.is_empty());
        assert_eq!(doc["scenes"][0]["nodes"].as_array().map_or(0, |n| n.len()), 0);
        assert!(doc.get("buffers").map_or(true, |b| b.as_array().unwrap().is_empty()));
    }

    #[test]
    fn test_one_node_per_mesh() {
        let cube = fixtures::cube("Box", 1.0);
        let triangle = fixtures::triangle("Tri");
        let mut glb = exporter();
        glb.export_mesh(&MeshInfo::from_mesh(&cube).unwrap()).unwrap();
        glb.export_mesh(&MeshInfo::from_mesh(&triangle).unwrap()).unwrap();
        assert_eq!(glb.mesh_count(), 2);

        let (doc, bin) = parse(&glb.finish().unwrap());
        assert_eq!(doc["meshes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["nodes"][1]["mesh"], 1);
        assert_eq!(doc["scenes"][0]["nodes"], serde_json::json!([0, 1]));
        // Cube: 8 positions + 36 indices; triangle: 3 positions + 3 indices.
        assert_eq!(bin.len(), 8 * 12 + 36 * 4 + 3 * 12 + 3 * 4);
        assert_eq!(doc["buffers"][0]["byteLength"], bin.len());
    }

    #[test]
    fn test_positions_are_converted_with_bounds() {
        let cube = fixtures::cube("Box", 2.0);
        let mut glb = exporter();
        glb.export_mesh(&MeshInfo::from_mesh(&cube).unwrap()).unwrap();
        let (doc, _) = parse(&glb.finish().unwrap());

        let positions = &doc["accessors"][0];
        assert_eq!(positions["count"], 8);
        // Right-handed Y-up negates z.
        assert_eq!(positions["min"], serde_json::json!([0.0, 0.0, -2.0]));
        assert_eq!(positions["max"], serde_json::json!([2.0, 2.0, 0.0]));
    }

    #[test]
    fn test_winding_is_flipped_for_right_handed_output() {
        let triangle = fixtures::triangle("Tri");
        let mut glb = exporter();
        glb.export_mesh(&MeshInfo::from_mesh(&triangle).unwrap()).unwrap();
        let (_, bin) = parse(&glb.finish().unwrap());
        let indices: Vec<u32> = (0..3).map(|i| u32_at(&bin, 36 + i * 4)).collect();
        assert_eq!(indices, vec![0, 2, 1]);
    }

    #[test]
    fn test_normals_uvs_and_submeshes() {
        let mut mesh = fixtures::triangle("Tri");
        mesh.normals = vec![Vec3::Z; 3];
        mesh.uvs = vec![Vec2::new(0.0, 0.25), Vec2::X, Vec2::Y];
        mesh.add_submesh();
        mesh.add_triangle(0, 1, 2);
        mesh.add_submesh();

        let mut glb = exporter();
        glb.export_mesh(&MeshInfo::from_mesh(&mesh).unwrap()).unwrap();
        let (doc, bin) = parse(&glb.finish().unwrap());

        // The trailing empty submesh produces no primitive.
        let primitives = doc["meshes"][0]["primitives"].as_array().unwrap();
        assert_eq!(primitives.len(), 2);
        assert_eq!(primitives[0]["attributes"]["NORMAL"], 1);
        assert_eq!(primitives[1]["attributes"]["TEXCOORD_0"], 2);

        // Normal converted to right-handed Y-up.
        let normal_z = f32::from_le_bytes([bin[36 + 8], bin[36 + 9], bin[36 + 10], bin[36 + 11]]);
        assert_eq!(normal_z, -1.0);
        // First UV has its V flipped.
        let v = f32::from_le_bytes([bin[72 + 4], bin[72 + 5], bin[72 + 6], bin[72 + 7]]);
        assert_eq!(v, 0.75);
    }

    #[test]
    fn test_meshes_without_triangles_are_skipped() {
        let mut empty = Mesh::new("Empty");
        empty.add_vertex(Vec3::ZERO);
        let mut glb = exporter();
        glb.export_mesh(&MeshInfo::from_mesh(&empty).unwrap()).unwrap();
        assert_eq!(glb.mesh_count(), 0);
    }
}
