//! Wavefront OBJ export with an MTL material sidecar.
//!
//! Positions, normals and UVs are pooled for the whole file, so a vertex
//! shared by several meshes is written once. Each mesh becomes an `o`
//! group named after its node path, and each submesh a `usemtl` block.

use super::{close_on_drop, create_output_file, ExportMethod, ExportSettings, MeshExporter};
use crate::error::{ExportError, Result};
use crate::scene::{MaterialId, NodeId, Scene};
use crate::types::{AxisConvention, Material, MeshInfo};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};

pub fn method() -> ExportMethod {
    ExportMethod::new("OBJ wavefront", "obj", "text/plain", AxisConvention::RightHandedYUp, build)
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(ObjExporter::create(settings)?))
}

/// Bit pattern key for exact float deduplication.
fn bits(values: [f32; 3]) -> [u32; 3] {
    values.map(f32::to_bits)
}

/// Adding positive zero turns `-0.0` into `0.0` and leaves everything else.
fn fold_zero(v: Vec3) -> Vec3 {
    v + Vec3::ZERO
}

/// A deduplicated attribute stream with 1-based OBJ indices.
#[derive(Debug)]
struct Pool<V> {
    values: Vec<V>,
    index: HashMap<[u32; 3], usize>,
}

impl<V: Copy> Pool<V> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, key: [u32; 3], value: V) -> usize {
        let values = &mut self.values;
        *self.index.entry(key).or_insert_with(|| {
            values.push(value);
            values.len()
        })
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn since(&self, start: usize) -> &[V] {
        &self.values[start..]
    }
}

/// OBJ indices of one triangle corner; 0 means absent.
#[derive(Debug, Clone, Copy)]
struct Corner {
    position: usize,
    uv: usize,
    normal: usize,
}

/// Writes meshes to an `.obj` stream and materials to an optional `.mtl` stream.
pub struct ObjExporter<W: Write> {
    settings: ExportSettings,
    obj: Option<W>,
    mtl: Option<W>,
    closed: bool,
    positions: Pool<Vec3>,
    normals: Pool<Vec3>,
    uvs: Pool<Vec2>,
    node_names: HashMap<NodeId, String>,
    name_counts: HashMap<String, u32>,
    material_names: HashMap<MaterialId, String>,
    material_counts: HashMap<String, u32>,
}

impl ObjExporter<BufWriter<File>> {
    /// Create `<destination>` and the `.mtl` file next to it.
    pub fn create(settings: ExportSettings) -> Result<Self> {
        let obj = create_output_file(settings.destination())?;
        let mtl = create_output_file(&settings.destination().with_extension("mtl"))?;
        Self::from_writers(settings, obj, Some(mtl))
    }
}

impl<W: Write> ObjExporter<W> {
    /// Without an MTL stream, `usemtl` lines carry the raw material names.
    pub fn from_writers(settings: ExportSettings, mut obj: W, mtl: Option<W>) -> Result<Self> {
        if mtl.is_some() {
            if let Some(stem) = settings.destination().file_stem() {
                writeln!(obj, "mtllib {}.mtl", stem.to_string_lossy())?;
                writeln!(obj)?;
            }
        }
        Ok(Self {
            settings,
            obj: Some(obj),
            mtl,
            closed: false,
            positions: Pool::new(),
            normals: Pool::new(),
            uvs: Pool::new(),
            node_names: HashMap::new(),
            name_counts: HashMap::new(),
            material_names: HashMap::new(),
            material_counts: HashMap::new(),
        })
    }

    /// Close and hand back the OBJ and MTL writers.
    pub fn finish(mut self) -> Result<(W, Option<W>)> {
        self.close()?;
        let obj = self
            .obj
            .take()
            .ok_or_else(|| ExportError::Export("OBJ writer already released".to_string()))?;
        Ok((obj, self.mtl.take()))
    }

    /// First use of a name returns it unchanged, later uses get `name:N`.
    fn unique_name(&mut self, name: &str) -> String {
        match self.name_counts.get_mut(name) {
            Some(count) => {
                let unique = format!("{}:{}", name, count);
                *count += 1;
                unique
            }
            None => {
                self.name_counts.insert(name.to_string(), 1);
                name.to_string()
            }
        }
    }

    /// Slash path of the node with `(Clone)` suffixes removed, made unique
    /// the first time each node is seen.
    fn node_name(&mut self, scene: &Scene, node: NodeId) -> String {
        if let Some(name) = self.node_names.get(&node) {
            return name.clone();
        }
        let own = &scene.node(node).name;
        let own = own.strip_suffix("(Clone)").unwrap_or(own);
        let path = match scene.node(node).parent() {
            Some(parent) => format!("{}/{}", self.node_name(scene, parent), own),
            None => own.to_string(),
        };
        let name = self.unique_name(&path);
        self.node_names.insert(node, name.clone());
        name
    }

    fn group_name(&mut self, mesh: &MeshInfo<'_>) -> String {
        match mesh.source() {
            Some(source) => self.node_name(source.scene, source.node),
            None => self.unique_name(mesh.name()),
        }
    }

    /// Whitespace runs become `_`; clashes are resolved with `_N` suffixes
    /// that stay consistent with names already ending in `_N`.
    fn unique_material_name(&mut self, raw: &str) -> String {
        let name = collapse_whitespace(raw);

        if let Some(count) = self.material_counts.get_mut(&name) {
            let unique = format!("{}_{}", name, count);
            *count += 1;
            return unique;
        }

        if let Some((base, suffix)) = name.rsplit_once('_') {
            if let Ok(index) = suffix.parse::<u32>() {
                match self.material_counts.get_mut(base) {
                    Some(count) if *count < index => {
                        *count = index + 1;
                    }
                    Some(count) => {
                        let unique = format!("{}_{}", base, count);
                        *count += 1;
                        return unique;
                    }
                    None => {
                        self.material_counts.insert(base.to_string(), index + 1);
                    }
                }
            }
        }

        self.material_counts.insert(name.clone(), 1);
        name
    }

    /// Name to use in `usemtl`, writing the MTL entry on first use.
    fn material_name(&mut self, scene: &Scene, id: MaterialId) -> Result<String> {
        let material = scene.material(id);
        if self.mtl.is_none() {
            return Ok(material.name.clone());
        }
        if let Some(name) = self.material_names.get(&id) {
            return Ok(name.clone());
        }

        let name = self.unique_material_name(&material.name);
        if let Some(mtl) = self.mtl.as_mut() {
            write_material(mtl, &name, material)?;
        }
        self.material_names.insert(id, name.clone());
        Ok(name)
    }
}

fn collapse_whitespace(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn write_material<W: Write>(mtl: &mut W, name: &str, material: &Material) -> Result<()> {
    writeln!(mtl, "newmtl {}", name)?;
    if let Some([r, g, b, _]) = material.color {
        writeln!(mtl, "Kd {} {} {}", r, g, b)?;
    }
    let specular = material.is_specular();
    if specular {
        let [r, g, b] = material.specular_color.unwrap_or([0.0; 3]);
        writeln!(mtl, "Ks {} {} {}", r, g, b)?;
        writeln!(mtl, "Ns {}", material.glossiness.unwrap_or(0.0) * 1000.0)?;
    }
    if material.render_mode.is_translucent() {
        let alpha = material.color.map_or(1.0, |c| c[3]);
        writeln!(mtl, "d {}", alpha)?;
    }
    if let Some(texture) = &material.main_texture {
        writeln!(mtl, "map_Kd {}", texture.display())?;
    }
    if specular {
        if let Some(texture) = &material.specular_map {
            writeln!(mtl, "map_Ks {}", texture.display())?;
        }
    }
    if let Some(texture) = &material.normal_map {
        writeln!(mtl, "map_bump -bm {} {}", material.bump_scale.unwrap_or(1.0), texture.display())?;
    }
    writeln!(mtl)?;
    Ok(())
}

fn write_corner<W: Write>(obj: &mut W, corner: Corner) -> std::io::Result<()> {
    write!(obj, "{}", corner.position)?;
    if corner.uv != 0 {
        write!(obj, "/{}", corner.uv)?;
    }
    if corner.normal != 0 {
        if corner.uv == 0 {
            write!(obj, "/")?;
        }
        write!(obj, "/{}", corner.normal)?;
    }
    Ok(())
}

impl<W: Write> MeshExporter for ObjExporter<W> {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        if self.closed || self.obj.is_none() {
            return Err(ExportError::Export("OBJ exporter is closed".to_string()));
        }

        let first_position = self.positions.len();
        let first_normal = self.normals.len();
        let first_uv = self.uvs.len();

        let transform = *mesh.transform();
        let positions = mesh.positions();
        let normals = mesh.normals();
        let uvs = mesh.uvs();

        let mut submeshes = Vec::with_capacity(mesh.mesh().submeshes.len());
        for submesh in 0..mesh.mesh().submeshes.len() {
            let mut corners = Vec::new();
            for triangle in mesh.mesh().submesh_triangles(submesh) {
                for index in self.settings.convert_triangle(triangle) {
                    let i = index as usize;
                    let p = fold_zero(self.settings.convert_point(&transform, positions[i]));
                    let position = self.positions.insert(bits(p.to_array()), p);
                    let normal = match normals.get(i) {
                        Some(&n) => {
                            let n = fold_zero(self.settings.convert_normal(&transform, n));
                            self.normals.insert(bits(n.to_array()), n)
                        }
                        None => 0,
                    };
                    let uv = match uvs.get(i) {
                        Some(&t) => {
                            let t = t + Vec2::ZERO;
                            self.uvs.insert(bits([t.x, t.y, 0.0]), t)
                        }
                        None => 0,
                    };
                    corners.push(Corner { position, uv, normal });
                }
            }
            submeshes.push(corners);
        }

        let group = self.group_name(mesh);
        let mut material_names = Vec::new();
        if let Some(source) = mesh.source() {
            for (submesh, &id) in source.material_ids().iter().enumerate() {
                if submesh >= submeshes.len() {
                    break;
                }
                material_names.push(self.material_name(source.scene, id)?);
            }
        }

        let Some(obj) = self.obj.as_mut() else {
            return Err(ExportError::Export("OBJ exporter is closed".to_string()));
        };
        writeln!(obj, "o {}", group)?;
        for p in self.positions.since(first_position) {
            writeln!(obj, "v {} {} {}", p.x, p.y, p.z)?;
        }
        for t in self.uvs.since(first_uv) {
            writeln!(obj, "vt {} {}", t.x, t.y)?;
        }
        for n in self.normals.since(first_normal) {
            writeln!(obj, "vn {} {} {}", n.x, n.y, n.z)?;
        }

        for (submesh, corners) in submeshes.iter().enumerate() {
            if let Some(material) = material_names.get(submesh) {
                writeln!(obj, "usemtl {}", material)?;
            }
            for face in corners.chunks_exact(3) {
                write!(obj, "f ")?;
                write_corner(obj, face[0])?;
                write!(obj, " ")?;
                write_corner(obj, face[1])?;
                write!(obj, " ")?;
                write_corner(obj, face[2])?;
                writeln!(obj)?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(obj) = self.obj.as_mut() {
            obj.flush()?;
        }
        if let Some(mtl) = self.mtl.as_mut() {
            mtl.flush()?;
        }
        log::debug!(
            "Wrote {} OBJ positions, {} normals, {} uvs",
            self.positions.len(),
            self.normals.len(),
            self.uvs.len()
        );
        Ok(())
    }
}

impl<W: Write> Drop for ObjExporter<W> {
    fn drop(&mut self) {
        close_on_drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fixtures, RenderMode};
    use std::borrow::Cow;

    fn exporter(with_mtl: bool) -> ObjExporter<Vec<u8>> {
        let settings = method().default_settings("out/model.obj", 1.0);
        ObjExporter::from_writers(settings, Vec::new(), with_mtl.then(Vec::new)).unwrap()
    }

    fn finish(exporter: ObjExporter<Vec<u8>>) -> (String, String) {
        let (obj, mtl) = exporter.finish().unwrap();
        (
            String::from_utf8(obj).unwrap(),
            String::from_utf8(mtl.unwrap_or_default()).unwrap(),
        )
    }

    fn scene_info<'a>(scene: &'a Scene, node: NodeId) -> MeshInfo<'a> {
        let mesh = scene.mesh(scene.node(node).mesh_filter.unwrap());
        MeshInfo::new(
            Cow::Borrowed(mesh),
            scene.local_to_world(node),
            Some(crate::types::MeshSource { scene, node }),
        )
        .unwrap()
    }

    #[test]
    fn test_header_and_single_triangle() {
        let mesh = fixtures::triangle("Tri");
        let mut obj = exporter(true);
        obj.export_mesh(&MeshInfo::from_mesh(&mesh).unwrap()).unwrap();
        let (text, _) = finish(obj);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "mtllib model.mtl");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "o Tri");
        assert_eq!(lines[3], "v 0 0 0");
        assert_eq!(lines[4], "v 0 1 0");
        assert_eq!(lines[5], "v 1 0 0");
        assert_eq!(lines[6], "f 1 2 3");
    }

    #[test]
    fn test_vertices_are_shared_across_meshes() {
        let cube = fixtures::cube("Box", 1.0);
        let mut obj = exporter(false);
        obj.export_mesh(&MeshInfo::from_mesh(&cube).unwrap()).unwrap();
        obj.export_mesh(&MeshInfo::from_mesh(&cube).unwrap()).unwrap();
        let (text, _) = finish(obj);

        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 8);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 24);
        let groups: Vec<&str> = text.lines().filter(|l| l.starts_with("o ")).collect();
        assert_eq!(groups, vec!["o Box", "o Box:1"]);
    }

    #[test]
    fn test_negative_zero_is_deduplicated() {
        let mut mesh = fixtures::triangle("t");
        mesh.positions.push(Vec3::new(-0.0, 0.0, 0.0));
        mesh.add_triangle(3, 1, 2);
        let mut obj = exporter(false);
        obj.export_mesh(&MeshInfo::from_mesh(&mesh).unwrap()).unwrap();
        let (text, _) = finish(obj);
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }

    #[test]
    fn test_face_formats() {
        let mut mesh = fixtures::triangle("t");
        mesh.normals = vec![Vec3::Z; 3];
        let mut obj = exporter(false);
        obj.export_mesh(&MeshInfo::from_mesh(&mesh).unwrap()).unwrap();
        let (text, _) = finish(obj);
        assert!(text.contains("f 1//1 2//1 3//1"));
        assert!(text.contains("vn 0 0 -1"));

        mesh.uvs = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        let mut obj = exporter(false);
        obj.export_mesh(&MeshInfo::from_mesh(&mesh).unwrap()).unwrap();
        let (text, _) = finish(obj);
        assert!(text.contains("f 1/1/1 2/2/1 3/3/1"));
    }

    #[test]
    fn test_node_paths_and_materials() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(fixtures::triangle("Tri"));
        let mut shiny = Material::new("Shiny Red")
            .with_color([1.0, 0.0, 0.0, 0.5])
            .with_shader("Standard (Specular setup)");
        shiny.render_mode = RenderMode::Fade;
        let red = scene.add_material(shiny);
        let root = scene.add_root("Robot");
        let arm = scene.add_child(root, "Arm(Clone)");
        let other = scene.add_child(root, "Arm");
        scene.set_mesh(arm, mesh, vec![red]);
        scene.set_mesh(other, mesh, vec![red]);

        let mut obj = exporter(true);
        obj.export_mesh(&scene_info(&scene, arm)).unwrap();
        obj.export_mesh(&scene_info(&scene, other)).unwrap();
        let (text, mtl) = finish(obj);

        let groups: Vec<&str> = text.lines().filter(|l| l.starts_with("o ")).collect();
        assert_eq!(groups, vec!["o Robot/Arm", "o Robot/Arm:1"]);
        assert_eq!(text.matches("usemtl Shiny_Red").count(), 2);
        assert_eq!(mtl.matches("newmtl").count(), 1);
        assert!(mtl.contains("newmtl Shiny_Red\nKd 1 0 0\nKs 0 0 0\nNs 0\nd 0.5\n\n"));
    }

    #[test]
    fn test_material_name_reconciliation() {
        let mut obj = exporter(true);
        assert_eq!(obj.unique_material_name("Mat"), "Mat");
        assert_eq!(obj.unique_material_name("Mat"), "Mat_1");
        assert_eq!(obj.unique_material_name("Mat_5"), "Mat_5");
        assert_eq!(obj.unique_material_name("Mat"), "Mat_6");
        assert_eq!(obj.unique_material_name("Mat_2"), "Mat_7");
        assert_eq!(obj.unique_material_name("Other_3"), "Other_3");
        assert_eq!(obj.unique_material_name("Other"), "Other_4");
        assert_eq!(obj.unique_material_name("a  b\tc"), "a_b_c");
    }

    #[test]
    fn test_usemtl_without_mtl_stream_uses_raw_name() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(fixtures::triangle("Tri"));
        let material = scene.add_material(Material::new("My Mat"));
        let node = scene.add_root("Node");
        scene.set_mesh(node, mesh, vec![material]);

        let mut obj = exporter(false);
        obj.export_mesh(&scene_info(&scene, node)).unwrap();
        let (text, mtl) = finish(obj);
        assert!(text.starts_with("o Node\n"));
        assert!(text.contains("usemtl My Mat"));
        assert!(mtl.is_empty());
    }
}
