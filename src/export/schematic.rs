//! Minecraft `.schematic` export.
//!
//! Triangles are voxelized into one octree spanning the signed 16-bit
//! coordinate range. On close the filled cells are packed into a dense
//! grid covering their bounding box and written as an NBT schematic.

use super::{close_on_drop, create_output_file, ExportMethod, ExportSettings, MeshExporter};
use crate::error::{ExportError, Result};
use crate::geometry::Octree;
use crate::nbt::write_schematic;
use crate::types::{AxisConvention, MeshInfo};
use glam::Vec3;
use std::fs::File;
use std::io::{BufWriter, Write};

const VOXEL_SIZE: f32 = 1.0;
const RANGE: f32 = 65536.0;

const EMPTY: u16 = 0;
/// Block id 98 (stone bricks) with data value 1 (mossy).
const FILLED: u16 = (1 << 8) | 98;

pub fn method() -> ExportMethod {
    ExportMethod::new(
        "Minecraft Schematic",
        "schematic",
        "application/mcschematic",
        AxisConvention::RightHandedYUp,
        build,
    )
}

fn build(settings: ExportSettings) -> Result<Box<dyn MeshExporter>> {
    Ok(Box::new(SchematicExporter::create(settings)?))
}

/// Voxelizes meshes and writes the result when closed.
pub struct SchematicExporter<W: Write> {
    settings: ExportSettings,
    writer: Option<W>,
    octree: Octree<bool>,
    closed: bool,
}

impl SchematicExporter<BufWriter<File>> {
    pub fn create(settings: ExportSettings) -> Result<Self> {
        let file = create_output_file(settings.destination())?;
        Ok(Self::from_writer(settings, file))
    }
}

impl<W: Write> SchematicExporter<W> {
    pub fn from_writer(settings: ExportSettings, writer: W) -> Self {
        Self {
            settings,
            writer: Some(writer),
            octree: Octree::new(Vec3::splat(-0.5 * RANGE), RANGE, false),
            closed: false,
        }
    }

    pub fn octree(&self) -> &Octree<bool> {
        &self.octree
    }

    /// Close and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| ExportError::Export("schematic writer already released".to_string()))
    }
}

impl<W: Write> MeshExporter for SchematicExporter<W> {
    fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn export_mesh(&mut self, mesh: &MeshInfo<'_>) -> Result<()> {
        if self.closed {
            return Err(ExportError::Export("schematic exporter is closed".to_string()));
        }
        let transform = mesh.transform();
        let positions = mesh.positions();
        for triangle in mesh.triangles() {
            let [a, b, c] = triangle.map(|i| self.settings.convert_point(transform, positions[i as usize]));
            self.octree.voxelize_triangle(a, b, c, VOXEL_SIZE, false, true);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let grid = VoxelGrid::from_octree(&self.octree);
        log::debug!(
            "Writing {}x{}x{} schematic to {}",
            grid.width,
            grid.height,
            grid.length,
            self.settings.destination().display()
        );
        let mut writer = write_schematic(writer, grid.width, grid.height, grid.length, |x, y, z| grid.value(x, y, z))?;
        writer.flush()?;
        self.writer = Some(writer);
        Ok(())
    }
}

impl<W: Write> Drop for SchematicExporter<W> {
    fn drop(&mut self) {
        close_on_drop(self);
    }
}

/// Dense occupancy grid over the bounding box of the filled cells.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    pub width: i16,
    pub height: i16,
    pub length: i16,
    cells: Vec<bool>,
}

impl VoxelGrid {
    pub fn from_octree(octree: &Octree<bool>) -> Self {
        let filled = || octree.leaves().filter(|leaf| leaf.payload() == Some(&true));

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(-f32::MAX);
        for leaf in filled() {
            min = min.min(leaf.min_corner());
            max = max.max(leaf.max_corner());
        }

        let breadth = max - min;
        let width = to_positive_short(breadth.x);
        let height = to_positive_short(breadth.y);
        let length = to_positive_short(breadth.z);
        let mut grid = Self {
            width,
            height,
            length,
            cells: vec![false; width as usize * height as usize * length as usize],
        };

        // A large leaf covers every cell below it.
        for leaf in filled() {
            let lo = leaf.min_corner() - min;
            let hi = leaf.max_corner() - min;
            let range = |lo: f32, hi: f32, dim: i16| {
                let start = to_positive_short(lo);
                start..to_positive_short(hi).max(start + 1).min(dim)
            };
            for y in range(lo.y, hi.y, height) {
                for z in range(lo.z, hi.z, length) {
                    for x in range(lo.x, hi.x, width) {
                        let index = grid.index(x, y, z);
                        grid.cells[index] = true;
                    }
                }
            }
        }
        grid
    }

    fn index(&self, x: i16, y: i16, z: i16) -> usize {
        let (w, l) = (self.width as usize, self.length as usize);
        x as usize + z as usize * w + y as usize * w * l
    }

    pub fn is_filled(&self, x: i16, y: i16, z: i16) -> bool {
        self.cells[self.index(x, y, z)]
    }

    /// Packed block value for the schematic.
    pub fn value(&self, x: i16, y: i16, z: i16) -> u16 {
        if self.is_filled(x, y, z) {
            FILLED
        } else {
            EMPTY
        }
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

fn to_positive_short(v: f32) -> i16 {
    v.clamp(0.0, i16::MAX as f32) as i16
}
