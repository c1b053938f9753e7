//! The MCEdit `.schematic` document.

use super::{NbtError, NbtWriter};
use std::io::Write;

/// Write a schematic of `width * height * length` blocks.
///
/// `voxel(x, y, z)` packs the block id in its low byte and the block data
/// in its high byte. Blocks are stored y-major, then z, then x.
pub fn write_schematic<W, F>(out: W, width: i16, height: i16, length: i16, voxel: F) -> Result<W, NbtError>
where
    W: Write,
    F: Fn(i16, i16, i16) -> u16,
{
    let mut writer = NbtWriter::new(out, "Schematic")?;
    let root = writer.root();
    writer.write_short_tag(root, "Width", width)?;
    writer.write_short_tag(root, "Height", height)?;
    writer.write_short_tag(root, "Length", length)?;
    writer.write_string_tag(root, "Materials", "Alpha")?;
    writer.write_empty_list_tag(root, "Entities")?;
    writer.write_empty_list_tag(root, "TileEntities")?;

    let count = dim(width) * dim(height) * dim(length);
    let mut row = Vec::with_capacity(dim(width));
    for (name, byte) in [("Blocks", 0u32), ("Data", 8u32)] {
        let array = writer.begin_byte_array(root, name, count)?;
        for y in 0..height.max(0) {
            for z in 0..length.max(0) {
                row.clear();
                row.extend((0..width.max(0)).map(|x| (voxel(x, y, z) >> byte) as u8));
                writer.write_array_bytes(array, &row)?;
            }
        }
        writer.close(array)?;
    }

    writer.finish()
}

fn dim(d: i16) -> usize {
    d.max(0) as usize
}
