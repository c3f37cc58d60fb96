//! MagicaVoxel `.vox` export.
//!
//! Layout (all integers little-endian i32):
//!
//! ```text
//! "VOX " 150
//! MAIN 0 <children>
//!   PACK 4 0  models=1
//!   SIZE 12 0 x y z
//!   XYZI 4+4n 0 n (x y z index)*n
//!   RGBA 1024 0 (r g b a)*256
//! ```
//!
//! Cell value `v != 0` is stored with palette index `v + 1`, and RGBA entry
//! `j` holds `colors[j]`, so each voxel shows the color of its value.

use super::interpreter::Frame;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

const VERSION: i32 = 150;
const MAX_EXTENT: usize = 256;
const PALETTE_SIZE: usize = 256;
const CHUNK_HEADER: usize = 12;

#[derive(Debug, Error)]
pub enum VoxError {
    #[error("vox I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("volume {fx}x{fy}x{fz} exceeds the 256 voxel limit per axis")]
    VolumeTooLarge { fx: usize, fy: usize, fz: usize },
    #[error("value {0} has no voxel palette index")]
    ValueOutOfRange(u8),
}

/// Encode a volumetric frame.
pub fn write_vox<W: Write>(
    writer: &mut W,
    frame: &Frame,
    colors: &[u32],
) -> Result<(), VoxError> {
    check_extents(frame)?;
    let (fx, fy, fz) = (frame.fx, frame.fy, frame.fz);

    let mut voxels: Vec<[u8; 4]> = Vec::new();
    for z in 0..fz {
        for y in 0..fy {
            for x in 0..fx {
                let v = frame.state[x + y * fx + z * fx * fy];
                if v != 0 {
                    let index = v.checked_add(1).ok_or(VoxError::ValueOutOfRange(v))?;
                    voxels.push([x as u8, y as u8, z as u8, index]);
                }
            }
        }
    }

    let pack = CHUNK_HEADER + 4;
    let size = CHUNK_HEADER + 12;
    let xyzi = CHUNK_HEADER + 4 + 4 * voxels.len();
    let rgba = CHUNK_HEADER + 4 * PALETTE_SIZE;

    writer.write_all(b"VOX ")?;
    write_i32(writer, VERSION)?;

    chunk_header(writer, b"MAIN", 0, pack + size + xyzi + rgba)?;

    chunk_header(writer, b"PACK", 4, 0)?;
    write_i32(writer, 1)?;

    chunk_header(writer, b"SIZE", 12, 0)?;
    for extent in [fx, fy, fz] {
        write_i32(writer, extent as i32)?;
    }

    chunk_header(writer, b"XYZI", 4 + 4 * voxels.len(), 0)?;
    write_i32(writer, voxels.len() as i32)?;
    for voxel in &voxels {
        writer.write_all(voxel)?;
    }

    chunk_header(writer, b"RGBA", 4 * PALETTE_SIZE, 0)?;
    for j in 0..PALETTE_SIZE {
        let entry = match colors.get(j) {
            Some(&argb) => {
                let [a, r, g, b] = argb.to_be_bytes();
                [r, g, b, a]
            }
            None => [0, 0, 0, 255],
        };
        writer.write_all(&entry)?;
    }

    Ok(())
}

/// Encode a volumetric frame to a file.
pub fn save_vox(path: &Path, frame: &Frame, colors: &[u32]) -> Result<(), VoxError> {
    check_extents(frame)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_vox(&mut writer, frame, colors)?;
    writer.flush()?;
    Ok(())
}

fn check_extents(frame: &Frame) -> Result<(), VoxError> {
    let (fx, fy, fz) = (frame.fx, frame.fy, frame.fz);
    if fx > MAX_EXTENT || fy > MAX_EXTENT || fz > MAX_EXTENT {
        return Err(VoxError::VolumeTooLarge { fx, fy, fz });
    }
    Ok(())
}

fn chunk_header<W: Write>(
    writer: &mut W,
    id: &[u8; 4],
    content: usize,
    children: usize,
) -> io::Result<()> {
    writer.write_all(id)?;
    write_i32(writer, content as i32)?;
    write_i32(writer, children as i32)
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}
