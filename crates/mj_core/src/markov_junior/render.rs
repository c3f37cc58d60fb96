//! PNG rendering of frames.
//!
//! Colors are packed `0xAARRGGBB` values indexed by cell value, as resolved
//! from the frame legend by the palette.
//!
//! - `render_2d`: one `pixel_size` square per cell
//! - `render_3d_isometric`: shaded isometric cubes for every non-zero voxel
//!
//! Both return `None` when the image would not fit a `u32` side or an
//! addressable RGBA buffer.

use super::interpreter::Frame;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

/// Background behind isometric renders
const BACKGROUND: [u8; 4] = [34, 34, 34, 255];

/// Cube edge length for isometric renders
pub const ISOMETRIC_BLOCK_SIZE: u32 = 6;

/// Unpack `0xAARRGGBB` into RGBA bytes.
pub fn unpack_argb(color: u32) -> [u8; 4] {
    let [a, r, g, b] = color.to_be_bytes();
    [r, g, b, a]
}

fn color_at(colors: &[u32], value: u8) -> [u8; 4] {
    colors
        .get(value as usize)
        .map(|&c| unpack_argb(c))
        .unwrap_or([255, 255, 255, 255])
}

fn checked_buffer(width: u32, height: u32) -> Option<(u32, u32)> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)?;
    Some((width, height))
}

fn flat_extents(frame: &Frame, pixel_size: u32) -> Option<(u32, u32)> {
    let width = u32::try_from(frame.fx).ok()?.checked_mul(pixel_size)?;
    let height = u32::try_from(frame.fy).ok()?.checked_mul(pixel_size)?;
    checked_buffer(width, height)
}

/// `(width, height, fit_height)` of an isometric render.
fn isometric_extents(frame: &Frame, block: u32) -> Option<(u32, u32, u32)> {
    let across = u32::try_from(frame.fx.checked_add(frame.fy)?).ok()?;
    let up = u32::try_from(frame.fz).ok()?.checked_add(across / 2)?;
    let fit_width = across.checked_mul(block)?;
    let fit_height = up.checked_mul(block)?;
    let margin = block.checked_mul(2)?;
    let (width, height) = checked_buffer(
        fit_width.checked_add(margin)?,
        fit_height.checked_add(margin)?,
    )?;
    Some((width, height, fit_height))
}

/// Flat render of a frame; only the `z = 0` layer is drawn.
pub fn render_2d(frame: &Frame, colors: &[u32], pixel_size: u32) -> Option<RgbaImage> {
    let pixel_size = pixel_size.max(1);
    let (width, height) = flat_extents(frame, pixel_size)?;
    let mut img: RgbaImage = ImageBuffer::new(width, height);

    for y in 0..frame.fy {
        for x in 0..frame.fx {
            let color = Rgba(color_at(colors, frame.state[x + y * frame.fx]));
            for dy in 0..pixel_size {
                for dx in 0..pixel_size {
                    img.put_pixel(x as u32 * pixel_size + dx, y as u32 * pixel_size + dy, color);
                }
            }
        }
    }

    Some(img)
}

/// Isometric render of a volumetric frame. Value 0 is empty space.
pub fn render_3d_isometric(frame: &Frame, colors: &[u32], block_size: u32) -> Option<RgbaImage> {
    let (mx, my, mz) = (frame.fx, frame.fy, frame.fz);
    let block = block_size.max(1);
    let (width, height, fit_height) = isometric_extents(frame, block)?;

    let mut img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba(BACKGROUND));

    let mut voxels: Vec<(usize, usize, usize, u8)> = Vec::new();
    for z in 0..mz {
        for y in 0..my {
            for x in 0..mx {
                let value = frame.state[x + y * mx + z * mx * my];
                if value != 0 {
                    voxels.push((x, y, z, value));
                }
            }
        }
    }
    // back to front
    voxels.sort_by_key(|&(x, y, z, _)| x + y + z);

    let b = block as i32;
    let center_x = (width / 2) as i32;
    let center_y = ((height - fit_height) / 2 + (mz as u32).saturating_sub(1) * block) as i32;
    for (x, y, z, value) in voxels {
        let color = color_at(colors, value);
        if color[3] == 0 {
            continue;
        }
        let u = (x as i32 - y as i32) * b;
        let v = (x + y) as i32 * b / 2 - z as i32 * b;
        draw_isometric_cube(&mut img, center_x + u - b, center_y + v, b, color);
    }

    Some(img)
}

/// Shaded cube sprite: top face 215/256, left 143/256, right 71/256.
fn draw_isometric_cube(img: &mut RgbaImage, x: i32, y: i32, size: i32, color: [u8; 4]) {
    const TOP: u32 = 215;
    const LEFT: u32 = 143;
    const RIGHT: u32 = 71;

    let (img_width, img_height) = (img.width() as i32, img.height() as i32);
    for j in 0..2 * size - 1 {
        for i in 0..2 * size {
            let lx = i - size + 1;
            let ly = size - j - 1;
            let (minus, plus) = (2 * ly - lx, 2 * ly + lx);
            if minus >= 2 * size || plus > 2 * size || minus < -2 * size || plus <= -2 * size {
                continue;
            }

            let shade = if lx > 0 && 2 * ly < lx {
                RIGHT
            } else if lx <= 0 && 2 * ly <= -lx {
                LEFT
            } else {
                TOP
            };
            let scale = |c: u8| (c as u32 * shade / 256) as u8;

            let (px, py) = (x + i, y + j);
            if (0..img_width).contains(&px) && (0..img_height).contains(&py) {
                img.put_pixel(
                    px as u32,
                    py as u32,
                    Rgba([scale(color[0]), scale(color[1]), scale(color[2]), color[3]]),
                );
            }
        }
    }
}

/// Flat render for `fz == 1`, isometric otherwise.
pub fn render_frame(frame: &Frame, colors: &[u32], pixel_size: u32) -> Option<RgbaImage> {
    if frame.fz == 1 {
        render_2d(frame, colors, pixel_size)
    } else {
        render_3d_isometric(frame, colors, ISOMETRIC_BLOCK_SIZE)
    }
}

/// Save an image as PNG.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<(), image::ImageError> {
    img.save_with_format(path, image::ImageFormat::Png)
}
