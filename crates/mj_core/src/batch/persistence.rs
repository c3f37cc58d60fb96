//! Artifact writers.

use super::error::PersistenceError;
use crate::markov_junior::{render_frame, save_png, save_vox, Frame};
use std::fs;
use std::path::Path;

/// Writes raster artifacts.
pub trait RasterSink: Send + Sync {
    fn save_raster(
        &self,
        path: &Path,
        frame: &Frame,
        colors: &[u32],
        pixel_size: u32,
    ) -> Result<(), PersistenceError>;
}

/// Writes volumetric artifacts.
pub trait VolumeSink: Send + Sync {
    fn save_volume(
        &self,
        path: &Path,
        frame: &Frame,
        colors: &[u32],
    ) -> Result<(), PersistenceError>;
}

/// PNG and `.vox` files on disk. Missing parent directories are created.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSinks;

fn ensure_parent(path: &Path) -> Result<(), PersistenceError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

impl RasterSink for FileSinks {
    fn save_raster(
        &self,
        path: &Path,
        frame: &Frame,
        colors: &[u32],
        pixel_size: u32,
    ) -> Result<(), PersistenceError> {
        ensure_parent(path)?;
        let image = render_frame(frame, colors, pixel_size).ok_or_else(|| {
            PersistenceError::ImageTooLarge {
                path: path.to_path_buf(),
                fx: frame.fx,
                fy: frame.fy,
                fz: frame.fz,
                pixel_size,
            }
        })?;
        save_png(&image, path).map_err(|source| PersistenceError::Image {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl VolumeSink for FileSinks {
    fn save_volume(
        &self,
        path: &Path,
        frame: &Frame,
        colors: &[u32],
    ) -> Result<(), PersistenceError> {
        ensure_parent(path)?;
        save_vox(path, frame, colors)
            .map_err(|err| PersistenceError::from_vox(path.to_path_buf(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fx: usize, fy: usize, fz: usize) -> Frame {
        let mut state = vec![0; fx * fy * fz];
        state[0] = 1;
        Frame {
            state,
            legend: vec!['B', 'W'],
            fx,
            fy,
            fz,
            counter: 3,
        }
    }

    #[test]
    fn test_raster_creates_frame_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Anim").join("3.png");
        let colors = [0xFF000000, 0xFFFFFFFF];
        FileSinks.save_raster(&path, &frame(2, 2, 1), &colors, 2).unwrap();
        // second write into the existing directory
        FileSinks.save_raster(&path, &frame(2, 2, 1), &colors, 2).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 4));
    }

    #[test]
    fn test_oversized_raster_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Wide_1.png");
        let err = FileSinks
            .save_raster(&path, &frame(100, 1, 1), &[0xFF000000, 0xFFFFFFFF], 50_000_000)
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::ImageTooLarge { fx: 100, pixel_size: 50_000_000, .. }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_volume_written_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cube_1.vox");
        FileSinks
            .save_volume(&path, &frame(2, 2, 2), &[0xFF000000, 0xFFFFFFFF])
            .unwrap();
        assert_eq!(&std::fs::read(&path).unwrap()[0..4], b"VOX ");

        let big = dir.path().join("Big_1.vox");
        let err = FileSinks
            .save_volume(&big, &frame(300, 1, 2), &[0xFF000000, 0xFFFFFFFF])
            .unwrap_err();
        assert!(matches!(err, PersistenceError::VolumeTooLarge { fx: 300, .. }));
    }
}
