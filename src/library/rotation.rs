//! Quarter-turn rotation of image files.
//!
//! Rotations are written to a temp copy under the rotation directory; the
//! original is only touched when the copy is committed over it.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::ports::RotateDirection;

/// Subdirectory of the data dir holding uncommitted rotations.
pub const ROTATION_DIR: &str = "rotated";

pub struct ImageRotator {
    temp_dir: PathBuf,
}

impl ImageRotator {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            temp_dir: data_dir.join(ROTATION_DIR),
        }
    }

    /// Rotate `src` a quarter turn into a new temp file and return its path.
    pub fn rotate(&self, src: &Path, direction: RotateDirection) -> Result<PathBuf> {
        let format = format_from_extension(src)
            .ok_or_else(|| anyhow!("Unsupported image type: {:?}", src))?;
        let img = open_image(src)?;
        let rotated = match direction {
            RotateDirection::Clockwise => img.rotate90(),
            RotateDirection::CounterClockwise => img.rotate270(),
        };

        fs::create_dir_all(&self.temp_dir).with_context(|| {
            format!("Failed to create rotation directory: {:?}", self.temp_dir)
        })?;
        let dst = self.temp_path(src, direction);
        let rotated = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(rotated.to_rgb8()),
            _ => rotated,
        };
        rotated
            .save_with_format(&dst, format)
            .with_context(|| format!("Failed to write rotated image: {:?}", dst))?;

        debug!(?src, ?dst, ?direction, "Rotated image");
        Ok(dst)
    }

    /// Replace `original` with the rotated `temp` file.
    pub fn commit(&self, temp: &Path, original: &Path) -> Result<()> {
        if let Err(e) = fs::rename(temp, original) {
            // Rename fails across filesystems; fall back to copying.
            debug!("Rename failed ({}), copying {:?} over {:?}", e, temp, original);
            fs::copy(temp, original)
                .with_context(|| format!("Failed to replace {:?} with {:?}", original, temp))?;
            if let Err(e) = fs::remove_file(temp) {
                warn!("Failed to remove temp file {:?}: {}", temp, e);
            }
        }
        debug!(?original, "Committed rotation");
        Ok(())
    }

    /// Delete an uncommitted rotation. Missing files are ignored.
    pub fn discard(&self, temp: &Path) {
        if !temp.starts_with(&self.temp_dir) {
            warn!("Refusing to discard {:?} outside the rotation directory", temp);
            return;
        }
        if let Err(e) = fs::remove_file(temp) {
            debug!("Temp rotation {:?} not removed: {}", temp, e);
        }
    }

    fn temp_path(&self, src: &Path, direction: RotateDirection) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let key = format!("{}:{}:{}", src.display(), direction.degrees(), nanos);
        let ext = src
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.temp_dir
            .join(format!("{:016x}.{}", xxh3_64(key.as_bytes()), ext))
    }
}

/// Cache-busting tag for a file's current content.
pub fn version_tag(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    Ok(format!("{:016x}", xxh3_64(&bytes)))
}

/// Decode an image, taking the first frame of a GIF.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames: {:?}", path));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
        None => image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
    }
}

fn format_from_extension(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "webp" => Some(ImageFormat::WebP),
        "gif" => Some(ImageFormat::Gif),
        "bmp" => Some(ImageFormat::Bmp),
        "tiff" | "tif" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let mut img = RgbImage::new(width, height);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_rotate_writes_temp_copy() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("wide.png");
        write_png(&src, 4, 2);

        let rotator = ImageRotator::new(&dir.path().join("data"));
        let temp = rotator.rotate(&src, RotateDirection::Clockwise).unwrap();

        assert!(temp.starts_with(dir.path().join("data").join(ROTATION_DIR)));
        assert_eq!(temp.extension().unwrap(), "png");
        assert_eq!(image::image_dimensions(&temp).unwrap(), (2, 4));
        assert_eq!(image::image_dimensions(&src).unwrap(), (4, 2));
    }

    #[test]
    fn test_rotations_compose() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("px.png");
        write_png(&src, 3, 1);
        let rotator = ImageRotator::new(dir.path());

        let once = rotator.rotate(&src, RotateDirection::Clockwise).unwrap();
        let twice = rotator.rotate(&once, RotateDirection::Clockwise).unwrap();
        let img = open_image(&twice).unwrap().to_rgb8();
        // Red corner pixel moved from top-left to bottom-right
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(*img.get_pixel(2, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_commit_replaces_original() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("tall.png");
        write_png(&src, 1, 5);
        let rotator = ImageRotator::new(dir.path());
        let before = version_tag(&src).unwrap();

        let temp = rotator
            .rotate(&src, RotateDirection::CounterClockwise)
            .unwrap();
        rotator.commit(&temp, &src).unwrap();

        assert!(!temp.exists());
        assert_eq!(image::image_dimensions(&src).unwrap(), (5, 1));
        assert_ne!(version_tag(&src).unwrap(), before);
    }

    #[test]
    fn test_discard_only_inside_temp_dir() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("keep.png");
        write_png(&src, 2, 2);
        let rotator = ImageRotator::new(&dir.path().join("data"));

        rotator.discard(&src);
        assert!(src.exists());

        let temp = rotator.rotate(&src, RotateDirection::Clockwise).unwrap();
        rotator.discard(&temp);
        assert!(!temp.exists());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let rotator = ImageRotator::new(dir.path());
        assert!(rotator
            .rotate(&dir.path().join("notes.txt"), RotateDirection::Clockwise)
            .is_err());
    }
}
