//! Image persistence boundary.
//!
//! Alert images are written under the export directory with a
//! timestamp-derived name; training frames are written as `{index}.jpg` under
//! the training directory. Both directories are created if absent. JPEG
//! encode/decode goes through the `image` crate.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::{GrayImage, ImageFormat, RgbImage};

use crate::frame::{Frame, PixelFormat};

/// Create `dir` (and parents) if it does not exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create directory {}", dir.display()))
}

/// Encode a frame as JPEG and write it to `path`.
pub fn save_jpeg(path: &Path, frame: &Frame) -> Result<()> {
    match frame.format() {
        PixelFormat::Rgb => {
            let img =
                RgbImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
                    .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
            img.save_with_format(path, ImageFormat::Jpeg)
                .with_context(|| format!("write {}", path.display()))
        }
        PixelFormat::Gray => {
            let img =
                GrayImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
                    .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
            img.save_with_format(path, ImageFormat::Jpeg)
                .with_context(|| format!("write {}", path.display()))
        }
    }
}

/// Read a JPEG from `path` into an RGB frame.
pub fn load_jpeg(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .with_context(|| format!("read {}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, PixelFormat::Rgb))
}

/// Path of the `index`-th training frame under `dir`.
pub fn training_frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{index}.jpg"))
}

/// Timestamp-derived filename stem for alert images (`YY-MM-DDTHH-MM-SS`).
pub fn timestamp_stem(at: DateTime<Local>) -> String {
    at.format("%y-%m-%dT%H-%M-%S").to_string()
}
