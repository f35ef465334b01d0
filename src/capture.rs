//! Training capture.
//!
//! Pulls frames from a live source and persists each one under an
//! index-based name (`0.jpg`, `1.jpg`, ...) so a `ReplaySource` can consume
//! the sequence later. No detection is involved.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::source::FrameSource;
use crate::storage;

/// Capture settings.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Directory the sequence is written to. Created if absent.
    pub dir: PathBuf,
    /// Number of frames to capture.
    pub count: u64,
    /// Suspension between captures (record speed). Zero disables the delay.
    pub frame_delay: Duration,
}

/// Capture `config.count` frames and persist them as a replayable sequence.
///
/// Returns the number of frames written. A source that exhausts before the
/// requested count is an error: training expects a live source, which never
/// ends normally.
pub fn capture_training(source: &mut dyn FrameSource, config: &CaptureConfig) -> Result<u64> {
    storage::ensure_dir(&config.dir)?;

    for index in 0..config.count {
        let frame = source
            .next_frame()?
            .ok_or_else(|| anyhow!("frame source exhausted after {} frames", index))?;
        let path = storage::training_frame_path(&config.dir, index);
        storage::save_jpeg(&path, &frame)?;
        log::debug!("captured training frame {}", path.display());

        if !config.frame_delay.is_zero() && index + 1 < config.count {
            std::thread::sleep(config.frame_delay);
        }
    }

    log::info!(
        "captured {} training frames into {}",
        config.count,
        config.dir.display()
    );
    Ok(config.count)
}
