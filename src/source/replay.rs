//! Replay frame source.
//!
//! Reads sequentially numbered stored frames (`0.jpg`, `1.jpg`, ...) from a
//! directory, typically written earlier by training capture.

use std::path::PathBuf;

use anyhow::Result;

use crate::frame::Frame;
use crate::storage;

use super::FrameSource;

/// Frame source replaying a stored training sequence.
pub struct ReplaySource {
    dir: PathBuf,
    index: u64,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: 0,
        }
    }

    /// Index of the next frame to be read.
    pub fn position(&self) -> u64 {
        self.index
    }
}

impl FrameSource for ReplaySource {
    /// Returns the next stored frame, or `None` once the next index is
    /// missing. A file that exists but cannot be decoded is an error, not
    /// exhaustion.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = storage::training_frame_path(&self.dir, self.index);
        if !path.exists() {
            log::info!(
                "ReplaySource: sequence exhausted after {} frames in {}",
                self.index,
                self.dir.display()
            );
            return Ok(None);
        }
        let frame = storage::load_jpeg(&path)?;
        self.index += 1;
        Ok(Some(frame))
    }
}
