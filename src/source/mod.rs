//! Frame sources.
//!
//! A source produces the next frame or signals exhaustion. Two variants:
//! - `LiveSource`: the host capture device. Exhaustion only on device
//!   failure, which is an error, never a silent end.
//! - `ReplaySource`: sequentially numbered stored frames. Exhaustion when the
//!   next index is missing, which ends the loop cleanly.

mod live;
mod replay;

use anyhow::Result;

use crate::frame::Frame;

pub use live::{LiveConfig, LiveSource};
pub use replay::ReplaySource;

/// Capability shared by all sources: produce the next frame or signal
/// exhaustion (`Ok(None)`).
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
