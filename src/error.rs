use thiserror::Error;

use crate::frame::PixelFormat;

/// Fatal conditions with a typed identity.
///
/// Everything else in the crate flows through `anyhow`; these two are named
/// because callers and tests need to tell them apart from recoverable
/// side-channel failures (which are logged and swallowed by the loop).
#[derive(Debug, Error)]
pub enum SentryError {
    /// Two frames handed to the detector do not share width, height and
    /// color-space stage. This is a precondition violation, never retried.
    #[error(
        "frame shape mismatch: {expected_width}x{expected_height} {expected_format:?} \
         vs {actual_width}x{actual_height} {actual_format:?}"
    )]
    ShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        expected_format: PixelFormat,
        actual_width: u32,
        actual_height: u32,
        actual_format: PixelFormat,
    },

    /// A live capture device failed to open or read. Fatal for the loop;
    /// there is no retry or frame substitution.
    #[error("capture device error: {0}")]
    Device(String),
}
