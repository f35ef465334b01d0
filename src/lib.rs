//! sentry-cam
//!
//! Dead-simple motion sentry. Frames come from a camera (or a stored
//! training sequence), pass through a three-frame double-difference motion
//! detector, and confirmed detections export an image and notify a
//! messaging collaborator.
//!
//! # Module Structure
//!
//! - `frame`: pixel container and grayscale conversion
//! - `detect`: the double-difference detector
//! - `source`: frame sources (live camera, stored replay)
//! - `sentry`: the acquisition/detection loop
//! - `capture`: training capture (acquire and store, no detection)
//! - `alert`: alert events and notification sinks
//! - `storage`: JPEG persistence and naming
//! - `config`: daemon configuration (file + env)
//!
//! The pipeline is single-threaded and cooperative: the loop owns the frame
//! window exclusively, and the only suspension point is the configurable
//! inter-frame delay.

pub mod alert;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod sentry;
pub mod source;
pub mod storage;

pub use alert::{AlertEvent, AlertImage, AlertSink, LogSink, SlackConfig, SlackSink};
pub use capture::{capture_training, CaptureConfig};
pub use config::SentrydConfig;
pub use detect::{DetectorConfig, DoubleDiffDetector, Evaluation};
pub use error::SentryError;
pub use frame::{Frame, PixelFormat};
pub use sentry::{RunStats, SentryConfig, SentryLoop};
pub use source::{FrameSource, LiveConfig, LiveSource, ReplaySource};
