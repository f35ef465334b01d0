//! Motion detection.

mod double_diff;

pub use double_diff::{DetectorConfig, DoubleDiffDetector, Evaluation};
