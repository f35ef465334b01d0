//! The sentry loop.
//!
//! Pulls frames from a source one at a time, advances the rolling two-frame
//! grayscale window, runs the double-difference detector, and dispatches
//! alerts. Single-threaded and cooperative: the only suspension point is the
//! configurable inter-frame delay, and the window is owned exclusively by the
//! loop.
//!
//! Alerts are raised with the *previous* raw frame, not the newest one: the
//! previous frame is the one straddled by both difference images, so it is
//! where the motion signal is centered.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::alert::{AlertEvent, AlertImage, AlertSink};
use crate::detect::{DetectorConfig, DoubleDiffDetector};
use crate::frame::Frame;
use crate::source::FrameSource;
use crate::storage;

/// Loop configuration. Explicit and owned by the caller; there is no
/// process-wide state.
#[derive(Clone, Debug)]
pub struct SentryConfig {
    /// Suspension between iterations (playback speed). Zero disables the
    /// delay.
    pub frame_delay: Duration,
    /// Stop after this many frames. `None` runs until the source is
    /// exhausted (or forever, for a live source).
    pub frame_limit: Option<u64>,
    /// Directory alert images are exported to. Created if absent.
    pub export_dir: PathBuf,
    /// Log the changed-pixel ratio for every frame.
    pub debug: bool,
    /// Detector thresholds.
    pub detector: DetectorConfig,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(2000),
            frame_limit: None,
            export_dir: PathBuf::from("detected"),
            debug: false,
            detector: DetectorConfig::default(),
        }
    }
}

/// Totals for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_processed: u64,
    pub alerts_raised: u64,
}

/// Orchestrates source → detector → alert dispatch.
pub struct SentryLoop {
    config: SentryConfig,
    detector: DoubleDiffDetector,
}

impl SentryLoop {
    pub fn new(config: SentryConfig) -> Self {
        let detector = DoubleDiffDetector::new(config.detector);
        Self { config, detector }
    }

    /// Run until the source is exhausted or the frame limit is reached.
    ///
    /// Fatal errors (device failure, shape mismatch, unreadable replay frame)
    /// propagate immediately. Alert side channels (image persistence,
    /// notification dispatch) are best-effort: failures are logged and the
    /// loop continues.
    pub fn run(&mut self, source: &mut dyn FrameSource, sink: &mut dyn AlertSink) -> Result<RunStats> {
        // The rolling window: two previous grayscale frames, plus the
        // previous raw frame the next alert would be raised with.
        let mut tm1_gray: Option<Frame> = None;
        let mut t_gray: Option<Frame> = None;
        let mut last_raw: Option<Frame> = None;
        let mut stats = RunStats::default();

        loop {
            if let Some(limit) = self.config.frame_limit {
                if stats.frames_processed >= limit {
                    log::info!("frame limit {} reached", limit);
                    break;
                }
            }

            let Some(raw) = source.next_frame()? else {
                break;
            };

            let eval = self
                .detector
                .evaluate(tm1_gray.as_ref(), t_gray.as_ref(), &raw)?;

            if self.config.debug {
                log::debug!(
                    "frame {}: changed_ratio={:.4} motion={}",
                    stats.frames_processed,
                    eval.changed_ratio,
                    eval.motion_detected
                );
            }

            if eval.motion_detected {
                // Warm-up guarantees two prior frames exist by the time the
                // detector can fire, so the straddled frame is present.
                if let Some(straddled) = last_raw.as_ref() {
                    self.dispatch_alert(straddled, sink);
                    stats.alerts_raised += 1;
                }
            }

            // Shift the window.
            tm1_gray = t_gray.take();
            t_gray = Some(eval.gray);
            last_raw = Some(raw);
            stats.frames_processed += 1;

            if !self.config.frame_delay.is_zero() {
                std::thread::sleep(self.config.frame_delay);
            }
        }

        log::info!(
            "sentry loop finished: {} frames, {} alerts",
            stats.frames_processed,
            stats.alerts_raised
        );
        Ok(stats)
    }

    /// Persist the frame and forward the event to the sink. Both steps are
    /// best-effort; a failed persist drops the image from the notification.
    fn dispatch_alert(&self, frame: &Frame, sink: &mut dyn AlertSink) {
        let now = Local::now();
        log::info!("movement detected at {}", now.format("%Y-%m-%d %H:%M:%S"));

        let filename = format!("{}.jpg", storage::timestamp_stem(now));
        let path = self.config.export_dir.join(&filename);
        let image = match self.persist_alert_image(&path, frame) {
            Ok(bytes) => Some(AlertImage {
                filename: filename.clone(),
                bytes,
            }),
            Err(e) => {
                log::warn!("failed to persist alert image {}: {:#}", path.display(), e);
                None
            }
        };

        let event = AlertEvent {
            timestamp: now,
            message: format!("Movement detected at {}", now.format("%Y-%m-%d %H:%M:%S")),
            image,
        };
        if let Err(e) = sink.notify(&event) {
            log::warn!("alert dispatch failed: {:#}", e);
        }
    }

    fn persist_alert_image(&self, path: &std::path::Path, frame: &Frame) -> Result<Vec<u8>> {
        storage::ensure_dir(&self.config.export_dir)?;
        storage::save_jpeg(path, frame)?;
        // Re-open the just-written file for transfer, as the sink receives
        // exactly what landed on disk.
        std::fs::read(path).with_context(|| format!("read back {}", path.display()))
    }
}
