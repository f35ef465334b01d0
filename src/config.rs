use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alert::SlackConfig;

const DEFAULT_SPEED_MS: u64 = 2000;
const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_EXPORT_DIR: &str = "detected";
const DEFAULT_TRAINING_DIR: &str = "export";
const DEFAULT_TRAIN_FRAME_COUNT: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct SentrydConfigFile {
    speed_ms: Option<u64>,
    debug: Option<bool>,
    use_training: Option<bool>,
    train_frame_count: Option<u64>,
    export_dir: Option<PathBuf>,
    training_dir: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
    slack: Option<SlackConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SlackConfigFile {
    token: Option<String>,
    channel: Option<String>,
    blind: Option<bool>,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct SentrydConfig {
    /// Playback/record speed: inter-frame delay.
    pub speed: Duration,
    /// Log the changed-pixel ratio for every frame.
    pub debug: bool,
    /// Replay the stored training sequence instead of the live camera.
    pub use_training: bool,
    /// Frame count for training capture mode.
    pub train_frame_count: u64,
    /// Where alert images land.
    pub export_dir: PathBuf,
    /// Where training frames land (and are replayed from).
    pub training_dir: PathBuf,
    pub camera: CameraSettings,
    /// Absent when no messaging collaborator is configured.
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
}

impl SentrydConfig {
    /// Load from the JSON file named by `SENTRY_CONFIG` (if set), then apply
    /// `SENTRY_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTRY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentrydConfigFile) -> Self {
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
        };
        let slack = file.slack.and_then(|slack| {
            match (slack.token, slack.channel) {
                (Some(token), Some(channel)) => Some(SlackConfig {
                    token,
                    channel,
                    blind: slack.blind.unwrap_or(false),
                }),
                _ => None,
            }
        });
        Self {
            speed: Duration::from_millis(file.speed_ms.unwrap_or(DEFAULT_SPEED_MS)),
            debug: file.debug.unwrap_or(false),
            use_training: file.use_training.unwrap_or(false),
            train_frame_count: file
                .train_frame_count
                .unwrap_or(DEFAULT_TRAIN_FRAME_COUNT),
            export_dir: file
                .export_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR)),
            training_dir: file
                .training_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRAINING_DIR)),
            camera,
            slack,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(speed) = std::env::var("SENTRY_SPEED_MS") {
            let ms: u64 = speed
                .parse()
                .map_err(|_| anyhow!("SENTRY_SPEED_MS must be an integer number of milliseconds"))?;
            self.speed = Duration::from_millis(ms);
        }
        if let Ok(device) = std::env::var("SENTRY_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(dir) = std::env::var("SENTRY_EXPORT_DIR") {
            if !dir.trim().is_empty() {
                self.export_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("SENTRY_TRAINING_DIR") {
            if !dir.trim().is_empty() {
                self.training_dir = PathBuf::from(dir);
            }
        }
        if let Ok(token) = std::env::var("SENTRY_SLACK_TOKEN") {
            if !token.trim().is_empty() {
                let channel = self
                    .slack
                    .as_ref()
                    .map(|slack| slack.channel.clone())
                    .or_else(|| std::env::var("SENTRY_SLACK_CHANNEL").ok())
                    .ok_or_else(|| {
                        anyhow!("SENTRY_SLACK_TOKEN set without a channel (SENTRY_SLACK_CHANNEL)")
                    })?;
                let blind = self.slack.as_ref().map(|slack| slack.blind).unwrap_or(false);
                self.slack = Some(SlackConfig {
                    token,
                    channel,
                    blind,
                });
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.train_frame_count == 0 {
            return Err(anyhow!("train_frame_count must be greater than zero"));
        }
        if let Some(slack) = &self.slack {
            if slack.token.trim().is_empty() || slack.channel.trim().is_empty() {
                return Err(anyhow!("slack token and channel must be non-empty"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentrydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
