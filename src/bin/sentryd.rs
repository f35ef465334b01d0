//! sentryd - motion sentry daemon
//!
//! Modes:
//! 1. Watch (default): pull frames from the camera, detect motion, export an
//!    image and notify on each detection.
//! 2. Replay (`--training`): run the same loop over the stored training
//!    sequence; ends when the sequence is exhausted.
//! 3. Capture (`--capture=N`): store N raw frames for later replay; no
//!    detection.

use anyhow::Result;
use clap::Parser;

use sentry_cam::{
    capture_training, AlertSink, CaptureConfig, LiveConfig, LiveSource, LogSink, ReplaySource,
    SentryConfig, SentryLoop, SentrydConfig, SlackConfig, SlackSink,
};

#[derive(Parser, Debug)]
#[command(name = "sentryd", about = "Dead-simple motion sentry", version)]
struct Args {
    /// Playback or record speed in milliseconds
    #[arg(long)]
    speed: Option<u64>,

    /// Replay the training sequence instead of the live camera
    #[arg(long)]
    training: bool,

    /// Log the changed-pixel ratio for every frame
    #[arg(long)]
    debug: bool,

    /// Capture and save a set of images, then exit. Without a value, the
    /// configured train_frame_count applies.
    #[arg(long, value_name = "NUMBER", num_args = 0..=1, require_equals = true)]
    capture: Option<Option<u64>>,

    /// Send a Slack message for each detection
    #[arg(long)]
    slack: bool,

    /// OAuth token to interact on Slack
    #[arg(long, env = "SENTRY_SLACK_TOKEN")]
    slack_token: Option<String>,

    /// Which Slack channel to interact on
    #[arg(long, env = "SENTRY_SLACK_CHANNEL")]
    slack_channel: Option<String>,

    /// Send text-only messages, omitting the image upload
    #[arg(long)]
    slack_blind: bool,

    /// Stop after this many frames (mainly for supervised runs)
    #[arg(long, value_name = "NUMBER")]
    frame_limit: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = SentrydConfig::load()?;
    apply_cli(&mut cfg, &args)?;

    if let Some(requested) = args.capture {
        return run_capture(&cfg, capture_count(requested, &cfg));
    }
    run_watch(&cfg, &args)
}

/// `--capture=N` wins; a bare `--capture` falls back to the configured
/// train_frame_count.
fn capture_count(requested: Option<u64>, cfg: &SentrydConfig) -> u64 {
    requested.unwrap_or(cfg.train_frame_count)
}

/// CLI flags override file and environment configuration.
fn apply_cli(cfg: &mut SentrydConfig, args: &Args) -> Result<()> {
    if let Some(speed) = args.speed {
        cfg.speed = std::time::Duration::from_millis(speed);
    }
    if args.training {
        cfg.use_training = true;
    }
    if args.debug {
        cfg.debug = true;
    }
    if args.slack {
        let token = args
            .slack_token
            .clone()
            .or_else(|| cfg.slack.as_ref().map(|slack| slack.token.clone()))
            .ok_or_else(|| anyhow::anyhow!("--slack requires --slack-token"))?;
        let channel = args
            .slack_channel
            .clone()
            .or_else(|| cfg.slack.as_ref().map(|slack| slack.channel.clone()))
            .ok_or_else(|| anyhow::anyhow!("--slack requires --slack-channel"))?;
        cfg.slack = Some(SlackConfig {
            token,
            channel,
            blind: args.slack_blind
                || cfg.slack.as_ref().map(|slack| slack.blind).unwrap_or(false),
        });
    }
    Ok(())
}

fn run_capture(cfg: &SentrydConfig, count: u64) -> Result<()> {
    let mut source = LiveSource::open(LiveConfig {
        device: cfg.camera.device.clone(),
        width: cfg.camera.width,
        height: cfg.camera.height,
    })?;
    let written = capture_training(
        &mut source,
        &CaptureConfig {
            dir: cfg.training_dir.clone(),
            count,
            frame_delay: cfg.speed,
        },
    )?;
    log::info!("capture done: {} frames", written);
    Ok(())
}

fn run_watch(cfg: &SentrydConfig, args: &Args) -> Result<()> {
    let mut sink: Box<dyn AlertSink> = match (args.slack, &cfg.slack) {
        (true, Some(slack)) => {
            log::info!(
                "alerting to slack channel {} (blind={})",
                slack.channel,
                slack.blind
            );
            Box::new(SlackSink::new(slack.clone()))
        }
        _ => {
            log::info!("no messaging collaborator configured; logging alerts only");
            Box::new(LogSink)
        }
    };

    let mut sentry = SentryLoop::new(SentryConfig {
        frame_delay: cfg.speed,
        frame_limit: args.frame_limit,
        export_dir: cfg.export_dir.clone(),
        debug: cfg.debug,
        detector: Default::default(),
    });

    let stats = if cfg.use_training {
        log::info!("replaying training sequence from {}", cfg.training_dir.display());
        let mut source = ReplaySource::new(cfg.training_dir.clone());
        sentry.run(&mut source, sink.as_mut())?
    } else {
        log::info!("watching live device {}", cfg.camera.device);
        let mut source = LiveSource::open(LiveConfig {
            device: cfg.camera.device.clone(),
            width: cfg.camera.width,
            height: cfg.camera.height,
        })?;
        sentry.run(&mut source, sink.as_mut())?
    };

    log::info!(
        "done: {} frames processed, {} alerts raised",
        stats.frames_processed,
        stats.alerts_raised
    );
    Ok(())
}
