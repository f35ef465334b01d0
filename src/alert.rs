//! Alert events and notification sinks.
//!
//! A detection produces one `AlertEvent`: a timestamp, a rendered message and
//! optionally the persisted image. Sinks receive the event and own delivery;
//! the loop treats dispatch failure as recoverable (logged, never retried).
//!
//! Two sinks ship with the crate: `SlackSink` posts to the Slack Web API
//! (text-only in blind mode, `files.upload` with the image otherwise), and
//! `LogSink` just logs, for deployments without a messaging collaborator.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;

const SLACK_API_URL: &str = "https://slack.com/api";
const BLIND_USERNAME: &str = "Mini-Sentry";
const BLIND_ICON_URL: &str =
    "https://wiki.teamfortress.com/w/images/e/ea/Red_Mini_Sentry.png";

/// Persisted image attached to an alert.
#[derive(Clone, Debug)]
pub struct AlertImage {
    /// Filename the image was persisted under (used as display title).
    pub filename: String,
    /// JPEG bytes as written to disk.
    pub bytes: Vec<u8>,
}

/// One confirmed detection, handed to the sink. Not retained after dispatch.
#[derive(Clone, Debug)]
pub struct AlertEvent {
    pub timestamp: DateTime<Local>,
    pub message: String,
    /// Absent when image persistence failed or the sink runs blind.
    pub image: Option<AlertImage>,
}

/// Notification sink. One method, optional image payload; blind transports
/// simply ignore the image.
pub trait AlertSink {
    fn notify(&mut self, event: &AlertEvent) -> Result<()>;
}

// ----------------------------------------------------------------------------
// LogSink
// ----------------------------------------------------------------------------

/// Sink that only logs. Used when no messaging collaborator is configured.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn notify(&mut self, event: &AlertEvent) -> Result<()> {
        match &event.image {
            Some(image) => log::info!("{} (image: {})", event.message, image.filename),
            None => log::info!("{}", event.message),
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// SlackSink
// ----------------------------------------------------------------------------

/// Slack sink configuration.
#[derive(Clone, Debug)]
pub struct SlackConfig {
    /// OAuth token.
    pub token: String,
    /// Channel to post to.
    pub channel: String,
    /// Blind mode: send text only, never upload the image.
    pub blind: bool,
}

/// Sink posting to the Slack Web API.
pub struct SlackSink {
    config: SlackConfig,
    agent: ureq::Agent,
    api_url: String,
}

/// Minimal shape of a Slack Web API response.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackSink {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            agent: ureq::Agent::new(),
            api_url: SLACK_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_url(config: SlackConfig, api_url: String) -> Self {
        Self {
            config,
            agent: ureq::Agent::new(),
            api_url,
        }
    }

    fn post_text(&self, text: &str) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_url);
        let response = self
            .agent
            .post(&url)
            .send_form(&[
                ("token", self.config.token.as_str()),
                ("channel", self.config.channel.as_str()),
                ("text", text),
                ("as_user", "false"),
                ("username", BLIND_USERNAME),
                ("icon_url", BLIND_ICON_URL),
            ])
            .context("post chat.postMessage")?;
        check_slack_response(response)
    }

    fn post_image(&self, comment: &str, image: &AlertImage) -> Result<()> {
        let url = format!("{}/files.upload", self.api_url);
        let boundary = format!("sentry-cam-{}", Local::now().timestamp_nanos_opt().unwrap_or(0));
        let body = encode_upload_form(
            &boundary,
            &[
                ("token", &self.config.token),
                ("channels", &self.config.channel),
                ("title", &image.filename),
                ("initial_comment", comment),
            ],
            &image.filename,
            &image.bytes,
        );
        let response = self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
            .context("post files.upload")?;
        check_slack_response(response)
    }
}

impl AlertSink for SlackSink {
    fn notify(&mut self, event: &AlertEvent) -> Result<()> {
        match (&event.image, self.config.blind) {
            // Image persistence may have failed; the notification still goes
            // out as text.
            (Some(image), false) => self.post_image(&event.message, image),
            _ => self.post_text(&event.message),
        }
    }
}

fn check_slack_response(response: ureq::Response) -> Result<()> {
    let raw = response.into_string().context("read slack response")?;
    let parsed: SlackResponse =
        serde_json::from_str(&raw).context("decode slack response")?;
    if !parsed.ok {
        return Err(anyhow!(
            "slack rejected the request: {}",
            parsed.error.unwrap_or_else(|| "unknown error".to_string())
        ));
    }
    Ok(())
}

/// Encode a `multipart/form-data` body with text fields plus one JPEG file
/// part named `file`.
fn encode_upload_form(
    boundary: &str,
    fields: &[(&str, &str)],
    filename: &str,
    file_bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_form_contains_fields_and_file() {
        let body = encode_upload_form(
            "b123",
            &[("token", "xoxb-1"), ("channels", "#alerts")],
            "26-03-07T09-05-02.jpg",
            b"\xff\xd8jpegdata",
        );
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("--b123\r\n"));
        assert!(text.contains("name=\"token\"\r\n\r\nxoxb-1"));
        assert!(text.contains("name=\"channels\"\r\n\r\n#alerts"));
        assert!(text.contains("filename=\"26-03-07T09-05-02.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg"));
        assert!(text.ends_with("--b123--\r\n"));
    }

    #[test]
    fn slack_error_response_is_surfaced() {
        let parsed: SlackResponse =
            serde_json::from_str(r#"{"ok": false, "error": "invalid_auth"}"#).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error.as_deref(), Some("invalid_auth"));
    }

    #[test]
    fn slack_ok_response_parses() {
        let parsed: SlackResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(parsed.ok);
        assert!(parsed.error.is_none());
    }

    fn unroutable_sink(blind: bool) -> SlackSink {
        SlackSink::with_api_url(
            SlackConfig {
                token: "t".into(),
                channel: "c".into(),
                blind,
            },
            // Port 0 is never routable; notify fails at connect, after the
            // endpoint decision has been made.
            "http://127.0.0.1:0".into(),
        )
    }

    fn event_with_image() -> AlertEvent {
        AlertEvent {
            timestamp: Local::now(),
            message: "Movement detected".into(),
            image: Some(AlertImage {
                filename: "x.jpg".into(),
                bytes: vec![1, 2, 3],
            }),
        }
    }

    #[test]
    fn blind_sink_routes_to_text_even_with_image() {
        let mut sink = unroutable_sink(true);
        let err = sink.notify(&event_with_image()).unwrap_err();
        assert!(format!("{err:#}").contains("chat.postMessage"));
    }

    #[test]
    fn sighted_sink_routes_to_upload_when_image_present() {
        let mut sink = unroutable_sink(false);
        let err = sink.notify(&event_with_image()).unwrap_err();
        assert!(format!("{err:#}").contains("files.upload"));
    }

    #[test]
    fn sighted_sink_falls_back_to_text_without_image() {
        let mut sink = unroutable_sink(false);
        let event = AlertEvent {
            image: None,
            ..event_with_image()
        };
        let err = sink.notify(&event).unwrap_err();
        assert!(format!("{err:#}").contains("chat.postMessage"));
    }

    #[test]
    fn log_sink_accepts_events_without_image() {
        let mut sink = LogSink;
        let event = AlertEvent {
            timestamp: Local::now(),
            message: "Movement detected".into(),
            image: None,
        };
        assert!(sink.notify(&event).is_ok());
    }
}
