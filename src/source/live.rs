//! Live frame source.
//!
//! Pulls frames from the host's capture device. Real hardware goes through
//! V4L2 behind the `ingest-v4l2` feature; `stub://` device paths select a
//! synthetic backend that renders a static scene with a moving square, so the
//! pipeline can be exercised without a camera.
//!
//! Device acquisition is scoped: the device handle is owned by the source and
//! released when the source is dropped, on every exit path including open
//! failure. A read failure is fatal (`SentryError::Device`); the source never
//! masks it as normal exhaustion. There is no timeout on a single read; a
//! stalled device blocks indefinitely.

use anyhow::Result;

use crate::error::SentryError;
use crate::frame::{Frame, PixelFormat};

use super::FrameSource;

/// Configuration for a live source.
#[derive(Clone, Debug)]
pub struct LiveConfig {
    /// Device path (e.g., "/dev/video0"), or "stub://..." for the synthetic
    /// backend.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Live frame source.
pub struct LiveSource {
    backend: LiveBackend,
}

impl std::fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSource")
            .field("synthetic", &self.is_synthetic())
            .finish()
    }
}

enum LiveBackend {
    Synthetic(SyntheticLiveSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceLiveSource),
}

impl LiveSource {
    /// Open the capture device. The handle is held until the source is
    /// dropped.
    pub fn open(config: LiveConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            log::warn!(
                "LiveSource: {} selects the synthetic backend; its scene contains \
                 constant motion and will raise alerts in watch mode",
                config.device
            );
            return Ok(Self {
                backend: LiveBackend::Synthetic(SyntheticLiveSource::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: LiveBackend::Device(DeviceLiveSource::open(config)?),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(SentryError::Device(format!(
                "device {} requires the ingest-v4l2 feature",
                config.device
            ))
            .into())
        }
    }

    /// True when frames come from the synthetic backend rather than real
    /// hardware.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.backend, LiveBackend::Synthetic(_))
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        match &self.backend {
            LiveBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "ingest-v4l2")]
            LiveBackend::Device(source) => source.frame_count,
        }
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match &mut self.backend {
            LiveBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            LiveBackend::Device(source) => source.next_frame()?,
        };
        Ok(Some(frame))
    }
}

// ----------------------------------------------------------------------------
// Synthetic backend (stub://) for tests and development
// ----------------------------------------------------------------------------

struct SyntheticLiveSource {
    config: LiveConfig,
    frame_count: u64,
}

impl SyntheticLiveSource {
    fn new(config: LiveConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Frame {
        let frame = self.render();
        self.frame_count += 1;
        frame
    }

    /// Static gradient background with a bright square that advances one
    /// full side-length per frame. Consecutive positions are disjoint, so
    /// the double difference sees the square on both transitions and the
    /// changed-pixel ratio (about 2% of the frame) lands inside the
    /// detection band.
    fn render(&self) -> Frame {
        let width = self.config.width;
        let height = self.config.height;
        let side = (width / 8).max(1);
        let span = width.saturating_sub(side).max(1) as u64;
        let x0 = ((self.frame_count * side as u64) % span) as u32;
        let y0 = height / 3;

        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let in_square =
                    x >= x0 && x < x0 + side && y >= y0 && y < (y0 + side).min(height);
                let shade = if in_square {
                    230
                } else {
                    (x * 128 / width.max(1)) as u8
                };
                data.extend_from_slice(&[shade, shade, shade]);
            }
        }
        Frame::new(data, width, height, PixelFormat::Rgb)
    }
}

// ----------------------------------------------------------------------------
// V4L2 device backend
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceLiveSource {
    config: LiveConfig,
    state: DeviceState,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "ingest-v4l2")]
#[ouroboros::self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceLiveSource {
    fn open(config: LiveConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .map_err(|e| SentryError::Device(format!("open {}: {}", config.device, e)))?;

        let mut format = device
            .format()
            .map_err(|e| SentryError::Device(format!("read format on {}: {}", config.device, e)))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = device
            .set_format(&format)
            .map_err(|e| SentryError::Device(format!("set format on {}: {}", config.device, e)))?;
        if &format.fourcc.repr != b"RGB3" {
            return Err(SentryError::Device(format!(
                "device {} does not support RGB3 capture (got {})",
                config.device, format.fourcc
            ))
            .into());
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4).map_err(
                    |e| {
                        anyhow::Error::new(SentryError::Device(format!(
                            "create capture stream: {}",
                            e
                        )))
                    },
                )
            },
        }
        .try_build()?;

        log::info!(
            "LiveSource: opened {} ({}x{})",
            config.device,
            active_width,
            active_height
        );

        Ok(Self {
            config,
            state,
            frame_count: 0,
            active_width,
            active_height,
        })
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (buf, _meta) = self
            .state
            .with_mut(|fields| fields.stream.next())
            .map_err(|e| {
                SentryError::Device(format!("capture from {}: {}", self.config.device, e))
            })?;

        self.frame_count += 1;
        Ok(Frame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            PixelFormat::Rgb,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> LiveConfig {
        LiveConfig {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn stub_device_selects_the_synthetic_backend() {
        let source = LiveSource::open(stub_config()).unwrap();
        assert!(source.is_synthetic());
    }

    #[test]
    fn synthetic_source_produces_rgb_frames() {
        let mut source = LiveSource::open(stub_config()).unwrap();
        let frame = source.next_frame().unwrap().unwrap();

        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.format(), PixelFormat::Rgb);
        assert_eq!(source.frames_captured(), 1);
    }

    #[test]
    fn synthetic_scene_moves_between_frames() {
        let mut source = LiveSource::open(stub_config()).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();

        assert_ne!(first.pixels(), second.pixels());
    }

    #[test]
    fn synthetic_source_never_exhausts() {
        let mut source = LiveSource::open(stub_config()).unwrap();
        for _ in 0..100 {
            assert!(source.next_frame().unwrap().is_some());
        }
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_device_requires_feature() {
        let err = LiveSource::open(LiveConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::SentryError>(),
            Some(crate::error::SentryError::Device(_))
        ));
    }
}
