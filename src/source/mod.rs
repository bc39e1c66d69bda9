//! Video sources.
//!
//! A session owns exactly one source, opened from a client-supplied
//! descriptor:
//! - `device:<index>` selects a local capture device by index
//! - `stub://<pattern>` selects a synthetic source (tests, demos)
//! - anything else is passed through as a stream locator (file path or URL)
//!
//! Real capture backends are feature-gated:
//! - FFmpeg stream/file decoding (feature: ingest-ffmpeg)
//! - V4L2 devices (feature: ingest-v4l2)
//!
//! The synthetic source is always available. `read` blocks the calling
//! thread until a frame exists; a source error mid-stream is logged and
//! mapped to end-of-stream rather than surfaced as a fault.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use crate::error::StreamError;
use crate::frame::VideoFrame;

use synthetic::SyntheticSource;

/// Parsed form of a client-supplied source descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Local capture device by index (`device:0`).
    Device(u32),
    /// Stream locator: file path, network URL, or `stub://` pattern.
    Locator(String),
}

impl SourceDescriptor {
    /// Parse a raw descriptor string.
    ///
    /// A malformed device index fails here, before any resource is acquired.
    pub fn parse(raw: &str) -> Result<Self, StreamError> {
        let raw = raw.trim();
        if let Some(index) = raw.strip_prefix("device:") {
            let index: u32 = index
                .parse()
                .map_err(|_| StreamError::InvalidDeviceIndex(index.to_string()))?;
            return Ok(Self::Device(index));
        }
        Ok(Self::Locator(raw.to_string()))
    }
}

/// A frame-producing origin with blocking reads and explicit release.
pub struct VideoSource {
    backend: SourceBackend,
    released: bool,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Stream(ffmpeg::FfmpegSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::DeviceSource),
}

impl VideoSource {
    /// Open a source for the given descriptor.
    pub fn open(descriptor: &SourceDescriptor) -> Result<Self, StreamError> {
        let backend = match descriptor {
            SourceDescriptor::Device(index) => open_device(*index)?,
            SourceDescriptor::Locator(locator) if locator.starts_with("stub://") => {
                SourceBackend::Synthetic(
                    SyntheticSource::parse(locator)
                        .map_err(|err| StreamError::SourceUnavailable(format!("{err:#}")))?,
                )
            }
            SourceDescriptor::Locator(locator) => open_stream(locator)?,
        };
        Ok(Self {
            backend,
            released: false,
        })
    }

    /// Read the next frame, blocking until one is available.
    ///
    /// Returns `None` when the source is exhausted. Source errors also end
    /// the stream: the session terminates gracefully either way.
    pub fn read(&mut self) -> Option<VideoFrame> {
        if self.released {
            return None;
        }
        let result = match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Stream(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.next_frame(),
        };
        match result {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("source read failed, treating as end of stream: {err:#}");
                None
            }
        }
    }

    /// Release the underlying capture resources. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Stream(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.release(),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(index: u32) -> Result<SourceBackend, StreamError> {
    let source = v4l2::DeviceSource::open(index)
        .map_err(|err| StreamError::SourceUnavailable(format!("device:{index}: {err:#}")))?;
    Ok(SourceBackend::Device(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(index: u32) -> Result<SourceBackend, StreamError> {
    Err(StreamError::SourceUnavailable(format!(
        "device:{index}: capture devices require the ingest-v4l2 feature"
    )))
}

#[cfg(feature = "ingest-ffmpeg")]
fn open_stream(locator: &str) -> Result<SourceBackend, StreamError> {
    let source = ffmpeg::FfmpegSource::open(locator)
        .map_err(|err| StreamError::SourceUnavailable(format!("{locator}: {err:#}")))?;
    Ok(SourceBackend::Stream(source))
}

#[cfg(not(feature = "ingest-ffmpeg"))]
fn open_stream(locator: &str) -> Result<SourceBackend, StreamError> {
    Err(StreamError::SourceUnavailable(format!(
        "{locator}: stream decoding requires the ingest-ffmpeg feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_descriptors() {
        assert_eq!(
            SourceDescriptor::parse("device:0").unwrap(),
            SourceDescriptor::Device(0)
        );
        assert_eq!(
            SourceDescriptor::parse("device:12").unwrap(),
            SourceDescriptor::Device(12)
        );
    }

    #[test]
    fn rejects_malformed_device_indices() {
        for raw in ["device:-1", "device:abc", "device:", "device:1.5"] {
            match SourceDescriptor::parse(raw) {
                Err(StreamError::InvalidDeviceIndex(_)) => {}
                other => panic!("{raw} should be an invalid device index, got {other:?}"),
            }
        }
    }

    #[test]
    fn passes_locators_through() {
        assert_eq!(
            SourceDescriptor::parse("rtsp://camera-1/stream").unwrap(),
            SourceDescriptor::Locator("rtsp://camera-1/stream".to_string())
        );
        assert_eq!(
            SourceDescriptor::parse("  /var/media/clip.mp4 ").unwrap(),
            SourceDescriptor::Locator("/var/media/clip.mp4".to_string())
        );
    }

    #[test]
    fn synthetic_source_honors_frame_budget() {
        let descriptor = SourceDescriptor::parse("stub://flat?frames=2&width=8&height=8").unwrap();
        let mut source = VideoSource::open(&descriptor).unwrap();
        assert!(source.read().is_some());
        assert!(source.read().is_some());
        assert!(source.read().is_none());
    }

    #[test]
    fn release_is_idempotent_and_ends_reads() {
        let descriptor = SourceDescriptor::parse("stub://flat").unwrap();
        let mut source = VideoSource::open(&descriptor).unwrap();
        assert!(source.read().is_some());
        source.release();
        source.release();
        assert!(source.read().is_none());
    }

    #[test]
    fn malformed_stub_parameters_are_unavailable() {
        let descriptor = SourceDescriptor::parse("stub://flat?frames=lots").unwrap();
        match VideoSource::open(&descriptor) {
            Err(StreamError::SourceUnavailable(_)) => {}
            Err(other) => panic!("expected SourceUnavailable, got {other:?}"),
            Ok(_) => panic!("expected SourceUnavailable, got an open source"),
        }
    }
}
