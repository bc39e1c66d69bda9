//! Stream session control loop.
//!
//! One session owns one video source, one active detector selection, and one
//! active region set for the lifetime of a connection. The loop runs as
//! synchronous code on a blocking worker; the transport feeds inbound control
//! texts through one channel lane and consumes outbound payload texts through
//! another, so control polling never stalls frame production and a slow peer
//! throttles it instead of growing a queue.
//!
//! Per cycle: read frame, poll one pending control message, infer, suppress,
//! aggregate regions, annotate + encode, send, pace.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::annotate;
use crate::detect::{BackendRegistry, SharedBackend};
use crate::error::StreamError;
use crate::region::{self, Region, RegionResult};
use crate::source::{SourceDescriptor, VideoSource};
use crate::suppress::suppress;

/// Default pacing between outbound frames (~30 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);
const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Per-session tunables, derived from the daemon config.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Detector identifier used when the start command does not name one.
    pub default_model: String,
    pub frame_interval: Duration,
    pub jpeg_quality: u8,
}

impl SessionConfig {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Combined outbound message for one frame.
#[derive(Serialize)]
struct FramePayload<'a> {
    image: String,
    results: &'a [RegionResult],
}

/// Mid-stream control messages. Anything else on the wire is ignored.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlMessage {
    Regions {
        #[serde(default)]
        regions: Vec<Value>,
    },
    Model {
        model: String,
    },
    #[serde(other)]
    Other,
}

/// Interpreted first message of a session.
struct StartRequest {
    source: String,
    regions: Vec<Value>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct StartEnvelope {
    r#type: String,
    source: String,
    #[serde(default)]
    regions: Vec<Value>,
    #[serde(default)]
    model: Option<String>,
}

impl StartRequest {
    /// A payload that parses as a `start` envelope is used as such; anything
    /// else is taken verbatim as a source descriptor.
    fn parse(text: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<StartEnvelope>(text) {
            if envelope.r#type == "start" {
                return Self {
                    source: envelope.source,
                    regions: envelope.regions,
                    model: envelope.model,
                };
            }
        }
        Self {
            source: text.to_string(),
            regions: Vec::new(),
            model: None,
        }
    }
}

/// Why a session ended. Logged, never sent to the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionEnd {
    EndOfStream,
    PeerDisconnected,
    Fatal,
}

pub struct StreamSession {
    registry: Arc<BackendRegistry>,
    config: SessionConfig,
    inbound: Receiver<String>,
    outbound: Sender<String>,
}

impl StreamSession {
    pub fn new(
        registry: Arc<BackendRegistry>,
        config: SessionConfig,
        inbound: Receiver<String>,
        outbound: Sender<String>,
    ) -> Self {
        Self {
            registry,
            config,
            inbound,
            outbound,
        }
    }

    /// Drive the session to completion. Blocking; run on a dedicated worker.
    pub fn run(mut self) {
        let end = self.await_start_and_stream();
        log::info!("session closed ({end:?})");
    }

    fn await_start_and_stream(&mut self) -> SessionEnd {
        let Some(first) = self.inbound.blocking_recv() else {
            return SessionEnd::PeerDisconnected;
        };
        let start = StartRequest::parse(&first);

        let descriptor = match SourceDescriptor::parse(&start.source) {
            Ok(descriptor) => descriptor,
            Err(err) => return self.fail(err),
        };
        let mut source = match VideoSource::open(&descriptor) {
            Ok(source) => source,
            Err(err) => return self.fail(err),
        };

        let model = start
            .model
            .unwrap_or_else(|| self.config.default_model.clone());
        let backend = match self.registry.select(&model) {
            Ok(backend) => backend,
            Err(err) => {
                source.release();
                return self.fail(err);
            }
        };
        let regions = region::parse_regions(&start.regions);
        log::info!("session streaming ({descriptor:?}, model {model})");

        let end = self.stream(&mut source, backend, regions);
        source.release();
        end
    }

    /// Report a fatal condition and close.
    fn fail(&mut self, err: StreamError) -> SessionEnd {
        let _ = self.outbound.blocking_send(format!("ERROR: {err}"));
        SessionEnd::Fatal
    }

    fn stream(
        &mut self,
        source: &mut VideoSource,
        mut backend: SharedBackend,
        mut regions: Vec<Region>,
    ) -> SessionEnd {
        loop {
            let Some(frame) = source.read() else {
                return SessionEnd::EndOfStream;
            };

            // Poll, never wait: an absent control message must not delay the
            // frame. A message arriving between polls is picked up next cycle.
            match self.inbound.try_recv() {
                Ok(text) => self.apply_control(&text, &mut backend, &mut regions),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return SessionEnd::PeerDisconnected,
            }

            let raw = {
                let mut guard = backend
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match guard.infer(&frame) {
                    Ok(raw) => raw,
                    Err(err) => {
                        log::warn!("detector failed on frame, continuing: {err:#}");
                        Vec::new()
                    }
                }
            };
            let kept = suppress(raw);
            let results = region::aggregate(frame.width, frame.height, &regions, &kept);

            let image = match annotate::render(&frame, &kept, self.config.jpeg_quality) {
                Ok(image) => image,
                Err(err) => {
                    log::warn!("frame encode failed, skipping frame: {err:#}");
                    continue;
                }
            };
            let payload = FramePayload {
                image,
                results: &results,
            };
            let text = match serde_json::to_string(&payload) {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("payload serialization failed, skipping frame: {err}");
                    continue;
                }
            };
            if self.outbound.blocking_send(text).is_err() {
                return SessionEnd::PeerDisconnected;
            }

            if !self.config.frame_interval.is_zero() {
                std::thread::sleep(self.config.frame_interval);
            }
        }
    }

    fn apply_control(&self, text: &str, backend: &mut SharedBackend, regions: &mut Vec<Region>) {
        let Ok(message) = serde_json::from_str::<ControlMessage>(text) else {
            log::debug!("dropping unparseable control message");
            return;
        };
        match message {
            ControlMessage::Regions { regions: raw } => {
                *regions = region::parse_regions(&raw);
            }
            ControlMessage::Model { model } => match self.registry.select(&model) {
                Ok(swapped) => {
                    log::info!("switched detector backend to {model}");
                    *backend = swapped;
                }
                // an unresolvable selection keeps the prior backend in force
                Err(err) => log::debug!("ignoring model switch: {err}"),
            },
            ControlMessage::Other => {
                log::debug!("ignoring unrecognized control message");
            }
        }
    }
}
