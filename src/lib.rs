//! Detection streaming service.
//!
//! `sightline` streams live or pre-recorded video to browser clients over one
//! long-lived bidirectional websocket per session, annotating each frame with
//! object detections and aggregating those detections into per-region text
//! readouts. The same channel carries runtime reconfiguration: clients can
//! redefine regions of interest or switch the detection model without
//! interrupting the stream.
//!
//! # Module Structure
//!
//! - `source`: video sources (capture devices, stream locators, synthetic)
//! - `detect`: detector backend contract, warm-instance registry, backends
//! - `suppress`: duplicate-box suppression (greedy NMS)
//! - `region`: percentage-based regions and per-frame aggregation
//! - `annotate`: box/label drawing, JPEG + base64 encoding
//! - `session`: the per-connection control loop and state machine
//! - `server`: websocket/HTTP glue
//! - `config`: daemon configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod region;
pub mod server;
pub mod session;
pub mod source;
pub mod suppress;

pub use config::SightlineConfig;
pub use detect::{
    BackendLoader, BackendRegistry, Detection, DetectorBackend, SharedBackend, StubBackend,
};
pub use error::StreamError;
pub use frame::VideoFrame;
pub use region::{aggregate, parse_regions, Region, RegionResult};
pub use session::{SessionConfig, StreamSession};
pub use source::{SourceDescriptor, VideoSource};
pub use suppress::{suppress, OVERLAP_THRESHOLD};
