use anyhow::Result;

use crate::detect::Detection;
use crate::frame::VideoFrame;

/// Detector backend contract.
///
/// A backend maps one frame to an ordered sequence of raw detections. One
/// warmed instance exists per model identifier for the process lifetime;
/// `infer` takes `&mut self` so implementations may keep scratch state
/// between frames. Implementations must not retain the frame beyond the
/// `infer` call.
pub trait DetectorBackend: Send {
    /// Identifier this backend was warmed for.
    fn name(&self) -> &str;

    /// Run detection on one frame, returning raw (pre-suppression) detections.
    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once when the backend enters the registry.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
