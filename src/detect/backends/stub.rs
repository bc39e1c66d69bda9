use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::Detection;
use crate::frame::VideoFrame;

/// Scripted backend for tests and demos.
///
/// Returns the same detection set for every frame, untouched.
pub struct StubBackend {
    name: String,
    detections: Vec<Detection>,
}

impl StubBackend {
    pub fn new(name: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            name: name.into(),
            detections,
        }
    }

    /// Backend that never detects anything.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, _frame: &VideoFrame) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}
