#![cfg(feature = "backend-tract")]

//! Tract-based ONNX detector backend.
//!
//! Loads a local model file and performs inference on RGB frames. Expects a
//! `1x3xNxN` float input and an output of rows
//! `[x1, y1, x2, y2, confidence, class]` in input pixel space. Class labels
//! come from an optional `<stem>.labels` sidecar, one label per line, since
//! ONNX files do not embed class names.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::Detection;
use crate::frame::VideoFrame;

/// Square input edge expected by the detection models.
const INPUT_SIZE: u32 = 640;
/// Raw detections below this confidence are discarded before suppression.
const CONFIDENCE_FLOOR: f32 = 0.25;

pub struct TractBackend {
    name: String,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    labels: Vec<String>,
}

impl TractBackend {
    pub fn new(identifier: &str, model_path: &Path) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            name: identifier.to_string(),
            model,
            labels: load_labels(model_path),
        })
    }

    fn build_input(&self, frame: &VideoFrame) -> Result<Tensor> {
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = image::imageops::resize(
            &image,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn label_for(&self, cls_id: u32) -> String {
        self.labels
            .get(cls_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class{cls_id}"))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("model run failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let sx = frame.width as f32 / INPUT_SIZE as f32;
        let sy = frame.height as f32 / INPUT_SIZE as f32;

        let flat: Vec<f32> = rows.iter().copied().collect();
        let mut detections = Vec::new();
        for row in flat.chunks_exact(6) {
            let confidence = row[4];
            if !(CONFIDENCE_FLOOR..=1.0).contains(&confidence) {
                continue;
            }
            let cls_id = row[5].max(0.0) as u32;
            detections.push(Detection {
                x1: (row[0].min(row[2]) * sx).round() as i32,
                y1: (row[1].min(row[3]) * sy).round() as i32,
                x2: (row[0].max(row[2]) * sx).round() as i32,
                y2: (row[1].max(row[3]) * sy).round() as i32,
                cls_id,
                confidence,
                label: self.label_for(cls_id),
            });
        }
        Ok(detections)
    }
}

fn load_labels(model_path: &Path) -> Vec<String> {
    let sidecar = model_path.with_extension("labels");
    match std::fs::read_to_string(&sidecar) {
        Ok(raw) => raw
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}
