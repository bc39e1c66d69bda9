//! Pure-Rust fallback detector.
//!
//! Splits the frame into a coarse grid and reports cells whose mean luminance
//! clears a fixed threshold. It stands in for real inference when the crate
//! is built without an ONNX backend; boxes and confidences are deterministic
//! for a given frame.

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::Detection;
use crate::frame::VideoFrame;

const GRID: u32 = 8;
const LUMA_THRESHOLD: f32 = 200.0;

pub struct LumaBackend {
    name: String,
}

impl LumaBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DetectorBackend for LumaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let cell_w = (frame.width / GRID).max(1);
        let cell_h = (frame.height / GRID).max(1);

        let mut detections = Vec::new();
        for gy in 0..GRID {
            for gx in 0..GRID {
                let x1 = gx * cell_w;
                let y1 = gy * cell_h;
                if x1 >= frame.width || y1 >= frame.height {
                    continue;
                }
                let x2 = (x1 + cell_w).min(frame.width);
                let y2 = (y1 + cell_h).min(frame.height);

                let luma = mean_luma(frame, x1, y1, x2, y2);
                if luma < LUMA_THRESHOLD {
                    continue;
                }
                detections.push(Detection {
                    x1: x1 as i32,
                    y1: y1 as i32,
                    x2: x2 as i32 - 1,
                    y2: y2 as i32 - 1,
                    cls_id: 0,
                    confidence: (luma / 255.0).min(1.0),
                    label: "bright".to_string(),
                });
            }
        }
        Ok(detections)
    }
}

fn mean_luma(frame: &VideoFrame, x1: u32, y1: u32, x2: u32, y2: u32) -> f32 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in y1..y2 {
        for x in x1..x2 {
            let idx = (y as usize * frame.width as usize + x as usize) * 3;
            let r = frame.pixels[idx] as u64;
            let g = frame.pixels[idx + 1] as u64;
            let b = frame.pixels[idx + 2] as u64;
            // integer Rec.601 approximation
            sum += (77 * r + 150 * g + 29 * b) >> 8;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32
    }
}
