//! Duplicate-box suppression.
//!
//! Greedy non-maximum suppression: detections are visited in descending
//! confidence order (stable sort, so equal confidences keep their input
//! order) and kept only when their overlap with every already-kept box stays
//! below `OVERLAP_THRESHOLD`. O(n^2) in detections per frame; n stays in the
//! tens.

use crate::detect::Detection;

/// Pairwise IoU at or above which the lower-confidence box is dropped.
pub const OVERLAP_THRESHOLD: f64 = 0.75;

/// Drop detections that heavily overlap a higher-confidence detection.
///
/// Deterministic: identical input sets produce identical kept sets.
pub fn suppress(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept.iter().all(|k| candidate.iou(k) < OVERLAP_THRESHOLD) {
            kept.push(candidate);
        }
    }
    kept
}
