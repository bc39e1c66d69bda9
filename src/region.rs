//! Region aggregation.
//!
//! Clients define percentage-based rectangles, independent of frame
//! resolution. Each cycle the aggregator maps them onto pixel space for the
//! current frame size and reads out, per region, the labels of detections
//! whose center falls inside, in left-to-right order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::Detection;

/// Client-defined rectangle in percent of the frame.
///
/// Held by the session and replaced wholesale on each `regions` control
/// message, never partially merged.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Region {
    pub id: Value,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Per-frame readout for one region. Recomputed every cycle, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionResult {
    pub id: Value,
    pub value: String,
}

/// Parse a raw region list, skipping entries that do not carry the expected
/// numeric fields. A malformed entry never fails the rest of the list.
pub fn parse_regions(raw: &[Value]) -> Vec<Region> {
    raw.iter()
        .filter_map(|entry| serde_json::from_value::<Region>(entry.clone()).ok())
        .filter(|region| {
            [region.x, region.y, region.w, region.h]
                .iter()
                .all(|v| v.is_finite())
        })
        .collect()
}

/// Aggregate detections into per-region readouts for one frame.
///
/// Output order matches region order; identifiers pass through opaquely.
pub fn aggregate(
    width: u32,
    height: u32,
    regions: &[Region],
    detections: &[Detection],
) -> Vec<RegionResult> {
    regions
        .iter()
        .map(|region| RegionResult {
            id: region.id.clone(),
            value: region_value(width, height, region, detections),
        })
        .collect()
}

fn region_value(width: u32, height: u32, region: &Region, detections: &[Detection]) -> String {
    let clamp = |v: f64| v.clamp(0.0, 100.0);
    let (x, y, w, h) = (
        clamp(region.x),
        clamp(region.y),
        clamp(region.w),
        clamp(region.h),
    );
    // a degenerate rectangle collects nothing
    if w == 0.0 || h == 0.0 {
        return String::new();
    }

    let rx1 = (x / 100.0 * width as f64).round();
    let ry1 = (y / 100.0 * height as f64).round();
    let rx2 = ((x + w) / 100.0 * width as f64).round();
    let ry2 = ((y + h) / 100.0 * height as f64).round();

    let mut hits: Vec<&Detection> = detections
        .iter()
        .filter(|det| {
            let (cx, cy) = det.center();
            rx1 <= cx && cx <= rx2 && ry1 <= cy && cy <= ry2
        })
        .collect();
    hits.sort_by_key(|det| det.x1);
    hits.iter().map(|det| det.label.as_str()).collect()
}
