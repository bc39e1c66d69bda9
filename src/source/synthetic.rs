//! Synthetic frame source.
//!
//! Serves deterministic pixel patterns for tests and demos without touching
//! any capture hardware. Locator grammar:
//!
//! `stub://<pattern>?frames=N&width=W&height=H`
//!
//! All parameters are optional; without `frames` the source never ends.

use anyhow::{anyhow, Context, Result};

use crate::frame::VideoFrame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

pub(crate) struct SyntheticSource {
    width: u32,
    height: u32,
    /// Remaining frame budget, `None` = unbounded.
    remaining: Option<u64>,
    frame_count: u64,
}

impl SyntheticSource {
    pub(crate) fn parse(locator: &str) -> Result<Self> {
        let rest = locator
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a stub locator: {locator}"))?;
        let (pattern, query) = match rest.split_once('?') {
            Some((pattern, query)) => (pattern, Some(query)),
            None => (rest, None),
        };

        let mut width = DEFAULT_WIDTH;
        let mut height = DEFAULT_HEIGHT;
        let mut remaining = None;
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("malformed stub parameter: {pair}"))?;
                match key {
                    "frames" => {
                        remaining = Some(
                            value
                                .parse()
                                .with_context(|| format!("stub frames: {value}"))?,
                        )
                    }
                    "width" => {
                        width = value
                            .parse()
                            .with_context(|| format!("stub width: {value}"))?
                    }
                    "height" => {
                        height = value
                            .parse()
                            .with_context(|| format!("stub height: {value}"))?
                    }
                    other => return Err(anyhow!("unknown stub parameter: {other}")),
                }
            }
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("stub dimensions must be non-zero"));
        }

        log::info!("SyntheticSource: serving {pattern} ({width}x{height})");
        Ok(Self {
            width,
            height,
            remaining,
            frame_count: 0,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(VideoFrame::new(self.width, self.height, pixels)?))
    }

    /// Mix frame count and position so consecutive frames differ but the
    /// sequence is reproducible run to run.
    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.width as usize * self.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    pub(crate) fn release(&mut self) {
        self.remaining = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_query() {
        let mut source = SyntheticSource::parse("stub://front_camera").unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.width, DEFAULT_WIDTH);
        assert_eq!(frame.height, DEFAULT_HEIGHT);
    }

    #[test]
    fn frames_are_deterministic_per_index() {
        let mut a = SyntheticSource::parse("stub://a?width=4&height=4").unwrap();
        let mut b = SyntheticSource::parse("stub://b?width=4&height=4").unwrap();
        let fa = a.next_frame().unwrap().unwrap();
        let fb = b.next_frame().unwrap().unwrap();
        assert_eq!(fa.pixels, fb.pixels);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(SyntheticSource::parse("stub://x?width=0").is_err());
    }
}
