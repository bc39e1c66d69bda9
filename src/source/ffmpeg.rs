//! FFmpeg-backed stream source.
//!
//! Decodes file paths and network stream URLs (RTSP, HTTP) in-memory and
//! hands frames over as RGB24. Demuxer exhaustion is end-of-stream, not an
//! error.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::VideoFrame;

pub(crate) struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    finished: bool,
}

impl FfmpegSource {
    pub(crate) fn open(locator: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&locator)
            .with_context(|| format!("open stream '{locator}'"))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("stream has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context.decoder().video().context("open video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create scaler")?;

        log::info!("FfmpegSource: connected to {locator}");
        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            finished: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb = ffmpeg::frame::Video::empty();

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to decoder")?;
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                self.scaler
                    .run(&decoded, &mut rgb)
                    .context("scale frame to RGB")?;
                return Ok(Some(rgb_to_frame(&rgb)?));
            }
        }

        self.finished = true;
        let _ = self.decoder.send_eof();
        Ok(None)
    }

    pub(crate) fn release(&mut self) {
        self.finished = true;
    }
}

/// Copy a decoded RGB24 plane into a tightly packed buffer, stripping the
/// per-row stride padding FFmpeg may leave in place.
fn rgb_to_frame(frame: &ffmpeg::frame::Video) -> Result<VideoFrame> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    VideoFrame::new(width, height, pixels)
}
