//! V4L2 capture device source.
//!
//! Opens `/dev/video<index>` and captures RGB24 frames through a memory-mapped
//! buffer stream. Devices that cannot serve RGB24 are rejected at open time
//! rather than silently producing misinterpreted pixels.

use anyhow::{bail, Context, Result};
use ouroboros::self_referencing;

use crate::frame::VideoFrame;

pub(crate) struct DeviceSource {
    state: Option<DeviceState>,
    width: u32,
    height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceSource {
    pub(crate) fn open(index: u32) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = format!("/dev/video{index}");
        let device =
            v4l::Device::with_path(&path).with_context(|| format!("open capture device {path}"))?;

        let mut format = device.format().context("read capture format")?;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("DeviceSource: failed to set RGB24 on {path}: {err}");
                device
                    .format()
                    .context("read capture format after set failure")?
            }
        };
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            bail!("{path} does not support RGB24 capture");
        }
        let width = format.width;
        let height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create capture buffer stream"))
            },
        }
        .try_build()?;

        log::info!("DeviceSource: connected to {path} ({width}x{height})");
        Ok(Self {
            state: Some(state),
            width,
            height,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let (width, height) = (self.width, self.height);
        let frame = state.with_stream_mut(|stream| -> Result<VideoFrame> {
            let (buf, _meta) = stream.next().context("capture frame")?;
            let expected = width as usize * height as usize * 3;
            if buf.len() < expected {
                bail!("short capture buffer: {} < {}", buf.len(), expected);
            }
            VideoFrame::new(width, height, buf[..expected].to_vec())
        })?;
        Ok(Some(frame))
    }

    pub(crate) fn release(&mut self) {
        self.state = None;
    }
}
