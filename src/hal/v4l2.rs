//! V4L2 camera.
//!
//! Opens a local device node (e.g. `/dev/video0`), negotiates the requested
//! resolution and streams through mmap buffers. Whatever pixel format the
//! driver settles on is reported with each capture; color normalization
//! happens in the vision source, not here.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::{Camera, PixelFormat, RawCapture};
use crate::session::Resource;

#[self_referencing]
struct Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Camera {
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    stream: Option<Stream>,
    frame_count: u64,
}

impl V4l2Camera {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            width: 640,
            height: 480,
            format: PixelFormat::Rgb24,
            stream: None,
            frame_count: 0,
        }
    }
}

fn pixel_format(fourcc: v4l::FourCC) -> Result<PixelFormat> {
    match &fourcc.repr {
        b"RGB3" => Ok(PixelFormat::Rgb24),
        b"BGR3" => Ok(PixelFormat::Bgr24),
        b"NV12" => Ok(PixelFormat::Nv12),
        b"YUYV" => Ok(PixelFormat::Yuyv),
        other => Err(anyhow!(
            "unsupported v4l2 pixel format {}",
            String::from_utf8_lossy(other)
        )),
    }
}

impl Camera for V4l2Camera {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        if self.stream.is_some() {
            return Err(anyhow!("cannot reconfigure {} while streaming", self.path));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.path)
            .with_context(|| format!("open v4l2 device {}", self.path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.width;
        format.height = self.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", self.path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = pixel_format(format.fourcc)?;
        self.width = format.width;
        self.height = format.height;

        let stream = StreamTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.stream = Some(stream);

        log::info!(
            "V4l2Camera: streaming {} ({}x{}, {:?})",
            self.path,
            self.width,
            self.height,
            self.format
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<RawCapture> {
        use v4l::io::traits::CaptureStream;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 device {} not started", self.path))?;
        let data = stream
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .context("capture v4l2 frame")?;
        self.frame_count += 1;
        Ok(RawCapture {
            data,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the stream unmaps the buffers and turns streaming off.
        self.stream = None;
        Ok(())
    }
}

impl Resource for V4l2Camera {
    fn release(&mut self) -> Result<()> {
        self.stop()?;
        log::info!(
            "V4l2Camera: closed {} after {} frames",
            self.path,
            self.frame_count
        );
        Ok(())
    }
}
