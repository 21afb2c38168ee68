//! Decoded frames tagged by where their pixels live.
//!
//! Every stage boundary states which residency it accepts and produces. The
//! decoder emits [`DecodedFrame`], which is either hardware- or
//! host-resident. The filter graph accepts either kind but only ever emits
//! [`HostFrame`], and the pixel adapter only accepts [`HostFrame`]. So a
//! device surface can never reach the byte-level adapter.

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};

use crate::hardware_acceleration::{HardwareDeviceType, is_hardware_pixel_format};

/// A decoded frame whose surface lives in device memory.
pub struct HardwareFrame {
    frame: VideoFrame,
    device: HardwareDeviceType,
}

/// A frame whose pixel planes are addressable host memory.
pub struct HostFrame {
    frame: VideoFrame,
}

/// A frame produced by the decoder.
pub enum DecodedFrame {
    /// Pixels live on `device`; only a filter graph with a map/download
    /// stage can bring them to the host.
    HardwareResident(HardwareFrame),
    /// Pixels are already in host memory.
    HostResident(HostFrame),
}

impl HardwareFrame {
    /// The device the surface belongs to.
    pub fn device(&self) -> HardwareDeviceType {
        self.device
    }

    /// The opaque surface format (e.g. `VAAPI`, `DRM_PRIME`).
    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    pub(crate) fn as_video_frame(&self) -> &VideoFrame {
        &self.frame
    }

    pub(crate) fn into_video_frame(self) -> VideoFrame {
        self.frame
    }
}

impl HostFrame {
    /// Wrap a frame known to be host-resident.
    ///
    /// Returns the frame back unchanged if its format is a device surface.
    pub(crate) fn new(frame: VideoFrame) -> Result<Self, VideoFrame> {
        if is_hardware_pixel_format(frame.format()) {
            Err(frame)
        } else {
            Ok(Self { frame })
        }
    }

    /// Pixel format of the planes.
    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    /// Presentation timestamp in the stream time base, if known.
    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    /// Byte distance between the starts of consecutive rows of `plane`.
    pub fn stride(&self, plane: usize) -> usize {
        self.frame.stride(plane)
    }

    /// Raw bytes of `plane`, including any row padding.
    pub fn data(&self, plane: usize) -> &[u8] {
        self.frame.data(plane)
    }

    pub(crate) fn as_video_frame(&self) -> &VideoFrame {
        &self.frame
    }

    pub(crate) fn into_video_frame(self) -> VideoFrame {
        self.frame
    }
}

impl TryFrom<VideoFrame> for HostFrame {
    type Error = VideoFrame;

    /// Wrap a frame allocated in host memory; a device surface is handed
    /// back.
    fn try_from(frame: VideoFrame) -> Result<Self, Self::Error> {
        HostFrame::new(frame)
    }
}

impl DecodedFrame {
    /// Classify a decoder output frame. `device` is the device the decoder
    /// is bound to, if any; a device surface without one is reported back
    /// as `Err`.
    pub(crate) fn classify(
        frame: VideoFrame,
        device: Option<HardwareDeviceType>,
    ) -> Result<Self, VideoFrame> {
        match HostFrame::new(frame) {
            Ok(host) => Ok(DecodedFrame::HostResident(host)),
            Err(frame) => match device {
                Some(device) => Ok(DecodedFrame::HardwareResident(HardwareFrame { frame, device })),
                None => Err(frame),
            },
        }
    }

    /// Returns `true` for device surfaces.
    pub fn is_hardware_resident(&self) -> bool {
        matches!(self, DecodedFrame::HardwareResident(_))
    }

    /// Pixel format of the frame (opaque for device surfaces).
    pub fn format(&self) -> Pixel {
        self.as_video_frame().format()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.as_video_frame().width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.as_video_frame().height()
    }

    /// Presentation timestamp in the stream time base, if known.
    pub fn pts(&self) -> Option<i64> {
        self.as_video_frame().pts()
    }

    pub(crate) fn as_video_frame(&self) -> &VideoFrame {
        match self {
            DecodedFrame::HardwareResident(frame) => frame.as_video_frame(),
            DecodedFrame::HostResident(frame) => frame.as_video_frame(),
        }
    }
}
