//! Decoder creation and the packet/frame exchange.
//!
//! [`DecodeSession`] binds a decoder to the selected stream's codec
//! parameters. When the acceleration mode allows it, a hardware device
//! context is opened and attached first; if no device can be opened the
//! session falls back to software decoding unless hardware was required.

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::{Codec, context::Context as CodecContext, threading},
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    media::Type,
    util::error::EAGAIN,
};

use crate::configuration::PipelineOptions;
use crate::error::{DecodeErrorKind, PipelineError};
use crate::frame::DecodedFrame;
use crate::hardware_acceleration::{
    HardwareAccelerationMode, HardwareDeviceContext, HardwareDeviceType, attach_device,
    codec_hardware_devices,
};
use crate::source::MediaSource;

/// Outcome of [`DecodeSession::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// The decoder took the packet.
    Accepted,
    /// The decoder's output must be drained before it accepts more input.
    /// The packet was not consumed.
    Full,
}

/// Outcome of [`DecodeSession::receive`].
pub enum DecodeStep {
    /// A decoded frame.
    Frame(DecodedFrame),
    /// The decoder needs another packet before it can produce a frame.
    NeedMoreInput,
    /// The decoder was flushed and has nothing left.
    Exhausted,
}

/// A decoder bound to one video stream.
///
/// Fields drop in declaration order: the decoder releases its reference to
/// the device before the session's own device reference goes.
pub struct DecodeSession {
    decoder: VideoDecoder,
    device: Option<HardwareDeviceContext>,
    codec_name: String,
    time_base: Rational,
    bits_per_raw_sample: u32,
    flushed: bool,
    exhausted: bool,
}

impl DecodeSession {
    /// Create and open a decoder for `source`'s video stream.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] with
    /// - [`DecodeErrorKind::UnsupportedCodec`] if no decoder exists for the
    ///   codec, or the configured decoder name is unknown,
    /// - [`DecodeErrorKind::HardwareUnavailable`] if hardware decoding was
    ///   required and no device could be opened,
    /// - [`DecodeErrorKind::ContextInitFailed`] if the decoder could not be
    ///   configured or opened.
    pub fn create(source: &MediaSource, options: &PipelineOptions) -> Result<Self, PipelineError> {
        let parameters = source.parameters()?;
        let codec = find_codec(parameters.id(), options.decoder_name.as_deref())?;

        let device = open_hardware_device(&codec, options)?;

        let mut context = CodecContext::new_with_codec(codec);
        context.set_parameters(parameters).map_err(|error| {
            PipelineError::decode(
                DecodeErrorKind::ContextInitFailed,
                format!("Failed to apply codec parameters: {error}"),
            )
        })?;
        if let Some(count) = options.decoder_threads {
            context.set_threading(threading::Config {
                kind: threading::Type::Frame,
                count,
                ..Default::default()
            });
        }
        if let Some(device) = &device {
            attach_device(unsafe { context.as_mut_ptr() }, device);
        }

        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|error| {
                PipelineError::decode(
                    DecodeErrorKind::ContextInitFailed,
                    format!("Failed to open decoder {}: {error}", codec.name()),
                )
            })?;

        let bits_per_raw_sample = source.info().bits_per_raw_sample.unwrap_or(8);

        log::info!(
            "Opened decoder {} ({}) for {}x{} {:?}",
            codec.name(),
            device
                .as_ref()
                .map_or("software".to_string(), |device| device.device().to_string()),
            decoder.width(),
            decoder.height(),
            decoder.format(),
        );

        Ok(Self {
            decoder,
            device,
            codec_name: codec.name().to_string(),
            time_base: source.time_base(),
            bits_per_raw_sample,
            flushed: false,
            exhausted: false,
        })
    }

    /// Hand one compressed packet to the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] with
    /// [`DecodeErrorKind::StreamFault`] if the decoder rejects the packet.
    pub fn submit(&mut self, packet: &Packet) -> Result<Submit, PipelineError> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(Submit::Accepted),
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Submit::Full),
            Err(error) => Err(PipelineError::decode(
                DecodeErrorKind::StreamFault,
                format!("Decoder rejected packet (pts {:?}): {error}", packet.pts()),
            )),
        }
    }

    /// Take the next decoded frame, if one is ready.
    ///
    /// The frame's timestamp is replaced by the decoder's best-effort
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] with
    /// [`DecodeErrorKind::StreamFault`] if decoding fails.
    pub fn receive(&mut self) -> Result<DecodeStep, PipelineError> {
        if self.exhausted {
            return Ok(DecodeStep::Exhausted);
        }

        let mut frame = VideoFrame::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => {
                let timestamp = frame.timestamp();
                frame.set_pts(timestamp);
                DecodedFrame::classify(frame, self.hardware_device())
                    .map(DecodeStep::Frame)
                    .map_err(|frame| {
                        PipelineError::decode(
                            DecodeErrorKind::StreamFault,
                            format!(
                                "Decoder produced a {:?} device surface without a device context",
                                frame.format()
                            ),
                        )
                    })
            }
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(DecodeStep::NeedMoreInput),
            Err(FfmpegError::Eof) => {
                self.exhausted = true;
                Ok(DecodeStep::Exhausted)
            }
            Err(error) => Err(PipelineError::decode(
                DecodeErrorKind::StreamFault,
                format!("Failed to decode frame: {error}"),
            )),
        }
    }

    /// Signal end of input. Frames still buffered in the decoder remain
    /// available through [`receive`](DecodeSession::receive). Calling this
    /// more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] if the decoder refuses the signal.
    pub fn flush(&mut self) -> Result<(), PipelineError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        log::debug!("Flushing decoder {}", self.codec_name);
        match self.decoder.send_eof() {
            Ok(()) | Err(FfmpegError::Eof) => Ok(()),
            Err(error) => Err(PipelineError::decode(
                DecodeErrorKind::StreamFault,
                format!("Failed to flush decoder: {error}"),
            )),
        }
    }

    /// `true` once [`flush`](DecodeSession::flush) has been called.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// The device the decoder is bound to, or `None` for software decoding.
    pub fn hardware_device(&self) -> Option<HardwareDeviceType> {
        self.device.as_ref().map(HardwareDeviceContext::device)
    }

    pub(crate) fn device_context(&self) -> Option<&HardwareDeviceContext> {
        self.device.as_ref()
    }

    /// Name of the opened decoder (e.g. `"h264"`, `"hevc_rkmpp"`).
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /// Coded width reported by the decoder.
    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    /// Coded height reported by the decoder.
    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Output pixel format reported by the decoder before any frame exists.
    pub fn format(&self) -> Pixel {
        self.decoder.format()
    }

    /// Sample aspect ratio reported by the decoder.
    pub fn aspect_ratio(&self) -> Rational {
        self.decoder.aspect_ratio()
    }

    /// Time base of the decoded stream.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub(crate) fn bits_per_raw_sample(&self) -> u32 {
        self.bits_per_raw_sample
    }

    /// `true` once the decoder has been flushed and fully drained.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

fn find_codec(id: ffmpeg_next::codec::Id, name: Option<&str>) -> Result<Codec, PipelineError> {
    let codec = match name {
        Some(name) => ffmpeg_next::decoder::find_by_name(name).ok_or_else(|| {
            PipelineError::decode(
                DecodeErrorKind::UnsupportedCodec,
                format!("No decoder named '{name}'"),
            )
        })?,
        None => ffmpeg_next::decoder::find(id).ok_or_else(|| {
            PipelineError::decode(
                DecodeErrorKind::UnsupportedCodec,
                format!("No decoder available for codec {}", id.name()),
            )
        })?,
    };

    if codec.medium() != Type::Video {
        return Err(PipelineError::decode(
            DecodeErrorKind::UnsupportedCodec,
            format!("Decoder {} does not decode video", codec.name()),
        ));
    }

    Ok(codec)
}

/// Open the first usable device for `codec` allowed by the options.
///
/// Returns `Ok(None)` for software decoding, either requested or as a
/// fallback.
fn open_hardware_device(
    codec: &Codec,
    options: &PipelineOptions,
) -> Result<Option<HardwareDeviceContext>, PipelineError> {
    let supported = codec_hardware_devices(codec);
    let candidates = match options.hardware_acceleration {
        HardwareAccelerationMode::Software => return Ok(None),
        HardwareAccelerationMode::Auto => supported,
        HardwareAccelerationMode::Specific(device) => {
            if supported.contains(&device) {
                vec![device]
            } else {
                log::debug!("Decoder {} cannot decode on {device}", codec.name());
                Vec::new()
            }
        }
    };

    let mut failures = Vec::new();
    for device in candidates {
        match HardwareDeviceContext::create(device) {
            Ok(context) => {
                log::debug!("Opened {device} device for decoder {}", codec.name());
                return Ok(Some(context));
            }
            Err(error) => {
                log::debug!("{error}");
                failures.push(device.to_string());
            }
        }
    }

    let reason = if failures.is_empty() {
        format!("Decoder {} has no usable hardware device", codec.name())
    } else {
        format!(
            "Decoder {} could not open any hardware device (tried {})",
            codec.name(),
            failures.join(", ")
        )
    };

    if options.require_hardware {
        return Err(PipelineError::decode(
            DecodeErrorKind::HardwareUnavailable,
            reason,
        ));
    }

    log::warn!("{reason}; falling back to software decoding");
    Ok(None)
}
