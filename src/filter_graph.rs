//! Filter graph construction and the push/pull frame exchange.
//!
//! A [`FilterGraph`] is a linear chain with one `buffer` source named `in`
//! and one `buffersink` named `out`. The chain between them comes from a
//! [`FilterDescriptor`]. The graph is built and negotiated once; any parse
//! or negotiation problem surfaces from [`FilterGraph::build`], never while
//! frames are flowing.
//!
//! The sink's negotiated format must be a packed host layout (see
//! [`PixelFormat`]), so everything [`FilterGraph::pull`] returns is a
//! [`HostFrame`].

use ffmpeg_next::{
    Error as FfmpegError, Rational, filter::Graph, format::Pixel, frame::Video as VideoFrame,
    util::error::EAGAIN,
};
use ffmpeg_sys_next::{AVFilterContext, AVPixelFormat};

use crate::configuration::{FilterDescriptor, PixelFormat};
use crate::decoder::DecodeSession;
use crate::error::{GraphErrorKind, PipelineError};
use crate::frame::{DecodedFrame, HostFrame};
use crate::hardware_acceleration::{
    HardwareDeviceType, HardwareFramesContext, is_hardware_pixel_format, software_surface_format,
};

/// Description of the frames that will be pushed into the graph source.
pub struct SourceFrameParameters {
    width: u32,
    height: u32,
    format: Pixel,
    time_base: Rational,
    aspect_ratio: Rational,
    device: Option<HardwareDeviceType>,
    frames_context: Option<HardwareFramesContext>,
}

impl SourceFrameParameters {
    /// Describe the source from an actual decoded frame.
    ///
    /// Device surfaces normally carry the pool they were allocated from. If
    /// one does not, a pool is allocated on the decoder's device with the
    /// frame's size and the stream's bit depth.
    pub(crate) fn from_decoded_frame(
        frame: &DecodedFrame,
        session: &DecodeSession,
        pool_size: u32,
    ) -> Result<Self, PipelineError> {
        let raw = frame.as_video_frame();
        let (aspect_ratio, pool) = unsafe {
            let pointer = raw.as_ptr();
            (Rational::from((*pointer).sample_aspect_ratio), (*pointer).hw_frames_ctx)
        };

        let (device, frames_context) = match frame {
            DecodedFrame::HostResident(_) => (None, None),
            DecodedFrame::HardwareResident(hardware) => {
                let frames_context = match HardwareFramesContext::from_frame_pool(pool) {
                    Some(shared) => shared,
                    None => {
                        log::debug!(
                            "Decoded {:?} surface has no frame pool; allocating one",
                            hardware.format()
                        );
                        allocate_pool(session, hardware.format(), frame.width(), frame.height(), pool_size)?
                    }
                };
                (Some(hardware.device()), Some(frames_context))
            }
        };

        Ok(Self {
            width: frame.width(),
            height: frame.height(),
            format: frame.format(),
            time_base: session.time_base(),
            aspect_ratio,
            device,
            frames_context,
        })
    }

    /// Describe the source from the decoder's parameters alone, for streams
    /// that never produced a frame.
    pub(crate) fn from_decoder(session: &DecodeSession, pool_size: u32) -> Result<Self, PipelineError> {
        let (device, format, frames_context) = match session.hardware_device() {
            Some(device) => {
                let format = device.surface_format();
                let pool = allocate_pool(session, format, session.width(), session.height(), pool_size)?;
                (Some(device), format, Some(pool))
            }
            None => {
                let format = match session.format() {
                    Pixel::None => Pixel::YUV420P,
                    format => format,
                };
                (None, format, None)
            }
        };

        Ok(Self {
            width: session.width(),
            height: session.height(),
            format,
            time_base: session.time_base(),
            aspect_ratio: session.aspect_ratio(),
            device,
            frames_context,
        })
    }

    /// Width of source frames.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of source frames.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format of source frames (opaque for device surfaces).
    pub fn format(&self) -> Pixel {
        self.format
    }

    /// The device source frames live on, if any.
    pub fn device(&self) -> Option<HardwareDeviceType> {
        self.device
    }

    fn buffer_arguments(&self) -> String {
        let aspect = if self.aspect_ratio.numerator() > 0 && self.aspect_ratio.denominator() > 0 {
            self.aspect_ratio
        } else {
            Rational::new(1, 1)
        };
        format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
            self.width,
            self.height,
            AVPixelFormat::from(self.format) as i32,
            self.time_base.numerator(),
            self.time_base.denominator(),
            aspect.numerator(),
            aspect.denominator(),
        )
    }
}

fn allocate_pool(
    session: &DecodeSession,
    hardware_format: Pixel,
    width: u32,
    height: u32,
    pool_size: u32,
) -> Result<HardwareFramesContext, PipelineError> {
    let device = session.device_context().ok_or_else(|| {
        PipelineError::graph(
            GraphErrorKind::UnsupportedHardwarePath,
            "hardware source has no device to allocate a frame pool on",
        )
    })?;
    HardwareFramesContext::allocate(
        device,
        hardware_format,
        software_surface_format(session.bits_per_raw_sample()),
        width,
        height,
        pool_size,
    )
}

/// Outcome of [`FilterGraph::pull`].
pub enum Pull {
    /// A filtered host-memory frame.
    Frame(HostFrame),
    /// The graph needs another source frame first.
    NeedMoreInput,
    /// The graph was flushed and has nothing left.
    Exhausted,
}

/// A built and negotiated filter graph.
pub struct FilterGraph {
    graph: Graph,
    frames_context: Option<HardwareFramesContext>,
    description: String,
    output_width: u32,
    output_height: u32,
    output_format: PixelFormat,
    output_time_base: Rational,
    flushed: bool,
    exhausted: bool,
}

impl FilterGraph {
    /// Build the graph `in → <chain> → out` for the given source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Graph`] with
    /// - [`GraphErrorKind::ParseFailed`] if the chain cannot be parsed or
    ///   names unknown filters,
    /// - [`GraphErrorKind::FormatNegotiationFailed`] if formats cannot be
    ///   negotiated or the output is not a supported packed layout,
    /// - [`GraphErrorKind::UnsupportedHardwarePath`] if frames would leave
    ///   the graph still on the device, or a device source has no pool.
    pub fn build(
        filter: &FilterDescriptor,
        source: SourceFrameParameters,
    ) -> Result<Self, PipelineError> {
        let description = filter.resolve(source.device);
        log::debug!("Building filter graph: {description}");

        if is_hardware_pixel_format(source.format) && source.frames_context.is_none() {
            return Err(PipelineError::graph(
                GraphErrorKind::UnsupportedHardwarePath,
                format!("{:?} source frames have no hardware frame pool", source.format),
            ));
        }

        let mut graph = Graph::new();

        let buffer = ffmpeg_next::filter::find("buffer").ok_or_else(|| {
            PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                "FFmpeg 'buffer' filter not found",
            )
        })?;
        graph
            .add(&buffer, "in", &source.buffer_arguments())
            .map_err(|error| {
                PipelineError::graph(
                    GraphErrorKind::FormatNegotiationFailed,
                    format!("Failed to add buffer source: {error}"),
                )
            })?;

        if let Some(frames_context) = &source.frames_context {
            let input = filter_context(&mut graph, "in")?;
            attach_frames_context(input, frames_context)?;
        }

        let buffersink = ffmpeg_next::filter::find("buffersink").ok_or_else(|| {
            PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                "FFmpeg 'buffersink' filter not found",
            )
        })?;
        graph.add(&buffersink, "out", "").map_err(|error| {
            PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                format!("Failed to add buffer sink: {error}"),
            )
        })?;

        graph
            .output("in", 0)
            .and_then(|parser| parser.input("out", 0))
            .and_then(|parser| parser.parse(&description))
            .map_err(|error| {
                PipelineError::graph(
                    GraphErrorKind::ParseFailed,
                    format!("Failed to parse filter chain '{description}': {error}"),
                )
            })?;

        graph.validate().map_err(|error| {
            PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                format!("Failed to configure filter chain '{description}': {error}"),
            )
        })?;

        let sink = filter_context(&mut graph, "out")?;
        let (raw_format, width, height, time_base) = unsafe {
            (
                ffmpeg_sys_next::av_buffersink_get_format(sink),
                ffmpeg_sys_next::av_buffersink_get_w(sink),
                ffmpeg_sys_next::av_buffersink_get_h(sink),
                Rational::from(ffmpeg_sys_next::av_buffersink_get_time_base(sink)),
            )
        };
        let sink_format = pixel_from_raw(raw_format);

        if is_hardware_pixel_format(sink_format) {
            return Err(PipelineError::graph(
                GraphErrorKind::UnsupportedHardwarePath,
                format!(
                    "filter chain '{description}' leaves frames in {sink_format:?} device memory; add a hwmap or hwdownload stage"
                ),
            ));
        }
        let output_format = PixelFormat::from_ffmpeg_pixel(sink_format).ok_or_else(|| {
            PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                format!("filter chain '{description}' outputs {sink_format:?}, which is not a supported packed layout"),
            )
        })?;
        if width <= 0 || height <= 0 {
            return Err(PipelineError::graph(
                GraphErrorKind::FormatNegotiationFailed,
                format!("filter chain '{description}' negotiated an empty {width}x{height} output"),
            ));
        }

        log::debug!(
            "Filter graph negotiated {:?} {}x{} -> {output_format} {width}x{height}",
            source.format,
            source.width,
            source.height,
        );

        Ok(Self {
            graph,
            frames_context: source.frames_context,
            description,
            output_width: width as u32,
            output_height: height as u32,
            output_format,
            output_time_base: time_base,
            flushed: false,
            exhausted: false,
        })
    }

    /// Push one decoded frame into the graph source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the source rejects the frame,
    /// for example after a mid-stream change of frame size.
    pub fn push(&mut self, frame: DecodedFrame) -> Result<(), PipelineError> {
        let mut frame = match frame {
            DecodedFrame::HardwareResident(frame) => frame.into_video_frame(),
            DecodedFrame::HostResident(frame) => frame.into_video_frame(),
        };

        if let Some(frames_context) = &self.frames_context {
            unsafe {
                let pointer = frame.as_mut_ptr();
                if is_hardware_pixel_format(frame.format()) && (*pointer).hw_frames_ctx.is_null() {
                    (*pointer).hw_frames_ctx = frames_context.new_reference();
                }
            }
        }

        self.graph
            .get("in")
            .ok_or_else(|| PipelineError::Runtime("Filter 'in' not found".to_string()))?
            .source()
            .add(&frame)
            .map_err(|error| PipelineError::Runtime(format!("Failed to feed filter graph: {error}")))
    }

    /// Pull the next filtered frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if a filter fails on this frame
    /// (for example a failed device-to-host map).
    pub fn pull(&mut self) -> Result<Pull, PipelineError> {
        if self.exhausted {
            return Ok(Pull::Exhausted);
        }

        let mut frame = VideoFrame::empty();
        let result = self
            .graph
            .get("out")
            .ok_or_else(|| PipelineError::Runtime("Filter 'out' not found".to_string()))?
            .sink()
            .frame(&mut frame);

        match result {
            Ok(()) => HostFrame::new(frame).map(Pull::Frame).map_err(|frame| {
                PipelineError::Runtime(format!(
                    "Filter graph emitted a {:?} device surface",
                    frame.format()
                ))
            }),
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Pull::NeedMoreInput),
            Err(FfmpegError::Eof) => {
                self.exhausted = true;
                Ok(Pull::Exhausted)
            }
            Err(error) => Err(PipelineError::Runtime(format!(
                "Failed to pull from filter graph: {error}"
            ))),
        }
    }

    /// Signal end of input to the graph source. Calling this more than once
    /// is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the source refuses the signal.
    pub fn flush(&mut self) -> Result<(), PipelineError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        log::debug!("Flushing filter graph");
        self.graph
            .get("in")
            .ok_or_else(|| PipelineError::Runtime("Filter 'in' not found".to_string()))?
            .source()
            .flush()
            .map_err(|error| PipelineError::Runtime(format!("Failed to flush filter graph: {error}")))
    }

    /// Negotiated output width.
    pub fn output_width(&self) -> u32 {
        self.output_width
    }

    /// Negotiated output height.
    pub fn output_height(&self) -> u32 {
        self.output_height
    }

    /// Negotiated output layout.
    pub fn output_format(&self) -> PixelFormat {
        self.output_format
    }

    /// Time base of output timestamps. Equal to the stream's unless the
    /// chain retimes frames.
    pub fn output_time_base(&self) -> Rational {
        self.output_time_base
    }

    /// `true` once [`flush`](FilterGraph::flush) has been called.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// The chain text the graph was built from.
    pub fn description(&self) -> &str {
        &self.description
    }
}

fn filter_context(graph: &mut Graph, name: &str) -> Result<*mut AVFilterContext, PipelineError> {
    let mut context = graph.get(name).ok_or_else(|| {
        PipelineError::graph(
            GraphErrorKind::FormatNegotiationFailed,
            format!("Filter '{name}' not found"),
        )
    })?;
    Ok(unsafe { context.as_mut_ptr() })
}

fn attach_frames_context(
    source: *mut AVFilterContext,
    frames_context: &HardwareFramesContext,
) -> Result<(), PipelineError> {
    let result = unsafe {
        let parameters = ffmpeg_sys_next::av_buffersrc_parameters_alloc();
        if parameters.is_null() {
            return Err(PipelineError::graph(
                GraphErrorKind::UnsupportedHardwarePath,
                "Failed to allocate buffer source parameters",
            ));
        }
        (*parameters).hw_frames_ctx = frames_context.as_ptr();
        let result = ffmpeg_sys_next::av_buffersrc_parameters_set(source, parameters);
        ffmpeg_sys_next::av_free(parameters.cast());
        result
    };

    if result < 0 {
        return Err(PipelineError::graph(
            GraphErrorKind::UnsupportedHardwarePath,
            format!(
                "Failed to attach hardware frame pool to buffer source: {}",
                FfmpegError::from(result)
            ),
        ));
    }
    Ok(())
}

fn pixel_from_raw(raw: i32) -> Pixel {
    if raw < 0 || raw >= AVPixelFormat::AV_PIX_FMT_NB as i32 {
        return Pixel::None;
    }
    Pixel::from(unsafe { std::mem::transmute::<i32, AVPixelFormat>(raw) })
}
