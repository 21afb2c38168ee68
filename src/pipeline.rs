//! The frame pump.
//!
//! [`Pipeline`] owns one container, one decoder and one filter graph, and
//! moves data through them one output frame at a time:
//!
//! 1. pull from the filter graph; a ready frame is adapted and returned,
//! 2. otherwise take a decoded frame and push it into the graph,
//! 3. otherwise read a packet and submit it to the decoder,
//! 4. at end of input, flush the decoder and then the graph until both are
//!    exhausted.
//!
//! Everything happens on the caller's thread inside
//! [`next_frame`](Pipeline::next_frame); there is no background producer.
//!
//! # Example
//!
//! ```no_run
//! use framepump::Pipeline;
//!
//! let mut pipeline = Pipeline::open("input.mp4")?;
//! while let Some(frame) = pipeline.next_frame()? {
//!     println!(
//!         "frame {} at {:?}: {}x{} ({} bytes)",
//!         frame.frame_id(),
//!         frame.time().seconds(),
//!         frame.width(),
//!         frame.height(),
//!         frame.len(),
//!     );
//! }
//! # Ok::<(), framepump::PipelineError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
};

use ffmpeg_next::{Packet, Rescale};

use crate::configuration::{PipelineOptions, PixelFormat};
use crate::decoder::{DecodeSession, DecodeStep, Submit};
use crate::error::PipelineError;
use crate::filter_graph::{FilterGraph, Pull, SourceFrameParameters};
use crate::frame::{DecodedFrame, HostFrame};
use crate::hardware_acceleration::HardwareDeviceType;
use crate::iterator::FrameIterator;
use crate::metadata::{MetadataTracker, StreamInfo};
use crate::pixel_buffer::{OutputFrame, PixelBufferAdapter};
use crate::source::MediaSource;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Not constructed. A [`Pipeline`] value is never in this state; it is
    /// reported by [`FrameReader`](crate::FrameReader) when construction
    /// failed.
    Uninitialized,
    /// Frames are flowing.
    Ready,
    /// The container is exhausted; buffered frames are still being drained.
    Draining,
    /// Every frame has been delivered.
    EndOfStream,
    /// A stage failed. Terminal.
    Failed,
}

impl PipelineState {
    /// Returns `true` for [`EndOfStream`](PipelineState::EndOfStream) and
    /// [`Failed`](PipelineState::Failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::EndOfStream | PipelineState::Failed)
    }
}

/// Demuxer and decoder, driven together.
///
/// Fields drop in declaration order: the decoder before the container.
struct PacketFeed {
    decoder: DecodeSession,
    source: MediaSource,
    pending: Option<Packet>,
}

impl PacketFeed {
    /// Decode the next frame, reading and submitting packets as needed.
    ///
    /// Returns `Ok(None)` once the container is exhausted and the decoder
    /// fully drained.
    fn next_decoded(&mut self) -> Result<Option<DecodedFrame>, PipelineError> {
        let mut refused = false;
        loop {
            match self.decoder.receive()? {
                DecodeStep::Frame(frame) => return Ok(Some(frame)),
                DecodeStep::Exhausted => return Ok(None),
                DecodeStep::NeedMoreInput => {}
            }

            let packet = match self.pending.take() {
                Some(packet) => Some(packet),
                None => self.source.read_packet()?,
            };

            match packet {
                Some(packet) => match self.decoder.submit(&packet)? {
                    Submit::Accepted => refused = false,
                    Submit::Full if refused => {
                        return Err(PipelineError::Runtime(
                            "Decoder neither accepts input nor produces output".to_string(),
                        ));
                    }
                    Submit::Full => {
                        refused = true;
                        self.pending = Some(packet);
                    }
                },
                None if self.decoder.is_flushed() => {
                    return Err(PipelineError::Runtime(
                        "Decoder is waiting for input after end of stream".to_string(),
                    ));
                }
                None => self.decoder.flush()?,
            }
        }
    }

    fn source_exhausted(&self) -> bool {
        self.source.is_exhausted() && self.pending.is_none()
    }
}

/// A single-stream frame extraction pipeline.
///
/// Construction opens the container, opens the decoder (on a hardware
/// device when possible), decodes the first frame to learn the actual
/// surface layout, and builds the filter graph for it. Every construction
/// problem is reported by [`open`](Pipeline::open) /
/// [`with_options`](Pipeline::with_options); once a `Pipeline` exists the
/// only errors left are mid-stream faults.
///
/// Dropping the pipeline releases, in order, the current frame, the filter
/// graph and its hardware frame pool, the decoder and its device, and the
/// container, whatever state the pipeline is in.
pub struct Pipeline {
    current: Option<HostFrame>,
    graph: FilterGraph,
    feed: PacketFeed,
    adapter: PixelBufferAdapter,
    tracker: MetadataTracker,
    state: PipelineState,
    hardware_device: Option<HardwareDeviceType>,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("source", &self.feed.source)
            .field("filter", &self.graph.description())
            .field("state", &self.state)
            .field("hardware_device", &self.hardware_device)
            .field("frame_id", &self.tracker.current_frame_id())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Open a pipeline with the default filter chain and automatic hardware
    /// selection.
    ///
    /// # Errors
    ///
    /// See [`with_options`](Pipeline::with_options).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        Self::with_options(path, PipelineOptions::default())
    }

    /// Open a pipeline with explicit options.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Open`] if the container cannot be opened or has no
    ///   video stream,
    /// - [`PipelineError::Decode`] if no decoder can be created (or hardware
    ///   was required and is unavailable), or the first frame cannot be
    ///   decoded,
    /// - [`PipelineError::Graph`] if the filter chain cannot be parsed or
    ///   negotiated.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use framepump::{Pipeline, PipelineOptions};
    ///
    /// let options = PipelineOptions::new().with_filter("scale=w=640:h=360,format=rgb24");
    /// let pipeline = Pipeline::with_options("input.mp4", options)?;
    /// assert_eq!((pipeline.frame_width(), pipeline.frame_height()), (640, 360));
    /// # Ok::<(), framepump::PipelineError>(())
    /// ```
    pub fn with_options<P: AsRef<Path>>(
        path: P,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let source = MediaSource::open(path)?;
        let decoder = DecodeSession::create(&source, &options)?;
        let mut feed = PacketFeed {
            decoder,
            source,
            pending: None,
        };

        let primed = feed.next_decoded().map_err(PipelineError::at_first_frame)?;
        let parameters = match &primed {
            Some(frame) => SourceFrameParameters::from_decoded_frame(
                frame,
                &feed.decoder,
                options.hardware_frame_pool_size,
            )?,
            None => {
                log::warn!(
                    "{} produced no frames; building the graph from codec parameters",
                    feed.source.path().display()
                );
                SourceFrameParameters::from_decoder(&feed.decoder, options.hardware_frame_pool_size)?
            }
        };

        let hardware_device = parameters.device();
        if let Some(frame) = &primed
            && !frame.is_hardware_resident()
            && let Some(device) = feed.decoder.hardware_device()
        {
            log::warn!("Decoder is bound to {device} but produced host frames");
        }

        let mut graph = FilterGraph::build(&options.filter, parameters)?;
        let state = match primed {
            Some(frame) => {
                graph.push(frame)?;
                PipelineState::Ready
            }
            None => {
                graph.flush()?;
                PipelineState::EndOfStream
            }
        };

        let adapter = PixelBufferAdapter::new(
            graph.output_width(),
            graph.output_height(),
            graph.output_format(),
        );
        let stream_time_base = feed.source.time_base();
        let tracker = if stream_time_base.numerator() > 0 && stream_time_base.denominator() > 0 {
            MetadataTracker::new(stream_time_base)
        } else {
            MetadataTracker::new(graph.output_time_base())
        };

        log::info!(
            "Pipeline ready: {} via {} -> {} {}x{}",
            feed.source.path().display(),
            hardware_device.map_or("software".to_string(), |device| device.to_string()),
            graph.output_format(),
            graph.output_width(),
            graph.output_height(),
        );

        Ok(Self {
            current: None,
            graph,
            feed,
            adapter,
            tracker,
            state,
            hardware_device,
        })
    }

    /// Produce the next frame.
    ///
    /// Returns `Ok(None)` at end of stream. A stage failure is returned once
    /// as `Err` and moves the pipeline to [`PipelineState::Failed`]; every
    /// later call returns `Ok(None)` without retrying.
    ///
    /// The returned frame borrows the pipeline and is valid until the next
    /// call.
    pub fn next_frame(&mut self) -> Result<Option<OutputFrame<'_>>, PipelineError> {
        if self.state.is_terminal() || self.state == PipelineState::Uninitialized {
            return Ok(None);
        }

        self.current = None;
        let frame = match self.advance() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::debug!(
                    "End of stream after {} frames",
                    self.tracker.current_frame_id()
                );
                self.state = PipelineState::EndOfStream;
                return Ok(None);
            }
            Err(error) => return Err(self.fail(error)),
        };

        if let Err(error) = self.adapter.prepare(&frame) {
            return Err(self.fail(error));
        }
        let pts = frame
            .pts()
            .map(|pts| pts.rescale(self.graph.output_time_base(), self.tracker.time_base()));
        let metadata = self.tracker.record(pts);
        let frame = self.current.insert(frame);
        Ok(Some(self.adapter.view(frame, metadata)))
    }

    fn advance(&mut self) -> Result<Option<HostFrame>, PipelineError> {
        loop {
            if self.state == PipelineState::Ready && self.feed.source_exhausted() {
                log::debug!("Source exhausted; draining");
                self.state = PipelineState::Draining;
            }

            match self.graph.pull()? {
                Pull::Frame(frame) => return Ok(Some(frame)),
                Pull::Exhausted => return Ok(None),
                Pull::NeedMoreInput => {}
            }

            match self.feed.next_decoded()? {
                Some(frame) => self.graph.push(frame)?,
                None if self.graph.is_flushed() => {
                    return Err(PipelineError::Runtime(
                        "Filter graph is waiting for input after end of stream".to_string(),
                    ));
                }
                None => self.graph.flush()?,
            }
        }
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        log::error!(
            "Pipeline for {} failed after {} frames: {error}",
            self.feed.source.path().display(),
            self.tracker.current_frame_id()
        );
        self.state = PipelineState::Failed;
        self.current = None;
        error
    }

    /// Always `true`: a `Pipeline` only exists once construction succeeded.
    pub fn is_initialized(&self) -> bool {
        self.state != PipelineState::Uninitialized
    }

    /// Width of delivered frames, as negotiated by the filter graph.
    pub fn frame_width(&self) -> u32 {
        self.graph.output_width()
    }

    /// Height of delivered frames, as negotiated by the filter graph.
    pub fn frame_height(&self) -> u32 {
        self.graph.output_height()
    }

    /// Pixel layout of delivered frames.
    pub fn pixel_format(&self) -> PixelFormat {
        self.graph.output_format()
    }

    /// Advisory frame count from the container. Not a loop bound; `0` when
    /// unknown.
    pub fn estimated_frame_total(&self) -> u64 {
        self.feed.source.info().estimated_frame_total
    }

    /// Timestamp of the last delivered frame, in stream time-base units.
    pub fn last_frame_pts(&self) -> Option<i64> {
        self.tracker.last_pts()
    }

    /// Time of the last delivered frame in seconds, exact or carried
    /// forward.
    pub fn last_frame_time_seconds(&self) -> Option<f64> {
        self.tracker.last_time().seconds()
    }

    /// Number of frames delivered so far.
    pub fn current_frame_id(&self) -> u64 {
        self.tracker.current_frame_id()
    }

    /// Returns `true` once a stage has failed.
    pub fn has_failed(&self) -> bool {
        self.state == PipelineState::Failed
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The device frames are decoded on, or `None` for software decoding.
    pub fn hardware_device(&self) -> Option<HardwareDeviceType> {
        self.hardware_device
    }

    /// Metadata of the source stream.
    pub fn stream_info(&self) -> &StreamInfo {
        self.feed.source.info()
    }

    /// The filter chain text in use.
    pub fn filter_description(&self) -> &str {
        self.graph.description()
    }

    /// Name of the opened decoder.
    pub fn decoder_name(&self) -> &str {
        self.feed.decoder.codec_name()
    }

    /// Turn the pipeline into an iterator of owned frames.
    pub fn into_frames(self) -> FrameIterator {
        FrameIterator::new(self)
    }
}
