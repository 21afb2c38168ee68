//! Stream and per-frame metadata.
//!
//! [`StreamInfo`] is probed once when a source is opened. [`MetadataTracker`]
//! runs alongside the frame pump and stamps every delivered frame with a
//! [`FrameMetadata`]: a sequence id, the raw presentation timestamp, and the
//! timestamp converted to seconds.

use std::time::Duration;

use ffmpeg_next::{Rational, format::context::Input, format::stream::Stream};

/// Metadata for the selected video stream.
///
/// # Example
///
/// ```no_run
/// use framepump::MediaProbe;
///
/// let info = MediaProbe::probe("input.mp4")?;
/// println!("{} {}x{} @ {:.2} fps", info.codec, info.width, info.height, info.frames_per_second);
/// # Ok::<(), framepump::PipelineError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StreamInfo {
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub container_format: String,
    /// Codec name (e.g. `"h264"`, `"hevc"`).
    pub codec: String,
    /// Coded width in pixels, before any filtering.
    pub width: u32,
    /// Coded height in pixels, before any filtering.
    pub height: u32,
    /// Average frames per second (approximate for variable frame rates).
    pub frames_per_second: f64,
    /// Stream duration, falling back to the container duration.
    pub duration: Option<Duration>,
    /// Stream time base as `(numerator, denominator)`.
    pub time_base: (i32, i32),
    /// Advisory frame count; `0` when it cannot be estimated.
    pub estimated_frame_total: u64,
    /// Bits per raw sample, if the container reports it.
    pub bits_per_raw_sample: Option<u32>,
    /// Index of the stream within the container.
    pub stream_index: usize,
}

impl StreamInfo {
    pub(crate) fn from_stream(input_context: &Input, stream: &Stream<'_>) -> Self {
        let parameters = stream.parameters();
        let (width, height, bits) = unsafe {
            let raw = parameters.as_ptr();
            ((*raw).width, (*raw).height, (*raw).bits_per_raw_sample)
        };

        let frames_per_second = {
            let rate = stream.avg_frame_rate();
            if rate.numerator() > 0 && rate.denominator() > 0 {
                rational_to_f64(rate)
            } else {
                let rate = stream.rate();
                if rate.numerator() > 0 && rate.denominator() > 0 {
                    rational_to_f64(rate)
                } else {
                    0.0
                }
            }
        };

        let time_base = stream.time_base();
        let stream_duration = stream.duration();
        let duration = if stream_duration > 0 && time_base.denominator() > 0 {
            Some(Duration::from_secs_f64(
                stream_duration as f64 * rational_to_f64(time_base),
            ))
        } else if input_context.duration() > 0 {
            Some(Duration::from_micros(input_context.duration() as u64))
        } else {
            None
        };

        let estimated_frame_total = estimate_frame_total(
            stream.frames(),
            stream_duration,
            time_base,
            frames_per_second,
            duration,
        );

        Self {
            container_format: input_context.format().name().to_string(),
            codec: parameters.id().name().to_string(),
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            frames_per_second,
            duration,
            time_base: (time_base.numerator(), time_base.denominator()),
            estimated_frame_total,
            bits_per_raw_sample: if bits > 0 { Some(bits as u32) } else { None },
            stream_index: stream.index(),
        }
    }
}

/// Estimate the number of frames in a stream.
///
/// Prefers the container's own frame count, then the stream duration scaled
/// by its time base and frame rate, then the container duration. Returns `0`
/// when none of these are known.
pub fn estimate_frame_total(
    container_frames: i64,
    stream_duration: i64,
    time_base: Rational,
    frames_per_second: f64,
    fallback_duration: Option<Duration>,
) -> u64 {
    if container_frames > 0 {
        return container_frames as u64;
    }
    if frames_per_second <= 0.0 {
        return 0;
    }
    if stream_duration > 0 && time_base.numerator() > 0 && time_base.denominator() > 0 {
        let seconds = stream_duration as f64 * rational_to_f64(time_base);
        return (seconds * frames_per_second).round() as u64;
    }
    fallback_duration
        .map(|duration| (duration.as_secs_f64() * frames_per_second).round() as u64)
        .unwrap_or(0)
}

/// Presentation time of a delivered frame, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameTime {
    /// Derived from this frame's own timestamp.
    Exact(f64),
    /// The frame had no timestamp; this is the previous frame's time.
    CarriedForward(f64),
    /// Neither this frame nor any earlier one carried a timestamp.
    Unknown,
}

impl FrameTime {
    /// The time in seconds, exact or carried forward.
    pub fn seconds(self) -> Option<f64> {
        match self {
            FrameTime::Exact(seconds) | FrameTime::CarriedForward(seconds) => Some(seconds),
            FrameTime::Unknown => None,
        }
    }

    /// Returns `true` if the time came from the frame's own timestamp.
    pub fn is_exact(self) -> bool {
        matches!(self, FrameTime::Exact(_))
    }
}

/// Metadata attached to one delivered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetadata {
    /// 0-based index of the frame among those delivered by this pipeline.
    pub frame_id: u64,
    /// Presentation timestamp in stream time-base units, if known.
    pub pts: Option<i64>,
    /// Presentation time in seconds.
    pub time: FrameTime,
}

impl FrameMetadata {
    /// Presentation time as a [`Duration`]. `None` for unknown or negative
    /// times.
    pub fn timestamp(&self) -> Option<Duration> {
        self.time
            .seconds()
            .filter(|seconds| *seconds >= 0.0 && seconds.is_finite())
            .map(Duration::from_secs_f64)
    }
}

/// Frame counter and timestamp bookkeeping for one stream.
#[derive(Debug, Clone)]
pub struct MetadataTracker {
    time_base: Rational,
    delivered: u64,
    last_pts: Option<i64>,
    last_time: FrameTime,
    untimed: u64,
}

impl MetadataTracker {
    /// Create a tracker for a stream with the given time base.
    pub fn new(time_base: Rational) -> Self {
        Self {
            time_base,
            delivered: 0,
            last_pts: None,
            last_time: FrameTime::Unknown,
            untimed: 0,
        }
    }

    /// Record a delivered frame and return its metadata.
    ///
    /// A missing timestamp never produces a fabricated time: the previous
    /// frame's time is carried forward instead.
    pub fn record(&mut self, pts: Option<i64>) -> FrameMetadata {
        let time = match pts.and_then(|pts| self.seconds_from_pts(pts)) {
            Some(seconds) => FrameTime::Exact(seconds),
            None => {
                if self.untimed == 0 {
                    log::warn!(
                        "Frame {} has no usable timestamp; carrying the previous time forward",
                        self.delivered
                    );
                } else {
                    log::debug!("Frame {} has no usable timestamp", self.delivered);
                }
                self.untimed += 1;
                match self.last_time.seconds() {
                    Some(seconds) => FrameTime::CarriedForward(seconds),
                    None => FrameTime::Unknown,
                }
            }
        };

        let metadata = FrameMetadata {
            frame_id: self.delivered,
            pts,
            time,
        };

        self.delivered += 1;
        self.last_pts = pts;
        self.last_time = time;
        metadata
    }

    /// Convert a timestamp in stream units to seconds. `None` when the time
    /// base is degenerate.
    pub fn seconds_from_pts(&self, pts: i64) -> Option<f64> {
        if self.time_base.denominator() == 0 || self.time_base.numerator() == 0 {
            return None;
        }
        Some(pts as f64 * self.time_base.numerator() as f64 / self.time_base.denominator() as f64)
    }

    /// Number of frames recorded so far.
    pub fn current_frame_id(&self) -> u64 {
        self.delivered
    }

    /// Number of recorded frames that had no usable timestamp.
    pub fn untimed_frames(&self) -> u64 {
        self.untimed
    }

    /// Timestamp of the most recent frame, if it had one.
    pub fn last_pts(&self) -> Option<i64> {
        self.last_pts
    }

    /// Time of the most recent frame.
    pub fn last_time(&self) -> FrameTime {
        self.last_time
    }

    /// The stream time base.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
}

fn rational_to_f64(value: Rational) -> f64 {
    value.numerator() as f64 / value.denominator() as f64
}
