//! Container opening and packet demuxing.
//!
//! [`MediaSource`] opens a container, probes its streams, selects the video
//! stream, and hands out that stream's compressed packets one at a time.
//! Packets of other streams (audio, subtitles, data) are skipped.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational, codec::Parameters, format::context::Input,
    media::Type, util::error::EAGAIN,
};

use crate::error::{OpenErrorKind, PipelineError};
use crate::metadata::StreamInfo;

/// An opened container with its video stream selected.
///
/// The container handle stays open until the source is dropped.
pub struct MediaSource {
    input_context: Input,
    path: PathBuf,
    video_stream_index: usize,
    time_base: Rational,
    info: StreamInfo,
    exhausted: bool,
}

impl Debug for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaSource")
            .field("path", &self.path)
            .field("video_stream_index", &self.video_stream_index)
            .field("info", &self.info)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl MediaSource {
    /// Open a container and select its video stream.
    ///
    /// Initialises FFmpeg (once per process), opens and probes the
    /// container, and selects the best video stream, which is the first
    /// video stream unless the container marks another as default.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Open`] with
    /// - [`OpenErrorKind::NotFound`] if the path cannot be opened,
    /// - [`OpenErrorKind::UnsupportedContainer`] if the data is not a
    ///   container FFmpeg can demux,
    /// - [`OpenErrorKind::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();

        crate::ffmpeg::initialize()?;

        log::debug!("Opening media source: {}", path.display());

        let input_context = ffmpeg_next::format::input(&path).map_err(|error| {
            let kind = classify_open_error(path, &error);
            PipelineError::open(path_buf.clone(), kind, error)
        })?;

        let stream = input_context.streams().best(Type::Video).ok_or_else(|| {
            PipelineError::open(
                path_buf.clone(),
                OpenErrorKind::NoVideoStream,
                "container holds no video stream",
            )
        })?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let info = StreamInfo::from_stream(&input_context, &stream);
        log::debug!(
            "Selected video stream {video_stream_index}: {} {}x{}, time base {}/{}",
            info.codec,
            info.width,
            info.height,
            time_base.numerator(),
            time_base.denominator(),
        );

        Ok(Self {
            input_context,
            path: path_buf,
            video_stream_index,
            time_base,
            info,
            exhausted: false,
        })
    }

    /// Read the next packet of the selected video stream.
    ///
    /// Returns `Ok(None)` once the container is exhausted; later calls keep
    /// returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Runtime`] if the demuxer fails for any
    /// reason other than end of input.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, PipelineError> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        return Ok(Some(packet));
                    }
                }
                Err(FfmpegError::Eof) => {
                    log::debug!("Reached end of input: {}", self.path.display());
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => {}
                Err(error) => {
                    return Err(PipelineError::Runtime(format!(
                        "Failed to read packet from {}: {error}",
                        self.path.display()
                    )));
                }
            }
        }
    }

    /// Codec parameters of the selected video stream.
    pub(crate) fn parameters(&self) -> Result<Parameters, PipelineError> {
        self.input_context
            .stream(self.video_stream_index)
            .map(|stream| stream.parameters())
            .ok_or_else(|| {
                PipelineError::open(
                    self.path.clone(),
                    OpenErrorKind::NoVideoStream,
                    "selected video stream disappeared",
                )
            })
    }

    /// Path (or URL) the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index of the selected video stream within the container.
    pub fn video_stream_index(&self) -> usize {
        self.video_stream_index
    }

    /// Time base of the selected stream (seconds per timestamp unit).
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Metadata probed from the container at open time.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// `true` once [`read_packet`](MediaSource::read_packet) has hit end of
    /// input.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

fn classify_open_error(path: &Path, error: &FfmpegError) -> OpenErrorKind {
    match error {
        FfmpegError::InvalidData | FfmpegError::DemuxerNotFound | FfmpegError::StreamNotFound => {
            OpenErrorKind::UnsupportedContainer
        }
        FfmpegError::ProtocolNotFound => OpenErrorKind::NotFound,
        FfmpegError::Other { .. } => OpenErrorKind::NotFound,
        _ if !is_url(path) && !path.exists() => OpenErrorKind::NotFound,
        _ => OpenErrorKind::UnsupportedContainer,
    }
}

fn is_url(path: &Path) -> bool {
    path.to_str().is_some_and(|text| text.contains("://"))
}
