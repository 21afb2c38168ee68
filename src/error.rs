//! Error types for the `framepump` crate.
//!
//! This module defines [`PipelineError`], the unified error type returned by
//! every fallible operation in the crate. The variants follow the stage that
//! failed: opening the container, creating or driving the decoder, building
//! the filter graph, or an unexpected fault while frames are flowing.
//!
//! Construction-time failures ([`Open`](PipelineError::Open),
//! [`Decode`](PipelineError::Decode) during setup, including a first frame
//! that cannot be decoded, and [`Graph`](PipelineError::Graph)) abort
//! pipeline creation entirely.
//! Mid-stream failures put the pipeline into
//! [`PipelineState::Failed`](crate::PipelineState::Failed) and are reported
//! exactly once.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// Why a media source could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenErrorKind {
    /// The path does not exist or could not be opened for reading.
    NotFound,
    /// The data was not recognised as a container FFmpeg can demux.
    UnsupportedContainer,
    /// The container holds no video stream.
    NoVideoStream,
}

/// Why a decoder could not be created or driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// No decoder exists for the stream's codec (or the requested decoder
    /// name is unknown).
    UnsupportedCodec,
    /// Hardware decoding was required but no usable device exists.
    HardwareUnavailable,
    /// The codec context could not be configured or opened.
    ContextInitFailed,
    /// The first frame could not be decoded while the pipeline was being
    /// built.
    FirstFrameFailed,
    /// The decoder rejected a packet or failed while producing a frame.
    StreamFault,
}

/// Why a filter graph could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphErrorKind {
    /// The filter description could not be parsed or names unknown filters.
    ParseFailed,
    /// The chain's formats could not be negotiated, or the negotiated output
    /// is not a packed layout the pixel adapter accepts.
    FormatNegotiationFailed,
    /// Frames would leave the graph still hardware-resident, or a hardware
    /// source lacks a frame pool.
    UnsupportedHardwarePath,
}

impl Display for OpenErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let text = match self {
            OpenErrorKind::NotFound => "not found",
            OpenErrorKind::UnsupportedContainer => "unsupported container",
            OpenErrorKind::NoVideoStream => "no video stream",
        };
        f.write_str(text)
    }
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let text = match self {
            DecodeErrorKind::UnsupportedCodec => "unsupported codec",
            DecodeErrorKind::HardwareUnavailable => "hardware unavailable",
            DecodeErrorKind::ContextInitFailed => "context initialisation failed",
            DecodeErrorKind::FirstFrameFailed => "first frame failed",
            DecodeErrorKind::StreamFault => "stream fault",
        };
        f.write_str(text)
    }
}

impl Display for GraphErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let text = match self {
            GraphErrorKind::ParseFailed => "parse failed",
            GraphErrorKind::FormatNegotiationFailed => "format negotiation failed",
            GraphErrorKind::UnsupportedHardwarePath => "unsupported hardware path",
        };
        f.write_str(text)
    }
}

/// The unified error type for all `framepump` operations.
///
/// Variants carry enough context to diagnose the problem without additional
/// logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The media source could not be opened.
    #[error("Failed to open media source at {path} ({kind}): {reason}")]
    Open {
        /// Path that was passed to [`crate::Pipeline::open`].
        path: PathBuf,
        /// Category of the failure.
        kind: OpenErrorKind,
        /// Underlying reason reported by FFmpeg.
        reason: String,
    },

    /// The decoder could not be created, or failed while decoding.
    #[error("Decoder error ({kind}): {reason}")]
    Decode {
        /// Category of the failure.
        kind: DecodeErrorKind,
        /// Underlying reason.
        reason: String,
    },

    /// The filter graph could not be built.
    #[error("Filter graph error ({kind}): {reason}")]
    Graph {
        /// Category of the failure.
        kind: GraphErrorKind,
        /// Underlying reason.
        reason: String,
    },

    /// An unexpected fault in the middle of the pipeline, such as a failed
    /// hardware buffer map on a specific frame.
    #[error("Pipeline runtime error: {0}")]
    Runtime(String),

    /// An I/O error while writing exported frames.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame export.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl PipelineError {
    pub(crate) fn open(path: impl Into<PathBuf>, kind: OpenErrorKind, reason: impl Display) -> Self {
        PipelineError::Open {
            path: path.into(),
            kind,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(kind: DecodeErrorKind, reason: impl Display) -> Self {
        PipelineError::Decode {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Reclassify a fault hit while decoding the first frame during
    /// construction.
    pub(crate) fn at_first_frame(self) -> Self {
        if self.is_construction_error() {
            return self;
        }
        PipelineError::decode(
            DecodeErrorKind::FirstFrameFailed,
            format!("Failed to decode the first frame: {self}"),
        )
    }

    pub(crate) fn graph(kind: GraphErrorKind, reason: impl Display) -> Self {
        PipelineError::Graph {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for errors that can only occur while constructing a
    /// pipeline.
    pub fn is_construction_error(&self) -> bool {
        match self {
            PipelineError::Open { .. } | PipelineError::Graph { .. } => true,
            PipelineError::Decode { kind, .. } => *kind != DecodeErrorKind::StreamFault,
            _ => false,
        }
    }
}

impl From<FfmpegError> for PipelineError {
    fn from(error: FfmpegError) -> Self {
        PipelineError::Runtime(format!("FFmpeg error: {error}"))
    }
}
