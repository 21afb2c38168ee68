//! A construction-never-fails facade over [`Pipeline`].
//!
//! Bindings to other languages often want an object that always exists and
//! reports failure through queries instead of a `Result`. [`FrameReader`]
//! provides that surface: construction keeps the error instead of returning
//! it, and [`next_frame`](FrameReader::next_frame) yields `None` both at end
//! of stream and on failure, distinguished by
//! [`has_failed`](FrameReader::has_failed).
//!
//! # Example
//!
//! ```no_run
//! use framepump::FrameReader;
//!
//! let mut reader = FrameReader::new("input.mp4", None);
//! if !reader.is_initialized() {
//!     eprintln!("cannot open: {:?}", reader.initialization_error());
//!     return;
//! }
//! while let Some(frame) = reader.next_frame() {
//!     println!("{} bytes", frame.len());
//! }
//! if reader.has_failed() {
//!     eprintln!("stopped early: {:?}", reader.last_error());
//! }
//! ```

use std::path::Path;

use crate::configuration::{FilterDescriptor, PipelineOptions, PixelFormat};
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PipelineState};
use crate::pixel_buffer::OutputFrame;

/// Frame source that reports errors through queries.
#[derive(Debug)]
pub struct FrameReader {
    pipeline: Result<Pipeline, PipelineError>,
    last_error: Option<PipelineError>,
}

impl FrameReader {
    /// Open `path`. `filter` replaces the default chain when given.
    ///
    /// Never fails; check [`is_initialized`](FrameReader::is_initialized).
    pub fn new<P: AsRef<Path>>(path: P, filter: Option<&str>) -> Self {
        let options = match filter {
            Some(description) => PipelineOptions::new().with_filter(FilterDescriptor::custom(description)),
            None => PipelineOptions::new(),
        };
        Self::with_options(path, options)
    }

    /// Open `path` with explicit options.
    pub fn with_options<P: AsRef<Path>>(path: P, options: PipelineOptions) -> Self {
        let pipeline = Pipeline::with_options(path, options);
        if let Err(error) = &pipeline {
            log::error!("Frame reader could not be initialised: {error}");
        }
        Self {
            pipeline,
            last_error: None,
        }
    }

    /// `false` when construction failed.
    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_ok()
    }

    /// The construction error, if construction failed.
    pub fn initialization_error(&self) -> Option<&PipelineError> {
        self.pipeline.as_ref().err()
    }

    /// The mid-stream error that stopped the reader, if any.
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// The next frame, or `None` at end of stream or after a failure.
    pub fn next_frame(&mut self) -> Option<OutputFrame<'_>> {
        let pipeline = self.pipeline.as_mut().ok()?;
        match pipeline.next_frame() {
            Ok(frame) => frame,
            Err(error) => {
                self.last_error = Some(error);
                None
            }
        }
    }

    /// `true` if construction failed or a stage failed mid-stream.
    pub fn has_failed(&self) -> bool {
        match &self.pipeline {
            Ok(pipeline) => pipeline.has_failed(),
            Err(_) => true,
        }
    }

    /// Lifecycle state; [`PipelineState::Uninitialized`] if construction
    /// failed.
    pub fn state(&self) -> PipelineState {
        self.pipeline
            .as_ref()
            .map_or(PipelineState::Uninitialized, Pipeline::state)
    }

    /// Width of delivered frames; `0` if construction failed.
    pub fn frame_width(&self) -> u32 {
        self.pipeline.as_ref().map_or(0, Pipeline::frame_width)
    }

    /// Height of delivered frames; `0` if construction failed.
    pub fn frame_height(&self) -> u32 {
        self.pipeline.as_ref().map_or(0, Pipeline::frame_height)
    }

    /// Pixel layout of delivered frames, if constructed.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pipeline.as_ref().ok().map(Pipeline::pixel_format)
    }

    /// Advisory frame count; `0` if unknown or construction failed.
    pub fn estimated_frame_total(&self) -> u64 {
        self.pipeline.as_ref().map_or(0, Pipeline::estimated_frame_total)
    }

    /// Timestamp of the last delivered frame.
    pub fn last_frame_pts(&self) -> Option<i64> {
        self.pipeline.as_ref().ok().and_then(Pipeline::last_frame_pts)
    }

    /// Time of the last delivered frame in seconds.
    pub fn last_frame_time_seconds(&self) -> Option<f64> {
        self.pipeline
            .as_ref()
            .ok()
            .and_then(Pipeline::last_frame_time_seconds)
    }

    /// Number of frames delivered so far.
    pub fn current_frame_id(&self) -> u64 {
        self.pipeline.as_ref().map_or(0, Pipeline::current_frame_id)
    }

    /// The wrapped pipeline, if constructed.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref().ok()
    }
}
