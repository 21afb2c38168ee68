//! Owned, pull-based frame iteration.
//!
//! [`FrameIterator`] wraps a [`Pipeline`] and yields each frame as an
//! [`OwnedFrame`], so frames can be collected or moved to other threads.
//! Each call to [`next()`](Iterator::next) runs the pump just far enough to
//! produce one frame.
//!
//! Create one with [`Pipeline::into_frames`].
//!
//! # Example
//!
//! ```no_run
//! use framepump::Pipeline;
//!
//! let frames = Pipeline::open("input.mp4")?.into_frames();
//! for frame in frames.take(10) {
//!     let frame = frame?;
//!     frame.to_image()?.save(format!("frame_{}.png", frame.metadata().frame_id))?;
//! }
//! # Ok::<(), framepump::PipelineError>(())
//! ```

use std::iter::FusedIterator;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::pixel_buffer::OwnedFrame;

/// An iterator over the frames of one pipeline.
///
/// Ends after end of stream, or after yielding the pipeline's single error.
/// It cannot be restarted.
#[derive(Debug)]
pub struct FrameIterator {
    pipeline: Pipeline,
    done: bool,
}

impl FrameIterator {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        let done = pipeline.state().is_terminal();
        Self { pipeline, done }
    }

    /// The underlying pipeline, for its query surface.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Give the pipeline back.
    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }
}

impl Iterator for FrameIterator {
    type Item = Result<OwnedFrame, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.pipeline.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame.to_owned_frame())),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

impl FusedIterator for FrameIterator {}
