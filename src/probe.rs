//! Stream probing without a decoder.
//!
//! [`MediaProbe`] opens a container, reads the selected video stream's
//! metadata, and closes the container again. No decoder, device or filter
//! graph is created, so probing is cheap enough to run over a whole
//! directory before deciding what to extract.

use std::path::Path;

use crate::error::PipelineError;
use crate::metadata::StreamInfo;
use crate::source::MediaSource;

/// Lightweight stream probe.
///
/// # Example
///
/// ```no_run
/// use framepump::MediaProbe;
///
/// let info = MediaProbe::probe("input.mp4")?;
/// println!("{}x{}, ~{} frames", info.width, info.height, info.estimated_frame_total);
/// # Ok::<(), framepump::PipelineError>(())
/// ```
pub struct MediaProbe;

impl MediaProbe {
    /// Probe one container.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Open`] if the container cannot be opened or
    /// has no video stream.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<StreamInfo, PipelineError> {
        let source = MediaSource::open(path)?;
        Ok(source.info().clone())
    }

    /// Probe several containers. A container that cannot be probed yields
    /// an `Err` entry instead of aborting the batch.
    pub fn probe_many<P: AsRef<Path>>(paths: &[P]) -> Vec<Result<StreamInfo, PipelineError>> {
        paths.iter().map(Self::probe).collect()
    }
}
