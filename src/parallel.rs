//! Parallel processing of many sources.
//!
//! [`for_each_source`] runs one [`Pipeline`] per source on rayon's thread
//! pool. Each worker opens its own container, decoder and device, so no
//! pipeline state is shared between threads.
//!
//! Requires the `rayon` feature.

use std::path::Path;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::configuration::PipelineOptions;
use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// Open a pipeline for every path and hand it to `process` on a rayon
/// worker.
///
/// Results come back in the order of `paths`. A source that cannot be
/// opened, or whose `process` call fails, yields an `Err` entry without
/// affecting the others.
///
/// # Example
///
/// ```no_run
/// use framepump::{PipelineOptions, parallel};
///
/// let counts = parallel::for_each_source(
///     &["a.mp4", "b.mkv"],
///     &PipelineOptions::new(),
///     |_path, pipeline| {
///         let mut count = 0u64;
///         while pipeline.next_frame()?.is_some() {
///             count += 1;
///         }
///         Ok(count)
///     },
/// );
/// # let _ = counts;
/// ```
pub fn for_each_source<P, T, F>(
    paths: &[P],
    options: &PipelineOptions,
    process: F,
) -> Vec<Result<T, PipelineError>>
where
    P: AsRef<Path> + Sync,
    T: Send,
    F: Fn(&Path, &mut Pipeline) -> Result<T, PipelineError> + Sync,
{
    log::debug!("Processing {} sources in parallel", paths.len());
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let mut pipeline = Pipeline::with_options(path, options.clone())?;
            process(path, &mut pipeline)
        })
        .collect()
}
