//! Parallel source processing tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

#![cfg(feature = "rayon")]

use std::path::Path;

use framepump::{HardwareAccelerationMode, PipelineError, PipelineOptions, parallel};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn counts_frames_of_each_source() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    let paths = [path, "missing.mp4", path];

    let results = parallel::for_each_source(&paths, &options, |_path, pipeline| {
        let mut count = 0u64;
        while pipeline.next_frame()?.is_some() {
            count += 1;
        }
        Ok(count)
    });

    assert_eq!(results.len(), 3);
    assert_eq!(*results[0].as_ref().expect("First source failed"), 60);
    assert!(matches!(results[1], Err(PipelineError::Open { .. })));
    assert_eq!(*results[2].as_ref().expect("Third source failed"), 60);
}

#[test]
fn process_errors_stay_per_source() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    let results = parallel::for_each_source(&[path, path], &options, |_path, _pipeline| {
        Err::<(), _>(PipelineError::Runtime("rejected".to_string()))
    });

    assert!(results.iter().all(|result| matches!(result, Err(PipelineError::Runtime(_)))));
}
