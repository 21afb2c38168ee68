//! FrameReader integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;

use framepump::{FrameReader, HardwareAccelerationMode, PipelineOptions, PipelineState, PixelFormat};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn software_options() -> PipelineOptions {
    PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software)
}

#[test]
fn reader_reads_to_end() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut reader = FrameReader::with_options(path, software_options());
    assert!(reader.is_initialized());
    assert_eq!(reader.state(), PipelineState::Ready);
    assert_eq!(reader.frame_width(), 1280);
    assert_eq!(reader.frame_height(), 720);
    assert_eq!(reader.pixel_format(), Some(PixelFormat::Bgr24));
    assert_eq!(reader.estimated_frame_total(), 60);

    let mut delivered = 0u64;
    while let Some(frame) = reader.next_frame() {
        assert_eq!(frame.frame_id(), delivered);
        delivered += 1;
    }

    assert_eq!(delivered, 60);
    assert_eq!(reader.current_frame_id(), 60);
    assert!(!reader.has_failed());
    assert!(reader.last_error().is_none());
    assert_eq!(reader.state(), PipelineState::EndOfStream);
    assert!(reader.next_frame().is_none());
    assert!(reader.last_frame_pts().is_some());
    assert!(reader.last_frame_time_seconds().is_some());
}

#[test]
fn reader_with_custom_filter() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = software_options().with_filter("scale=w=64:h=64,format=rgba");
    let mut reader = FrameReader::with_options(path, options);
    assert!(reader.is_initialized(), "{:?}", reader.initialization_error());

    let frame = reader.next_frame().expect("Expected a frame");
    assert_eq!(frame.len(), 64 * 64 * 4);
    assert_eq!(frame.pixel_format(), PixelFormat::Rgba);
}

#[test]
fn reader_with_broken_filter_is_not_initialized() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut reader = FrameReader::new(path, Some("this is not a filter chain"));
    assert!(!reader.is_initialized());
    assert!(reader.has_failed());
    assert!(reader.next_frame().is_none());
    assert!(reader.pipeline().is_none());

    let message = reader
        .initialization_error()
        .expect("Construction error should be kept")
        .to_string();
    assert!(message.contains("Filter graph error"), "{message}");
}
