//! Pipeline integration tests: frame flow, metadata, and lifecycle.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.
//! `sample_video.mp4` holds 60 frames of 1920x1080 H.264 at 30 fps.
//! `resolution_change.ts` switches from 320x240 to 640x480 after 10 frames.
//! `empty_video.mkv` declares a video track that carries no packets.

use std::path::Path;

use framepump::{
    FrameReader, FrameTime, HardwareAccelerationMode, Pipeline, PipelineOptions, PipelineState,
    PixelFormat,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";
const SAMPLE_VIDEO_FRAMES: u64 = 60;
const RESOLUTION_CHANGE: &str = "tests/fixtures/resolution_change.ts";
const EMPTY_VIDEO: &str = "tests/fixtures/empty_video.mkv";

fn skip_unless(path: &str) -> bool {
    if !Path::new(path).exists() {
        eprintln!("Skipping: fixture {path} not found");
        return true;
    }
    false
}

fn software_pipeline() -> Pipeline {
    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    Pipeline::with_options(SAMPLE_VIDEO, options).expect("Failed to build pipeline")
}

/// Keeps the decoded size, so a size change reaches the pixel adapter.
fn unscaled_options() -> PipelineOptions {
    PipelineOptions::new()
        .with_hardware_acceleration(HardwareAccelerationMode::Software)
        .with_filter("format=rgb24")
}

// ── construction ──────────────────────────────────────────────────

#[test]
fn default_chain_output_shape() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let pipeline = software_pipeline();
    assert!(pipeline.is_initialized());
    assert_eq!(pipeline.state(), PipelineState::Ready);
    assert_eq!(pipeline.frame_width(), 1280);
    assert_eq!(pipeline.frame_height(), 720);
    assert_eq!(pipeline.pixel_format(), PixelFormat::Bgr24);
    assert_eq!(pipeline.current_frame_id(), 0);
    assert_eq!(pipeline.last_frame_pts(), None);
    assert_eq!(pipeline.last_frame_time_seconds(), None);
    assert_eq!(pipeline.decoder_name(), "h264");
}

#[test]
fn stream_info_is_exposed() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let pipeline = software_pipeline();
    let info = pipeline.stream_info();
    assert_eq!(info.width, 1920);
    assert_eq!(info.height, 1080);
    assert_eq!(info.codec, "h264");
    assert!((info.frames_per_second - 30.0).abs() < 0.01);
    assert_eq!(pipeline.estimated_frame_total(), SAMPLE_VIDEO_FRAMES);
}

// ── frame flow ────────────────────────────────────────────────────

#[test]
fn delivers_every_frame_in_order() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let expected_bytes = 1280 * 720 * 3;

    let mut delivered = 0u64;
    let mut previous_pts: Option<i64> = None;
    while let Some(frame) = pipeline.next_frame().expect("Pull failed") {
        assert_eq!(frame.frame_id(), delivered, "Frame ids must be consecutive");
        assert_eq!(frame.len(), expected_bytes);
        assert_eq!(frame.stride() * frame.height() as usize, frame.len());
        assert!(!frame.is_empty());

        let pts = frame.pts().expect("Fixture frames carry timestamps");
        if let Some(previous) = previous_pts {
            assert!(pts >= previous, "pts went backwards: {previous} -> {pts}");
        }
        previous_pts = Some(pts);

        assert!(frame.time().is_exact());
        delivered += 1;
    }

    assert_eq!(delivered, SAMPLE_VIDEO_FRAMES);
    assert_eq!(pipeline.current_frame_id(), SAMPLE_VIDEO_FRAMES);
    assert_eq!(pipeline.state(), PipelineState::EndOfStream);
    assert!(!pipeline.has_failed());
}

#[test]
fn frame_times_follow_frame_rate() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let mut times = Vec::new();
    while let Some(frame) = pipeline.next_frame().expect("Pull failed") {
        times.push(frame.time().seconds().expect("Fixture frames are timed"));
        if times.len() == 10 {
            break;
        }
    }

    let first = times[0];
    for (index, time) in times.iter().enumerate() {
        let expected = first + index as f64 / 30.0;
        assert!(
            (time - expected).abs() < 0.002,
            "Frame {index} at {time}s, expected {expected}s"
        );
    }
}

#[test]
fn buffered_frames_are_delivered_while_draining() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let mut states = Vec::new();
    while pipeline.next_frame().expect("Pull failed").is_some() {
        states.push(pipeline.state());
    }

    assert_eq!(states.len() as u64, SAMPLE_VIDEO_FRAMES);
    let first_draining = states
        .iter()
        .position(|state| *state == PipelineState::Draining)
        .expect("Decoder holds frames back past the last packet");
    assert!(
        states[first_draining..]
            .iter()
            .all(|state| *state == PipelineState::Draining),
        "Draining never returns to Ready: {states:?}"
    );
    assert!(
        states[..first_draining]
            .iter()
            .all(|state| *state == PipelineState::Ready)
    );
    assert_eq!(pipeline.state(), PipelineState::EndOfStream);
}

#[test]
fn last_frame_queries_track_delivery() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let (pts, seconds) = {
        let frame = pipeline
            .next_frame()
            .expect("Pull failed")
            .expect("Expected a frame");
        (frame.pts(), frame.time().seconds())
    };

    assert_eq!(pipeline.current_frame_id(), 1);
    assert_eq!(pipeline.last_frame_pts(), pts);
    assert_eq!(pipeline.last_frame_time_seconds(), seconds);
}

#[test]
fn end_of_stream_is_idempotent() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    while pipeline.next_frame().expect("Pull failed").is_some() {}

    let last_pts = pipeline.last_frame_pts();
    for _ in 0..3 {
        assert!(pipeline.next_frame().expect("Pull after EOS failed").is_none());
    }
    assert_eq!(pipeline.state(), PipelineState::EndOfStream);
    assert!(pipeline.state().is_terminal());
    assert_eq!(pipeline.current_frame_id(), SAMPLE_VIDEO_FRAMES);
    assert_eq!(pipeline.last_frame_pts(), last_pts);
}

#[test]
fn owned_frames_outlive_the_next_pull() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let first = pipeline
        .next_frame()
        .expect("Pull failed")
        .expect("Expected a frame")
        .to_owned_frame();
    let second = pipeline
        .next_frame()
        .expect("Pull failed")
        .expect("Expected a frame")
        .to_owned_frame();

    assert_eq!(first.metadata().frame_id, 0);
    assert_eq!(second.metadata().frame_id, 1);
    assert_eq!(first.data().len(), second.data().len());
    // testsrc2 animates every frame.
    assert_ne!(first.data(), second.data());
}

#[test]
fn frame_converts_to_image() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut pipeline = software_pipeline();
    let frame = pipeline
        .next_frame()
        .expect("Pull failed")
        .expect("Expected a frame");
    let image = frame.to_image().expect("Failed to convert frame");
    assert_eq!(image.width(), 1280);
    assert_eq!(image.height(), 720);

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output_path = temporary_directory.path().join("frame.png");
    image.save(&output_path).expect("Failed to save image");
    assert!(output_path.exists());
}

// ── iteration ─────────────────────────────────────────────────────

#[test]
fn into_frames_yields_every_frame() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let frames: Vec<_> = software_pipeline()
        .into_frames()
        .collect::<Result<_, _>>()
        .expect("Iteration failed");

    assert_eq!(frames.len() as u64, SAMPLE_VIDEO_FRAMES);
    for (index, frame) in frames.iter().enumerate() {
        assert_eq!(frame.metadata().frame_id, index as u64);
        assert_eq!(frame.width(), 1280);
        assert_eq!(frame.height(), 720);
        assert_ne!(frame.metadata().time, FrameTime::Unknown);
    }
}

#[test]
fn iterator_is_fused() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut frames = software_pipeline().into_frames();
    assert_eq!(frames.by_ref().count() as u64, SAMPLE_VIDEO_FRAMES);
    assert!(frames.next().is_none());
    assert!(frames.next().is_none());

    let pipeline = frames.into_pipeline();
    assert_eq!(pipeline.state(), PipelineState::EndOfStream);
}

#[test]
fn iterator_take_stops_early() {
    if skip_unless(SAMPLE_VIDEO) {
        return;
    }

    let mut frames = software_pipeline().into_frames();
    let taken: Vec<_> = frames.by_ref().take(5).collect();
    assert_eq!(taken.len(), 5);
    assert_eq!(frames.pipeline().current_frame_id(), 5);
    assert!(!frames.pipeline().state().is_terminal());
}

// ── mid-stream failure ────────────────────────────────────────────

#[test]
fn size_change_fails_once_then_ends() {
    if skip_unless(RESOLUTION_CHANGE) {
        return;
    }

    let mut pipeline =
        Pipeline::with_options(RESOLUTION_CHANGE, unscaled_options()).expect("Failed to build pipeline");
    assert_eq!((pipeline.frame_width(), pipeline.frame_height()), (320, 240));

    let mut delivered = 0u64;
    let error = loop {
        match pipeline.next_frame() {
            Ok(Some(frame)) => {
                assert_eq!((frame.width(), frame.height()), (320, 240));
                delivered += 1;
            }
            Ok(None) => panic!("Stream ended without reporting the size change"),
            Err(error) => break error,
        }
    };

    assert!(delivered > 0 && delivered <= 10, "Delivered {delivered} frames");
    assert!(!error.is_construction_error(), "Unexpected error: {error}");
    assert!(pipeline.has_failed());
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(pipeline.state().is_terminal());
    assert_eq!(pipeline.current_frame_id(), delivered);

    let last_pts = pipeline.last_frame_pts();
    for _ in 0..2 {
        assert!(pipeline.next_frame().expect("Failure is reported once").is_none());
    }
    assert_eq!(pipeline.current_frame_id(), delivered);
    assert_eq!(pipeline.last_frame_pts(), last_pts);
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn size_change_stops_the_iterator() {
    if skip_unless(RESOLUTION_CHANGE) {
        return;
    }

    let mut frames = Pipeline::with_options(RESOLUTION_CHANGE, unscaled_options())
        .expect("Failed to build pipeline")
        .into_frames();
    let results: Vec<_> = frames.by_ref().collect();

    let last = results.last().expect("At least the failure is yielded");
    assert!(last.is_err());
    assert_eq!(results.iter().filter(|result| result.is_err()).count(), 1);
    assert!(frames.next().is_none());
    assert!(frames.pipeline().has_failed());
}

#[test]
fn reader_ends_after_size_change() {
    if skip_unless(RESOLUTION_CHANGE) {
        return;
    }

    let mut reader = FrameReader::with_options(RESOLUTION_CHANGE, unscaled_options());
    assert!(reader.is_initialized());

    let mut delivered = 0u64;
    while reader.next_frame().is_some() {
        delivered += 1;
    }

    assert!(delivered > 0);
    assert!(reader.has_failed());
    assert_eq!(reader.state(), PipelineState::Failed);
    assert!(reader.last_error().is_some());
    assert!(reader.initialization_error().is_none());
    assert!(reader.next_frame().is_none());
    assert_eq!(reader.current_frame_id(), delivered);
}

// ── streams without frames ────────────────────────────────────────

#[test]
fn stream_without_frames_ends_immediately() {
    if skip_unless(EMPTY_VIDEO) {
        return;
    }

    let options = PipelineOptions::new()
        .with_hardware_acceleration(HardwareAccelerationMode::Software)
        .with_filter("scale=w=320:h=240,format=rgb24");
    let mut pipeline = Pipeline::with_options(EMPTY_VIDEO, options).expect("Failed to build pipeline");

    assert_eq!(pipeline.frame_width(), 320);
    assert_eq!(pipeline.frame_height(), 240);
    assert_eq!(pipeline.pixel_format(), PixelFormat::Rgb24);
    assert_eq!(pipeline.state(), PipelineState::EndOfStream);
    assert!(!pipeline.has_failed());

    assert!(pipeline.next_frame().expect("Pull failed").is_none());
    assert!(pipeline.next_frame().expect("Pull failed").is_none());
    assert_eq!(pipeline.current_frame_id(), 0);
    assert_eq!(pipeline.last_frame_pts(), None);
}

#[test]
fn stream_without_frames_yields_empty_iterator() {
    if skip_unless(EMPTY_VIDEO) {
        return;
    }

    let options =
        PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    let pipeline = Pipeline::with_options(EMPTY_VIDEO, options).expect("Failed to build pipeline");
    assert_eq!((pipeline.frame_width(), pipeline.frame_height()), (1280, 720));
    assert_eq!(pipeline.into_frames().count(), 0);
}
