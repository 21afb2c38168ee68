//! Frame metadata and stream information tests.
//!
//! Probe tests require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use framepump::{FrameTime, MediaProbe, MetadataTracker, Rational, metadata::estimate_frame_total};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

// ── MetadataTracker ───────────────────────────────────────────────

#[test]
fn tracker_counts_from_zero() {
    let mut tracker = MetadataTracker::new(Rational::new(1, 1000));
    assert_eq!(tracker.current_frame_id(), 0);
    assert_eq!(tracker.last_time(), FrameTime::Unknown);

    let first = tracker.record(Some(0));
    let second = tracker.record(Some(500));
    assert_eq!(first.frame_id, 0);
    assert_eq!(second.frame_id, 1);
    assert_eq!(tracker.current_frame_id(), 2);
    assert_eq!(second.time, FrameTime::Exact(0.5));
    assert_eq!(second.timestamp(), Some(Duration::from_millis(500)));
    assert_eq!(tracker.last_pts(), Some(500));
}

#[test]
fn missing_pts_carries_time_forward() {
    let mut tracker = MetadataTracker::new(Rational::new(1, 90_000));
    tracker.record(Some(180_000));

    let untimed = tracker.record(None);
    assert_eq!(untimed.pts, None);
    assert_eq!(untimed.time, FrameTime::CarriedForward(2.0));
    assert!(!untimed.time.is_exact());
    assert_eq!(untimed.time.seconds(), Some(2.0));
    assert_eq!(tracker.last_pts(), None);

    // The next timed frame is exact again.
    let timed = tracker.record(Some(183_000));
    assert!(timed.time.is_exact());
}

#[test]
fn missing_pts_before_any_timestamp_is_unknown() {
    let mut tracker = MetadataTracker::new(Rational::new(1, 25));
    let metadata = tracker.record(None);
    assert_eq!(metadata.time, FrameTime::Unknown);
    assert_eq!(metadata.time.seconds(), None);
    assert_eq!(metadata.timestamp(), None);
    assert_eq!(tracker.current_frame_id(), 1);
}

#[test]
fn untimed_frames_are_counted() {
    let mut tracker = MetadataTracker::new(Rational::new(1, 1000));
    tracker.record(Some(0));
    for _ in 0..3 {
        assert_eq!(tracker.record(None).time, FrameTime::CarriedForward(0.0));
    }
    tracker.record(Some(100));

    assert_eq!(tracker.untimed_frames(), 3);
    assert_eq!(tracker.current_frame_id(), 5);
}

#[test]
fn degenerate_time_base_yields_no_time() {
    let mut tracker = MetadataTracker::new(Rational::new(0, 1));
    assert_eq!(tracker.seconds_from_pts(100), None);
    assert_eq!(tracker.record(Some(100)).time, FrameTime::Unknown);
}

#[test]
fn negative_pts_has_time_but_no_timestamp() {
    let mut tracker = MetadataTracker::new(Rational::new(1, 1000));
    let metadata = tracker.record(Some(-500));
    assert_eq!(metadata.time, FrameTime::Exact(-0.5));
    assert_eq!(metadata.timestamp(), None);
}

// ── estimate_frame_total ──────────────────────────────────────────

#[test]
fn estimate_prefers_container_count() {
    assert_eq!(
        estimate_frame_total(120, 999_999, Rational::new(1, 1000), 30.0, None),
        120
    );
}

#[test]
fn estimate_from_stream_duration() {
    // 10 seconds at 1/90000.
    assert_eq!(
        estimate_frame_total(0, 900_000, Rational::new(1, 90_000), 25.0, None),
        250
    );
}

#[test]
fn estimate_from_container_duration() {
    assert_eq!(
        estimate_frame_total(0, 0, Rational::new(1, 1000), 30.0, Some(Duration::from_secs(4))),
        120
    );
}

#[test]
fn estimate_unknown_is_zero() {
    assert_eq!(estimate_frame_total(0, 0, Rational::new(1, 1000), 30.0, None), 0);
    assert_eq!(
        estimate_frame_total(0, 1000, Rational::new(1, 1000), 0.0, Some(Duration::from_secs(1))),
        0
    );
}

// ── probing ───────────────────────────────────────────────────────

#[test]
fn probe_sample_video() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let info = MediaProbe::probe(path).expect("Failed to probe");
    assert_eq!(info.width, 1920);
    assert_eq!(info.height, 1080);
    assert_eq!(info.codec, "h264");
    assert!(info.container_format.contains("mp4"));
    assert_eq!(info.estimated_frame_total, 60);

    let duration = info.duration.expect("Fixture has a duration");
    assert!(
        (duration.as_secs_f64() - 2.0).abs() < 0.1,
        "Duration {duration:?}"
    );
    assert!(info.time_base.0 > 0 && info.time_base.1 > 0);
}
