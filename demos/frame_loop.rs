//! Pull frames in a loop and save a few of them.
//!
//! Usage:
//!   cargo run --example frame_loop -- <input_file> [filter_chain]

use std::error::Error;

use framepump::{FrameReader, Pipeline, PipelineOptions, PipelineState};

fn main() -> Result<(), Box<dyn Error>> {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.mp4".to_string());
    let filter = std::env::args().nth(2);

    let mut options = PipelineOptions::new();
    if let Some(filter) = &filter {
        options = options.with_filter(filter.as_str());
    }

    // ── Borrowed frames ────────────────────────────────────────────
    let mut pipeline = Pipeline::with_options(&input_path, options)?;
    println!(
        "{} -> {}x{} {} on {}, ~{} frames",
        input_path,
        pipeline.frame_width(),
        pipeline.frame_height(),
        pipeline.pixel_format(),
        pipeline
            .hardware_device()
            .map_or("software".to_string(), |device| device.to_string()),
        pipeline.estimated_frame_total(),
    );

    while let Some(frame) = pipeline.next_frame()? {
        if frame.frame_id() % 30 == 0 {
            println!(
                "  Frame {} pts {:?} at {:?}s: {} bytes",
                frame.frame_id(),
                frame.pts(),
                frame.time().seconds(),
                frame.len(),
            );
        }
        if frame.frame_id() < 3 {
            frame
                .to_image()?
                .save(format!("frame_{:03}.png", frame.frame_id()))?;
        }
    }
    println!("Delivered {} frames", pipeline.current_frame_id());

    // ── Owned frames ───────────────────────────────────────────────
    println!("\nCollecting the first 5 frames as owned buffers...");
    let frames = Pipeline::open(&input_path)?
        .into_frames()
        .take(5)
        .collect::<Result<Vec<_>, _>>()?;
    for frame in &frames {
        println!("  Frame {}: {} bytes", frame.metadata().frame_id, frame.data().len());
    }

    // ── Query-style reader ─────────────────────────────────────────
    println!("\nReading through FrameReader...");
    let mut reader = FrameReader::new(&input_path, filter.as_deref());
    let mut count = 0u64;
    while reader.next_frame().is_some() {
        count += 1;
    }
    match reader.state() {
        PipelineState::EndOfStream => println!("  Read {count} frames"),
        state => println!("  Stopped in {state:?}: {:?}", reader.last_error()),
    }

    println!("\nDone!");
    Ok(())
}
