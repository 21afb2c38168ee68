//! Benchmarks for pipeline construction and frame throughput.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! Requires fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, path::Path, time::Duration};

use criterion::Criterion;
use framepump::{
    FfmpegLogLevel, HardwareAccelerationMode, Pipeline, PipelineOptions,
    pixel_buffer::compact_rows,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn software_options() -> PipelineOptions {
    PipelineOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software)
}

fn drain(pipeline: &mut Pipeline) -> u64 {
    let mut delivered = 0;
    while let Some(frame) = pipeline.next_frame().unwrap() {
        black_box(frame.data());
        delivered += 1;
    }
    delivered
}

fn benchmark_construction(criterion: &mut Criterion) {
    framepump::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    criterion.bench_function("open pipeline (software, default chain)", |bencher| {
        bencher.iter(|| Pipeline::with_options(SAMPLE_VIDEO, software_options()).unwrap());
    });

    criterion.bench_function("open pipeline (auto)", |bencher| {
        bencher.iter(|| Pipeline::open(SAMPLE_VIDEO).unwrap());
    });
}

fn benchmark_throughput(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let mut group = criterion.benchmark_group("full stream");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(15));

    group.bench_function("default chain 1280x720 bgr24", |bencher| {
        bencher.iter(|| {
            let mut pipeline = Pipeline::with_options(SAMPLE_VIDEO, software_options()).unwrap();
            drain(&mut pipeline)
        });
    });

    // Packed rows are exposed without a copy.
    group.bench_function("aligned rows 640x360 rgba", |bencher| {
        bencher.iter(|| {
            let options = software_options().with_filter("scale=w=640:h=360,format=rgba");
            let mut pipeline = Pipeline::with_options(SAMPLE_VIDEO, options).unwrap();
            drain(&mut pipeline)
        });
    });

    // Padded rows go through compaction.
    group.bench_function("padded rows 642x362 bgr24", |bencher| {
        bencher.iter(|| {
            let options = software_options().with_filter("scale=w=642:h=362,format=bgr24");
            let mut pipeline = Pipeline::with_options(SAMPLE_VIDEO, options).unwrap();
            drain(&mut pipeline)
        });
    });

    group.bench_function("owned frames via iterator", |bencher| {
        bencher.iter(|| {
            Pipeline::with_options(SAMPLE_VIDEO, software_options())
                .unwrap()
                .into_frames()
                .map(|frame| frame.unwrap().into_data().len())
                .sum::<usize>()
        });
    });

    group.finish();
}

fn benchmark_compaction(criterion: &mut Criterion) {
    let (width, height, stride) = (1280 * 3, 720, 1280 * 3 + 64);
    let plane = vec![0x5a_u8; stride * height];
    let mut output = Vec::with_capacity(width * height);

    criterion.bench_function("compact 1280x720 bgr24 rows", |bencher| {
        bencher.iter(|| {
            compact_rows(black_box(&plane), stride, width, height, &mut output).unwrap();
            black_box(output.len())
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_construction,
    benchmark_throughput,
    benchmark_compaction,
);
criterion::criterion_main!(benches);
