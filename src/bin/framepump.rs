use std::{fs, path::PathBuf, time::Instant};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framepump::{
    FfmpegLogLevel, FilterDescriptor, HardwareAccelerationMode, HardwareDeviceType, MediaProbe,
    Pipeline, PipelineOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framepump probe input.mp4 --json\n  framepump frames input.mp4 --hardware vaapi --out frames --every 30 --progress\n  framepump frames input.mkv --filter 'scale=w=640:h=360,format=rgb24' --limit 100\n  framepump devices\n  framepump completions zsh > _framepump";

#[derive(Debug, Parser)]
#[command(
    name = "framepump",
    version,
    about = "Pull decoded, filtered video frames out of media files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Raise FFmpeg's own log output to `info`.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video stream information.
    #[command(
        visible_alias = "info",
        after_help = "Examples:\n  framepump probe input.mp4\n  framepump probe a.mp4 b.mkv --json"
    )]
    Probe {
        /// Input media paths or URLs.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Pull frames through the pipeline, optionally saving some as images.
    #[command(
        after_help = "Examples:\n  framepump frames input.mp4 --limit 10\n  framepump frames input.mp4 --out frames --every 25 --ext jpg --progress"
    )]
    Frames {
        /// Input media path or URL.
        input: String,

        /// Filter chain replacing the default scale/map/convert chain.
        #[arg(long)]
        filter: Option<String>,

        /// Hardware decode mode (auto, software, cuda, vaapi, drm, rkmpp, qsv, videotoolbox, d3d11va, dxva2).
        #[arg(long, default_value = "auto")]
        hardware: String,

        /// Fail instead of falling back to software decoding.
        #[arg(long)]
        require_hardware: bool,

        /// Open a specific FFmpeg decoder by name (e.g. hevc_rkmpp).
        #[arg(long)]
        decoder: Option<String>,

        /// Decoder thread count.
        #[arg(long)]
        threads: Option<usize>,

        /// Fixed hardware frame pool size (0 = dynamic).
        #[arg(long, default_value_t = 0)]
        pool_size: u32,

        /// Directory to save frames into.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Save every Nth frame.
        #[arg(long, default_value_t = 1)]
        every: u64,

        /// Image extension for saved frames.
        #[arg(long, default_value = "png")]
        ext: String,

        /// Stop after this many frames.
        #[arg(long)]
        limit: Option<u64>,

        /// Print metadata for every frame.
        #[arg(long)]
        print_frames: bool,

        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// List hardware device types the linked FFmpeg supports.
    Devices {
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_hardware_mode(value: &str) -> Option<HardwareAccelerationMode> {
    match value.to_ascii_lowercase().as_str() {
        "auto" => Some(HardwareAccelerationMode::Auto),
        "software" | "sw" | "cpu" | "none" => Some(HardwareAccelerationMode::Software),
        other => other
            .parse::<HardwareDeviceType>()
            .ok()
            .map(HardwareAccelerationMode::Specific),
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = FfmpegLogLevel::from_name(level)
            .ok_or(format!("unsupported --log-level: {level}"))?;
        framepump::set_ffmpeg_log_level(parsed);
    } else if global.verbose {
        framepump::set_ffmpeg_log_level(FfmpegLogLevel::Info);
    } else {
        framepump::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    framepump::initialize()?;
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { inputs, json } => {
            let results = MediaProbe::probe_many(&inputs);
            if json {
                let payload: Vec<_> = inputs
                    .iter()
                    .zip(&results)
                    .map(|(input, result)| match result {
                        Ok(info) => json!({
                            "input": input,
                            "container": info.container_format,
                            "codec": info.codec,
                            "width": info.width,
                            "height": info.height,
                            "frames_per_second": info.frames_per_second,
                            "duration_seconds": info.duration.map(|duration| duration.as_secs_f64()),
                            "time_base": format!("{}/{}", info.time_base.0, info.time_base.1),
                            "estimated_frame_total": info.estimated_frame_total,
                            "bits_per_raw_sample": info.bits_per_raw_sample,
                            "stream_index": info.stream_index,
                        }),
                        Err(error) => json!({
                            "input": input,
                            "error": error.to_string(),
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (input, result) in inputs.iter().zip(results) {
                    match result {
                        Ok(info) => {
                            println!("{}", input.bold());
                            println!("  Container: {}", info.container_format);
                            println!(
                                "  Video: {}x{} @ {:.2} fps [{}], stream #{}",
                                info.width,
                                info.height,
                                info.frames_per_second,
                                info.codec,
                                info.stream_index
                            );
                            println!("  Duration: {:?}", info.duration);
                            println!("  Time base: {}/{}", info.time_base.0, info.time_base.1);
                            println!("  Estimated frames: {}", info.estimated_frame_total);
                        }
                        Err(error) => {
                            eprintln!("{} {input}: {error}", "error:".red().bold());
                        }
                    }
                }
            }
        }
        Commands::Frames {
            input,
            filter,
            hardware,
            require_hardware,
            decoder,
            threads,
            pool_size,
            out,
            every,
            ext,
            limit,
            print_frames,
            progress,
        } => {
            if every == 0 {
                return Err("--every must be greater than 0".into());
            }
            let mode = parse_hardware_mode(&hardware)
                .ok_or(format!("unsupported --hardware mode: {hardware}"))?;

            let mut options = PipelineOptions::new()
                .with_hardware_acceleration(mode)
                .with_require_hardware(require_hardware)
                .with_hardware_frame_pool_size(pool_size);
            if let Some(filter) = filter {
                options = options.with_filter(FilterDescriptor::custom(filter));
            }
            if let Some(decoder) = decoder {
                options = options.with_decoder_name(decoder);
            }
            if let Some(threads) = threads {
                options = options.with_decoder_threads(threads);
            }

            if let Some(out) = &out {
                fs::create_dir_all(out)?;
            }
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();

            let mut pipeline = Pipeline::with_options(&input, options)?;
            eprintln!(
                "{} {} via {} -> {} {}x{} ({})",
                "pipeline:".cyan().bold(),
                pipeline.decoder_name(),
                pipeline
                    .hardware_device()
                    .map_or("software".to_string(), |device| device.to_string()),
                pipeline.pixel_format(),
                pipeline.frame_width(),
                pipeline.frame_height(),
                pipeline.filter_description(),
            );

            let progress_bar = if progress {
                let total = match (limit, pipeline.estimated_frame_total()) {
                    (Some(limit), 0) => limit,
                    (Some(limit), estimate) => limit.min(estimate),
                    (None, estimate) => estimate,
                };
                let bar = ProgressBar::new(total);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {per_sec} {msg}",
                )?;
                bar.set_style(style.progress_chars("##-"));
                Some(bar)
            } else {
                None
            };

            let started = Instant::now();
            let mut delivered = 0_u64;
            let mut saved = 0_u64;

            while let Some(frame) = pipeline.next_frame()? {
                delivered += 1;
                let metadata = frame.metadata();

                if print_frames {
                    let time = metadata
                        .time
                        .seconds()
                        .map_or("-".to_string(), |seconds| format!("{seconds:.3}s"));
                    let line = format!(
                        "frame {:>6} pts {:>10} time {:>10} {} bytes",
                        metadata.frame_id,
                        metadata.pts.map_or("-".to_string(), |pts| pts.to_string()),
                        time,
                        frame.len(),
                    );
                    match &progress_bar {
                        Some(bar) => bar.println(line),
                        None => println!("{line}"),
                    }
                }

                if let Some(out) = &out
                    && metadata.frame_id % every == 0
                {
                    let path = out.join(format!("frame_{:06}.{ext}", metadata.frame_id));
                    frame.to_image()?.save(&path)?;
                    saved += 1;
                }

                if let Some(bar) = &progress_bar {
                    bar.inc(1);
                }

                if limit.is_some_and(|limit| delivered >= limit) {
                    break;
                }
            }

            if let Some(bar) = progress_bar {
                bar.finish_with_message("done");
            }

            let elapsed = started.elapsed().as_secs_f64();
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "{delivered} frame(s) in {elapsed:.2}s ({:.1} fps){}",
                    if elapsed > 0.0 { delivered as f64 / elapsed } else { 0.0 },
                    match &out {
                        Some(out) => format!(", saved {saved} to {}", out.display()),
                        None => String::new(),
                    }
                )
                .green()
            );
        }
        Commands::Devices { json } => {
            let devices = framepump::available_hardware_devices();
            if json {
                let names: Vec<_> = devices.iter().map(|device| device.name()).collect();
                println!("{}", serde_json::to_string_pretty(&json!({ "devices": names }))?);
            } else if devices.is_empty() {
                println!("{}", "No hardware device types in this FFmpeg build".yellow());
            } else {
                for device in devices {
                    println!("{device}");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framepump", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_hardware_mode;
    use framepump::{HardwareAccelerationMode, HardwareDeviceType};

    #[test]
    fn parse_hardware_mode_aliases() {
        assert_eq!(parse_hardware_mode("auto"), Some(HardwareAccelerationMode::Auto));
        assert_eq!(parse_hardware_mode("CPU"), Some(HardwareAccelerationMode::Software));
        assert_eq!(
            parse_hardware_mode("rkmpp"),
            Some(HardwareAccelerationMode::Specific(HardwareDeviceType::Drm))
        );
        assert_eq!(
            parse_hardware_mode("vaapi"),
            Some(HardwareAccelerationMode::Specific(HardwareDeviceType::Vaapi))
        );
        assert!(parse_hardware_mode("opencl").is_none());
    }
}
