//! # framepump
//!
//! Hardware-accelerated video frame extraction.
//!
//! `framepump` opens a media container, decodes its video stream (on a GPU
//! or SoC video engine when one is available), runs every frame through an
//! FFmpeg filter chain that scales, maps to host memory and converts the
//! pixel layout, and hands out the result as flat pixel buffers with
//! per-frame metadata. It drives FFmpeg through the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Pull frames
//!
//! ```no_run
//! use framepump::Pipeline;
//!
//! let mut pipeline = Pipeline::open("input.mp4")?;
//! println!("{}x{} {}", pipeline.frame_width(), pipeline.frame_height(), pipeline.pixel_format());
//!
//! while let Some(frame) = pipeline.next_frame()? {
//!     let bytes: &[u8] = frame.data();
//!     println!("frame {} pts {:?}: {} bytes", frame.frame_id(), frame.pts(), bytes.len());
//! }
//! # Ok::<(), framepump::PipelineError>(())
//! ```
//!
//! ### Custom chain on a specific device
//!
//! ```no_run
//! use framepump::{HardwareAccelerationMode, HardwareDeviceType, Pipeline, PipelineOptions};
//!
//! let options = PipelineOptions::new()
//!     .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Vaapi))
//!     .with_require_hardware(true)
//!     .with_filter("scale_vaapi=w=640:h=360:format=nv12,hwmap=mode=read,format=rgb24");
//!
//! let frames = Pipeline::with_options("input.mkv", options)?.into_frames();
//! for frame in frames {
//!     let frame = frame?;
//!     frame.to_image()?.save(format!("frame_{:05}.png", frame.metadata().frame_id))?;
//! }
//! # Ok::<(), framepump::PipelineError>(())
//! ```
//!
//! ## Features
//!
//! - **Hardware decoding**: CUDA, VAAPI, DRM PRIME (Rockchip MPP), QSV,
//!   VideoToolbox, D3D11VA and DXVA2, with optional software fallback
//! - **Filter chains**: any FFmpeg filtergraph text, validated when the
//!   pipeline is built
//! - **Flat buffers**: tightly packed rows, zero-copy when the filter output
//!   already is
//! - **Frame metadata**: sequence id, presentation timestamp, time in
//!   seconds
//! - **Stream probing**: [`MediaProbe`] without creating a decoder
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`parallel::for_each_source`] runs one pipeline per source on rayon threads |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed. Hardware decoding also
//! needs an FFmpeg build with the matching device support and working
//! drivers; see [`available_hardware_devices`].

pub mod configuration;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod filter_graph;
pub mod frame;
pub mod hardware_acceleration;
pub mod iterator;
pub mod metadata;
#[cfg(feature = "rayon")]
pub mod parallel;
pub mod pipeline;
pub mod pixel_buffer;
pub mod probe;
pub mod reader;
pub mod source;

pub use configuration::{
    DEFAULT_OUTPUT_FORMAT, DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH, FilterDescriptor,
    PipelineOptions, PixelFormat,
};
pub use decoder::{DecodeSession, DecodeStep, Submit};
pub use error::{DecodeErrorKind, GraphErrorKind, OpenErrorKind, PipelineError};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, initialize, set_ffmpeg_log_level};
pub use ffmpeg_next::Rational;
pub use filter_graph::{FilterGraph, Pull, SourceFrameParameters};
pub use frame::{DecodedFrame, HardwareFrame, HostFrame};
pub use hardware_acceleration::{
    HardwareAccelerationMode, HardwareDeviceType, available_hardware_devices,
};
pub use iterator::FrameIterator;
pub use metadata::{FrameMetadata, FrameTime, MetadataTracker, StreamInfo};
pub use pipeline::{Pipeline, PipelineState};
pub use pixel_buffer::{OutputFrame, OwnedFrame, PixelBufferAdapter};
pub use probe::MediaProbe;
pub use reader::FrameReader;
pub use source::MediaSource;
