//! Pipeline configuration.
//!
//! [`PipelineOptions`] is a builder that threads the filter chain, hardware
//! acceleration policy, and decoder tuning through
//! [`Pipeline::with_options`](crate::Pipeline::with_options) without
//! polluting every constructor signature.
//!
//! # Example
//!
//! ```no_run
//! use framepump::{FilterDescriptor, HardwareAccelerationMode, HardwareDeviceType, PipelineOptions};
//!
//! let options = PipelineOptions::new()
//!     .with_filter(FilterDescriptor::custom(
//!         "scale_vaapi=w=640:h=360:format=nv12,hwmap=mode=read,format=bgr24",
//!     ))
//!     .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Vaapi))
//!     .with_require_hardware(true);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::format::Pixel;

use crate::hardware_acceleration::{HardwareAccelerationMode, HardwareDeviceType};

/// Output width produced by the default filter chain.
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1280;

/// Output height produced by the default filter chain.
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 720;

/// Pixel layout produced by the default filter chain.
pub const DEFAULT_OUTPUT_FORMAT: PixelFormat = PixelFormat::Bgr24;

/// Packed, single-plane pixel layouts a filter graph may deliver.
///
/// The pixel adapter only exposes layouts whose every row is one run of
/// interleaved bytes; planar or sub-sampled formats are rejected when the
/// graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit BGR (24 bpp). Produced by the default chain.
    Bgr24,
    /// 8-bit RGB (24 bpp).
    Rgb24,
    /// 8-bit RGBA (32 bpp).
    Rgba,
    /// 8-bit BGRA (32 bpp).
    Bgra,
    /// 8-bit ARGB (32 bpp).
    Argb,
    /// 8-bit ABGR (32 bpp).
    Abgr,
    /// 8-bit grayscale (8 bpp).
    Gray8,
    /// 16-bit little-endian grayscale (16 bpp).
    Gray16Le,
}

impl PixelFormat {
    /// Map an FFmpeg pixel format to a supported packed layout.
    pub fn from_ffmpeg_pixel(pixel: Pixel) -> Option<Self> {
        match pixel {
            Pixel::BGR24 => Some(PixelFormat::Bgr24),
            Pixel::RGB24 => Some(PixelFormat::Rgb24),
            Pixel::RGBA => Some(PixelFormat::Rgba),
            Pixel::BGRA => Some(PixelFormat::Bgra),
            Pixel::ARGB => Some(PixelFormat::Argb),
            Pixel::ABGR => Some(PixelFormat::Abgr),
            Pixel::GRAY8 => Some(PixelFormat::Gray8),
            Pixel::GRAY16LE => Some(PixelFormat::Gray16Le),
            _ => None,
        }
    }

    /// The corresponding FFmpeg pixel format constant.
    pub fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Bgr24 => Pixel::BGR24,
            PixelFormat::Rgb24 => Pixel::RGB24,
            PixelFormat::Rgba => Pixel::RGBA,
            PixelFormat::Bgra => Pixel::BGRA,
            PixelFormat::Argb => Pixel::ARGB,
            PixelFormat::Abgr => Pixel::ABGR,
            PixelFormat::Gray8 => Pixel::GRAY8,
            PixelFormat::Gray16Le => Pixel::GRAY16LE,
        }
    }

    /// Bytes occupied by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Argb | PixelFormat::Abgr => 4,
            PixelFormat::Gray8 => 1,
            PixelFormat::Gray16Le => 2,
        }
    }

    /// Number of interleaved channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Argb | PixelFormat::Abgr => 4,
            PixelFormat::Gray8 | PixelFormat::Gray16Le => 1,
        }
    }

    /// FFmpeg's name for the layout (e.g. `"bgr24"`).
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Argb => "argb",
            PixelFormat::Abgr => "abgr",
            PixelFormat::Gray8 => "gray",
            PixelFormat::Gray16Le => "gray16le",
        }
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// The textual filter chain placed between the decoder and the sink.
///
/// The text uses FFmpeg's filtergraph mini-language; its grammar belongs to
/// FFmpeg. The chain is parsed and negotiated once, when the pipeline is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterDescriptor {
    /// Scale to [`DEFAULT_OUTPUT_WIDTH`]×[`DEFAULT_OUTPUT_HEIGHT`], map the
    /// frame to host memory, and convert to [`DEFAULT_OUTPUT_FORMAT`].
    ///
    /// The concrete chain depends on the decode path: see
    /// [`HardwareDeviceType::default_filter_chain`] for hardware devices and
    /// [`FilterDescriptor::software_default`] for software decoding.
    #[default]
    Default,
    /// A caller-supplied chain, used verbatim.
    Custom(String),
}

impl FilterDescriptor {
    /// A caller-supplied chain.
    pub fn custom(description: impl Into<String>) -> Self {
        FilterDescriptor::Custom(description.into())
    }

    /// The default chain used when decoding in software.
    pub fn software_default() -> String {
        format!(
            "scale=w={DEFAULT_OUTPUT_WIDTH}:h={DEFAULT_OUTPUT_HEIGHT},format={}",
            DEFAULT_OUTPUT_FORMAT.name()
        )
    }

    /// Resolve to the concrete chain for the active decode path.
    ///
    /// `device` is the hardware device frames arrive on, or `None` for
    /// software-decoded frames.
    pub fn resolve(&self, device: Option<HardwareDeviceType>) -> String {
        match self {
            FilterDescriptor::Custom(description) => description.clone(),
            FilterDescriptor::Default => match device {
                Some(device) => device.default_filter_chain(
                    DEFAULT_OUTPUT_WIDTH,
                    DEFAULT_OUTPUT_HEIGHT,
                    DEFAULT_OUTPUT_FORMAT,
                ),
                None => Self::software_default(),
            },
        }
    }
}

impl From<&str> for FilterDescriptor {
    fn from(description: &str) -> Self {
        FilterDescriptor::Custom(description.to_string())
    }
}

impl From<String> for FilterDescriptor {
    fn from(description: String) -> Self {
        FilterDescriptor::Custom(description)
    }
}

/// Configuration for building a [`Pipeline`](crate::Pipeline).
///
/// All fields have sensible defaults: the default filter chain, automatic
/// hardware selection with software fallback, the codec's default decoder,
/// and a dynamically sized hardware frame pool.
#[derive(Debug, Clone)]
#[must_use]
pub struct PipelineOptions {
    pub(crate) filter: FilterDescriptor,
    pub(crate) hardware_acceleration: HardwareAccelerationMode,
    pub(crate) require_hardware: bool,
    pub(crate) decoder_name: Option<String>,
    pub(crate) hardware_frame_pool_size: u32,
    pub(crate) decoder_threads: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            filter: FilterDescriptor::Default,
            hardware_acceleration: HardwareAccelerationMode::Auto,
            require_hardware: false,
            decoder_name: None,
            hardware_frame_pool_size: 0,
            decoder_threads: None,
        }
    }

    /// Set the filter chain.
    pub fn with_filter(mut self, filter: impl Into<FilterDescriptor>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the hardware acceleration mode. Defaults to
    /// [`HardwareAccelerationMode::Auto`].
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware_acceleration = mode;
        self
    }

    /// Fail construction instead of falling back to software decoding when
    /// no hardware device can be initialised.
    ///
    /// Has no effect with [`HardwareAccelerationMode::Software`].
    pub fn with_require_hardware(mut self, require: bool) -> Self {
        self.require_hardware = require;
        self
    }

    /// Open a specific FFmpeg decoder by name (e.g. `"hevc_rkmpp"`,
    /// `"h264_cuvid"`) instead of the codec's default decoder.
    pub fn with_decoder_name(mut self, name: impl Into<String>) -> Self {
        self.decoder_name = Some(name.into());
        self
    }

    /// Number of surfaces pre-allocated in the hardware frame pool.
    ///
    /// `0` (the default) lets the device grow the pool on demand. Some
    /// drivers need a fixed pool.
    pub fn with_hardware_frame_pool_size(mut self, size: u32) -> Self {
        self.hardware_frame_pool_size = size;
        self
    }

    /// Number of decoder threads. `None` keeps FFmpeg's default.
    pub fn with_decoder_threads(mut self, threads: usize) -> Self {
        self.decoder_threads = Some(threads.max(1));
        self
    }

    /// The configured filter chain.
    pub fn filter(&self) -> &FilterDescriptor {
        &self.filter
    }

    /// The configured hardware acceleration mode.
    pub fn hardware_acceleration(&self) -> HardwareAccelerationMode {
        self.hardware_acceleration
    }

    /// Whether hardware decoding is mandatory.
    pub fn requires_hardware(&self) -> bool {
        self.require_hardware
    }
}
