//! Process-wide FFmpeg setup and log level configuration.
//!
//! [`initialize`] registers FFmpeg's codecs, demuxers, filters and device
//! types once per process. [`MediaSource::open`](crate::MediaSource::open)
//! calls it, so callers only need it before querying
//! [`available_hardware_devices`](crate::available_hardware_devices).
//!
//! FFmpeg writes its own diagnostics to stderr, independently of the `log`
//! facade this crate reports through. [`set_ffmpeg_log_level`] controls that
//! stream.
//!
//! # Example
//!
//! ```no_run
//! use framepump::{FfmpegLogLevel, Pipeline};
//!
//! framepump::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//!
//! let pipeline = Pipeline::open("input.mp4")?;
//! # Ok::<(), framepump::PipelineError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::OnceLock,
};

use ffmpeg_next::util::log::Level;

use crate::error::PipelineError;

static INITIALIZATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialise the FFmpeg libraries for this process.
///
/// The first call performs the registration; later calls return the cached
/// outcome. Safe to call from multiple threads.
///
/// # Errors
///
/// Returns [`PipelineError::Runtime`] if FFmpeg reported an initialisation
/// failure. The failure is cached; it is not retried.
pub fn initialize() -> Result<(), PipelineError> {
    let outcome = INITIALIZATION.get_or_init(|| {
        log::debug!("Initialising FFmpeg libraries");
        ffmpeg_next::init().map_err(|error| error.to_string())
    });

    outcome
        .clone()
        .map_err(|reason| PipelineError::Runtime(format!("FFmpeg initialisation failed: {reason}")))
}

/// Verbosity of FFmpeg's own stderr output, quietest first.
///
/// Hardware decoders in particular log per-surface chatter at `Info` and
/// above; pipelines are usually run at [`FfmpegLogLevel::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings.
    Warning,
    /// Informational messages (FFmpeg's default).
    Info,
    /// Detailed informational messages.
    Verbose,
    /// Debugging output.
    Debug,
    /// Everything, including per-packet tracing.
    Trace,
}

/// Each level with FFmpeg's constant and its command-line name.
const LEVELS: [(FfmpegLogLevel, Level, &str); 9] = [
    (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
    (FfmpegLogLevel::Panic, Level::Panic, "panic"),
    (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
    (FfmpegLogLevel::Error, Level::Error, "error"),
    (FfmpegLogLevel::Warning, Level::Warning, "warning"),
    (FfmpegLogLevel::Info, Level::Info, "info"),
    (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
    (FfmpegLogLevel::Debug, Level::Debug, "debug"),
    (FfmpegLogLevel::Trace, Level::Trace, "trace"),
];

impl FfmpegLogLevel {
    /// Parse a level name as accepted by `ffmpeg -loglevel`. `"warn"` is
    /// accepted for `"warning"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let name = if name == "warn" { "warning" } else { name.as_str() };
        LEVELS
            .iter()
            .find(|(_, _, candidate)| *candidate == name)
            .map(|(level, _, _)| *level)
    }

    /// The level's name.
    pub fn name(self) -> &'static str {
        LEVELS[self as usize].2
    }

    fn to_library(self) -> Level {
        LEVELS[self as usize].1
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Set FFmpeg's stderr verbosity. Rust-side `log` output is unaffected.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    log::debug!("Setting FFmpeg log level to {level}");
    ffmpeg_next::util::log::set_level(level.to_library());
}

/// FFmpeg's current stderr verbosity, if it is one of the named levels.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    let current = ffmpeg_next::util::log::get_level().ok()?;
    LEVELS
        .iter()
        .find(|(_, library, _)| *library == current)
        .map(|(level, _, _)| *level)
}

