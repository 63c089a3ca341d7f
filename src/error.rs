use thiserror::Error;

use solcutter_lib::{ExportError, FfmpegError, ProbeError};

/// Main error type for the command line shell
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    Usage(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CliError>;
