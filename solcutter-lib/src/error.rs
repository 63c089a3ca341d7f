use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the export pipeline and the media engine
#[derive(Error, Debug)]
pub enum ExportError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source file could not be opened or decoded
    #[error("Cannot open source {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The trim range is empty or reversed once clamped to the source duration
    #[error("Invalid time range: start={start:.3}s, end={end:.3}s")]
    InvalidRange { start: f64, end: f64 },

    /// The crop rectangle lies outside the frame or is degenerate
    #[error("Invalid crop rectangle: {0}")]
    InvalidCrop(String),

    /// The output path has no existing parent directory
    #[error("Output directory does not exist: {0:?}")]
    OutputDir(PathBuf),

    /// Audio export was requested for a source without an audio track
    #[error("Source has no audio track")]
    MissingAudioTrack,

    /// The source file does not contain a video stream
    #[error("No video stream found in source file")]
    NoVideoStream,

    /// An error occurred while encoding or muxing the output
    #[error("Encoding error: {0}")]
    Encode(String),

    /// The job was cancelled before it completed
    #[error("Export cancelled")]
    Cancelled,

    /// An export was requested before any source was loaded
    #[error("No source loaded")]
    NoSource,

    /// Another export is already running on this exporter
    #[error("An export is already in progress")]
    Busy,
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// The requested decoder was not found or could not be opened
    #[error("Failed to open decoder: {0}")]
    DecoderNotFound(String),

    /// The requested encoder was not found in this FFmpeg build
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure opening or configuring an encoder
    #[error("Failed to open encoder: {0}")]
    EncoderCreate(String),

    /// Failure building or running a filter graph
    #[error("Filter graph error: {0}")]
    Filter(String),

    /// Failure creating an output format muxer
    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure decoding a packet into a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a frame into a packet
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure seeking in the input
    #[error("Seek failed: {0}")]
    Seek(String),
}

/// Errors produced by the enumeration probe
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Any network or HTTP-level failure talking to the target
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The probe settings cannot produce a meaningful scan
    #[error("Invalid probe configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExportError>;
