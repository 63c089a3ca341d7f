pub mod engine;
pub mod error;
pub mod export;
pub mod ffmpeg_utils;
pub mod probe;
pub mod selection;
pub mod session;
pub mod transcode;
pub mod trim;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use engine::{AudioSettings, FfmpegEngine, MediaEngine, VideoCodecs};
pub use error::{ExportError, FfmpegError, ProbeError, Result};
pub use export::{CancelToken, ExportEvent, ExportHandle, ExportObserver, ExportSummary, Exporter};
pub use ffmpeg_utils::context::probe_source;
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use session::EditorSession;
pub use types::{CropRect, ExportJob, ExportMode, PixelRect, SourceMedia, TimeRange};
