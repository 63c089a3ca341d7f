//! Cross-module tests
//!
//! - `fake`: a scripted [`MediaEngine`](crate::engine::MediaEngine) for
//!   pipeline ordering, progress and error tests
//! - `fixtures`: synthetic media written with the FFmpeg engine's own
//!   encoders
//! - `pipeline`: export pipeline and exporter behaviour against the fake
//! - `ffmpeg_export`: end-to-end exports of synthetic sources

pub mod fake;
