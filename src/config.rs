//! Runtime configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use solcutter_lib::probe::http::{DEFAULT_MARKER, DEFAULT_PAYLOAD, DEFAULT_ROW, DEFAULT_USER_AGENT};
use solcutter_lib::probe::{HttpTarget, ProbeSettings, DEFAULT_CHARSET, DEFAULT_MAX_LENGTH, DEFAULT_PREFIX};
use solcutter_lib::{AudioSettings, VideoCodecs};

/// Export encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Video encoder name; falls back to the default H.264 encoder
    pub video_codec: String,

    /// Audio encoder name for video exports
    pub audio_codec: String,

    /// x264 constant rate factor (0-51, lower is better)
    pub crf: u32,

    /// x264 speed preset
    pub preset: String,

    /// Audio bitrate of video exports in bps
    pub video_audio_bitrate: u64,

    /// Sample rate of audio-only exports
    pub audio_sample_rate: u32,

    /// Bitrate of audio-only exports in bps
    pub audio_bitrate: u64,

    /// Width of the preview area crop selections are made in
    pub view_width: f64,

    /// Height of the preview area crop selections are made in
    pub view_height: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let codecs = VideoCodecs::default();
        let audio = AudioSettings::default();
        Self {
            video_codec: codecs.video,
            audio_codec: codecs.audio,
            crf: codecs.crf,
            preset: codecs.preset,
            video_audio_bitrate: codecs.audio_bitrate,
            audio_sample_rate: audio.sample_rate,
            audio_bitrate: audio.bitrate,
            view_width: 1280.0,
            view_height: 720.0,
        }
    }
}

impl ExportConfig {
    pub fn video_codecs(&self) -> VideoCodecs {
        VideoCodecs {
            video: self.video_codec.clone(),
            audio: self.audio_codec.clone(),
            crf: self.crf,
            preset: self.preset.clone(),
            audio_bitrate: self.video_audio_bitrate,
        }
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            sample_rate: self.audio_sample_rate,
            bitrate: self.audio_bitrate,
        }
    }
}

/// Enumeration probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Search endpoint
    pub url: String,

    /// Session cookie sent with every request
    pub cookie: Option<String>,

    pub user_agent: String,

    /// Row of the identifier in the enumerated listing
    pub row: u32,

    /// Characters already known
    pub prefix: String,

    pub charset: String,

    /// Text whose presence means "true"
    pub marker: String,

    /// Condition template with `{row}` and `{prefix}` placeholders
    pub payload: String,

    pub max_length: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cookie: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            row: DEFAULT_ROW,
            prefix: DEFAULT_PREFIX.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            payload: DEFAULT_PAYLOAD.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            timeout_secs: 30,
        }
    }
}

impl ProbeConfig {
    pub fn target(&self) -> HttpTarget {
        HttpTarget {
            url: self.url.clone(),
            cookie: self.cookie.clone(),
            user_agent: self.user_agent.clone(),
            row: self.row,
            marker: self.marker.clone(),
            payload_template: self.payload.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn settings(&self) -> ProbeSettings {
        ProbeSettings {
            prefix: self.prefix.clone(),
            charset: self.charset.clone(),
            max_length: self.max_length,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub export: ExportConfig,

    pub probe: ProbeConfig,

    /// Log filter directives, e.g. `info` or `solcutter=debug`
    pub log_level: String,

    /// `pretty` or `json`
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            export: ExportConfig::default(),
            probe: ProbeConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> String {
        if self.log_level.contains('=') {
            self.log_level.clone()
        } else {
            format!("solcutter={0},solcutter_lib={0},ffmpeg=warn", self.log_level)
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
