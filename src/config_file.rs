//! Configuration file support
//!
//! Loads application configuration from TOML files. Every section and every
//! key is optional; missing values take the defaults of [`AppConfig`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{AppConfig, ExportConfig, ProbeConfig};
use crate::error::{CliError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Export settings
    pub export: Option<ExportSettings>,
    /// Probe settings
    pub probe: Option<ProbeFileSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub crf: Option<u32>,
    pub preset: Option<String>,
    pub video_audio_bitrate: Option<u64>,
    pub audio_sample_rate: Option<u32>,
    pub audio_bitrate: Option<u64>,
    pub view_width: Option<f64>,
    pub view_height: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeFileSettings {
    pub url: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub row: Option<u32>,
    pub prefix: Option<String>,
    pub charset: Option<String>,
    pub marker: Option<String>,
    pub payload: Option<String>,
    pub max_length: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error) or filter directives
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::Config(format!("{:?}: {}", path, e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Every setting spelled out with its default value
    pub fn default_config() -> Self {
        let defaults = AppConfig::default();
        let e = defaults.export;
        let p = defaults.probe;
        Self {
            export: Some(ExportSettings {
                video_codec: Some(e.video_codec),
                audio_codec: Some(e.audio_codec),
                crf: Some(e.crf),
                preset: Some(e.preset),
                video_audio_bitrate: Some(e.video_audio_bitrate),
                audio_sample_rate: Some(e.audio_sample_rate),
                audio_bitrate: Some(e.audio_bitrate),
                view_width: Some(e.view_width),
                view_height: Some(e.view_height),
            }),
            probe: Some(ProbeFileSettings {
                url: Some(p.url),
                cookie: None,
                user_agent: Some(p.user_agent),
                row: Some(p.row),
                prefix: Some(p.prefix),
                charset: Some(p.charset),
                marker: Some(p.marker),
                payload: Some(p.payload),
                max_length: Some(p.max_length),
                timeout_secs: Some(p.timeout_secs),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
        }
    }

    /// Convert to AppConfig, filling gaps with defaults
    pub fn into_app_config(self) -> AppConfig {
        let defaults = AppConfig::default();

        let export = match self.export {
            Some(s) => {
                let d = defaults.export;
                ExportConfig {
                    video_codec: s.video_codec.unwrap_or(d.video_codec),
                    audio_codec: s.audio_codec.unwrap_or(d.audio_codec),
                    crf: s.crf.unwrap_or(d.crf),
                    preset: s.preset.unwrap_or(d.preset),
                    video_audio_bitrate: s.video_audio_bitrate.unwrap_or(d.video_audio_bitrate),
                    audio_sample_rate: s.audio_sample_rate.unwrap_or(d.audio_sample_rate),
                    audio_bitrate: s.audio_bitrate.unwrap_or(d.audio_bitrate),
                    view_width: s.view_width.unwrap_or(d.view_width),
                    view_height: s.view_height.unwrap_or(d.view_height),
                }
            }
            None => defaults.export,
        };

        let probe = match self.probe {
            Some(s) => {
                let d = defaults.probe;
                ProbeConfig {
                    url: s.url.unwrap_or(d.url),
                    cookie: s.cookie.or(d.cookie),
                    user_agent: s.user_agent.unwrap_or(d.user_agent),
                    row: s.row.unwrap_or(d.row),
                    prefix: s.prefix.unwrap_or(d.prefix),
                    charset: s.charset.unwrap_or(d.charset),
                    marker: s.marker.unwrap_or(d.marker),
                    payload: s.payload.unwrap_or(d.payload),
                    max_length: s.max_length.unwrap_or(d.max_length),
                    timeout_secs: s.timeout_secs.unwrap_or(d.timeout_secs),
                }
            }
            None => defaults.probe,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        AppConfig {
            export,
            probe,
            log_level,
            log_format,
        }
    }
}

/// Load `path` if it exists, falling back to defaults on any problem.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    if !path.exists() {
        return AppConfig::default();
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => cf.into_app_config(),
        Err(e) => {
            // Logging is not set up yet at this point.
            eprintln!("warning: failed to load config file {:?}: {}. Using defaults.", path, e);
            AppConfig::default()
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_matches_app_defaults() {
        let config = ConfigFile::default_config().into_app_config();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = ConfigFile::default_config();

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = toml::to_string_pretty(&config).unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let loaded = ConfigFile::from_file(temp_file.path()).unwrap().into_app_config();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            "[export]\ncrf = 18\n\n[probe]\nurl = \"http://localhost/board\"\ncookie = \"JSESSIONID=abc\"\n"
        )
        .unwrap();

        let config = ConfigFile::from_file(temp_file.path()).unwrap().into_app_config();
        assert_eq!(config.export.crf, 18);
        assert_eq!(config.export.preset, "medium");
        assert_eq!(config.probe.url, "http://localhost/board");
        assert_eq!(config.probe.cookie.as_deref(), Some("JSESSIONID=abc"));
        assert_eq!(config.probe.marker, "4402");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[export\ncrf = ").unwrap();
        assert!(matches!(
            ConfigFile::from_file(temp_file.path()),
            Err(CliError::Config(_))
        ));
        assert_eq!(load_or_default(temp_file.path()), AppConfig::default());
    }

    #[test]
    fn test_generate_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solcutter.toml");

        generate_default_config(&path).unwrap();

        assert!(path.exists());
        let loaded = ConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded.export.unwrap().crf, Some(23));
    }
}
