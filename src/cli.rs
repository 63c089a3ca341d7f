//! Command-line interface definition
//!
//! Uses clap's derive API. Values given on the command line override the
//! configuration file.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use solcutter_lib::{CropRect, ExportMode};

/// Trim, crop and export video clips, or extract their audio.
#[derive(Parser, Debug)]
#[command(name = "solcutter", version, about)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "solcutter.toml")]
    pub config: PathBuf,

    /// Enable debug logging (overrides the configured level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show duration, frame size and audio presence of a video
    Info {
        file: PathBuf,
    },

    /// Export a trimmed and optionally cropped video, or its audio
    Export(ExportArgs),

    /// Recover an identifier through a boolean-blind search endpoint
    Probe(ProbeArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Source video
    pub file: PathBuf,

    /// Output file; defaults to output.mp4 or YYYYMMDD_1.mp3
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// In point, seconds or [hh:]mm:ss
    #[arg(long, value_parser = parse_time_ms, default_value = "0")]
    pub start: u64,

    /// Out point, seconds or [hh:]mm:ss; omitted means the end of the video
    #[arg(long, value_parser = parse_time_ms)]
    pub end: Option<u64>,

    /// Crop rectangle as normalized x,y,width,height, e.g. 0.25,0.25,0.5,0.5
    #[arg(long)]
    pub crop: Option<CropRect>,

    #[arg(long, value_enum, default_value_t = Mode::Video)]
    pub mode: Mode,
}

#[derive(clap::Args, Debug, Default)]
pub struct ProbeArgs {
    /// Search endpoint
    #[arg(long)]
    pub url: Option<String>,

    /// Session cookie, e.g. JSESSIONID=...
    #[arg(long)]
    pub cookie: Option<String>,

    /// Row of the identifier in the enumerated listing
    #[arg(long)]
    pub row: Option<u32>,

    /// Characters already known
    #[arg(long)]
    pub prefix: Option<String>,

    /// Candidate characters, in the order they are tried
    #[arg(long)]
    pub charset: Option<String>,

    /// Text that marks a true condition
    #[arg(long)]
    pub marker: Option<String>,

    #[arg(long)]
    pub max_length: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a configuration file with every default spelled out
    Init {
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Re-encoded MP4
    Video,
    /// Audio track only
    Audio,
}

impl From<Mode> for ExportMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Video => ExportMode::Video,
            Mode::Audio => ExportMode::Audio,
        }
    }
}

/// Parse `90`, `1.5`, `01:30` or `1:02:03` into milliseconds.
pub fn parse_time_ms(s: &str) -> Result<u64, String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(format!("invalid time {:?}", s));
    }
    let mut secs = 0.0;
    for part in &parts {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("invalid time component {:?} in {:?}", part, s))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("invalid time {:?}", s));
        }
        secs = secs * 60.0 + value;
    }
    Ok((secs * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_ms() {
        assert_eq!(parse_time_ms("0"), Ok(0));
        assert_eq!(parse_time_ms("1.5"), Ok(1_500));
        assert_eq!(parse_time_ms("01:30"), Ok(90_000));
        assert_eq!(parse_time_ms("1:02:03"), Ok(3_723_000));
        assert!(parse_time_ms("1::2").is_err());
        assert!(parse_time_ms("-3").is_err());
        assert!(parse_time_ms("abc").is_err());
    }

    #[test]
    fn test_export_args() {
        let cli = Cli::try_parse_from([
            "solcutter", "export", "in.mp4", "--start", "10", "--end", "00:40", "--crop",
            "0.25,0.25,0.5,0.5",
        ])
        .unwrap();
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.start, 10_000);
                assert_eq!(args.end, Some(40_000));
                assert_eq!(args.crop, Some(CropRect::new(0.25, 0.25, 0.5, 0.5)));
                assert_eq!(args.mode, Mode::Video);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["solcutter", "info", "a.mp4", "-v", "--config", "x.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
