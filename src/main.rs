//! SolCutter
//!
//! Cuts a time range out of a video, optionally crops it, and exports the
//! result as MP4 or extracts the audio track. Also carries a small
//! boolean-blind enumeration probe for authorised database testing.

mod cli;
mod config;
mod config_file;
mod console;
mod error;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solcutter_lib::probe::{self, HttpOracle, StopReason};
use solcutter_lib::selection::{Button, Point, PointerEvent};
use solcutter_lib::session::default_output_name;
use solcutter_lib::{EditorSession, ExportMode, Exporter, FfmpegEngine};

use crate::cli::{Cli, Command, ConfigAction, ExportArgs, ProbeArgs};
use crate::config::AppConfig;
use crate::console::ConsoleObserver;
use crate::error::{CliError, Result};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "solcutter";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config_file::load_or_default(&cli.config);

    init_logging(&config, cli.verbose);
    tracing::debug!("{} v{} starting", APP_NAME, VERSION);
    tracing::debug!("Configuration loaded: {:?}", config);

    match cli.command {
        Command::Info { file } => info(&file),
        Command::Export(args) => export(&config, args).await,
        Command::Probe(args) => run_probe(&config, args).await,
        Command::Config {
            action: ConfigAction::Init { path },
        } => {
            config_file::generate_default_config(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Initialize logging with tracing
fn init_logging(config: &AppConfig, verbose: bool) {
    let default_filter = if verbose {
        "solcutter=debug,solcutter_lib=debug,ffmpeg=info".to_string()
    } else {
        config.log_filter()
    };
    let json = config.json_logs();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn init_ffmpeg() -> Result<()> {
    solcutter_lib::init()?;
    solcutter_lib::install_log_filter();
    tracing::debug!("FFmpeg version: {}", solcutter_lib::ffmpeg_version_info());
    Ok(())
}

fn info(file: &std::path::Path) -> Result<()> {
    init_ffmpeg()?;
    let media = solcutter_lib::probe_source(file)?;
    println!("File:     {}", media.path.display());
    println!(
        "Duration: {} ({:.3}s)",
        solcutter_lib::trim::format_time((media.duration_secs * 1000.0) as u64),
        media.duration_secs
    );
    println!("Size:     {}x{}", media.width, media.height);
    println!("Rate:     {:.3} fps", media.frame_rate);
    println!("Audio:    {}", if media.has_audio { "yes" } else { "no" });
    Ok(())
}

async fn export(config: &AppConfig, args: ExportArgs) -> Result<()> {
    init_ffmpeg()?;
    let mode = ExportMode::from(args.mode);

    let engine = FfmpegEngine::new(config.export.audio_settings());
    let exporter = Exporter::new(engine, config.export.video_codecs());
    let (view_w, view_h) = (config.export.view_width, config.export.view_height);
    let mut session = EditorSession::new(exporter, view_w, view_h);

    session.load(&args.file)?;
    session.seek(args.start);
    session.mark_start();
    if let Some(end) = args.end {
        session.seek(end);
        session.mark_end();
    }

    if let Some(crop) = args.crop {
        if mode == ExportMode::Audio {
            tracing::warn!("--crop is ignored for audio exports");
        } else {
            crop.validate()?;
            session.set_crop_mode(true);
            let from = Point::new(crop.x * view_w, crop.y * view_h);
            let to = Point::new((crop.x + crop.width) * view_w, (crop.y + crop.height) * view_h);
            session.handle_pointer(PointerEvent::Down(Button::Primary, from));
            session.handle_pointer(PointerEvent::Move(to));
            session.handle_pointer(PointerEvent::Up(Button::Primary, to));
            if session.crop_selector().normalized_rect().is_none() {
                return Err(CliError::Usage(format!(
                    "crop {} is smaller than the minimum selection",
                    crop
                )));
            }
        }
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_output_name(mode)));
    println!("{}  [{}]", session.status(), session.trim_label());

    let handle = session.start_export(mode, output)?;
    let cancel = handle.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling export");
            cancel.cancel();
        }
    });

    let outcome = {
        let mut observer = ConsoleObserver::new(&mut session);
        handle.observe(&mut observer).await
    };
    interrupt.abort();

    let summary = outcome?;
    match summary.dimensions {
        Some((w, h)) => println!(
            "Saved {} ({:.2}s, {}x{})",
            summary.output.display(),
            summary.duration_secs,
            w,
            h
        ),
        None => println!("Saved {} ({:.2}s)", summary.output.display(), summary.duration_secs),
    }
    Ok(())
}

async fn run_probe(config: &AppConfig, args: ProbeArgs) -> Result<()> {
    let mut probe_config = config.probe.clone();
    if let Some(url) = args.url {
        probe_config.url = url;
    }
    if let Some(cookie) = args.cookie {
        probe_config.cookie = Some(cookie);
    }
    if let Some(row) = args.row {
        probe_config.row = row;
    }
    if let Some(prefix) = args.prefix {
        probe_config.prefix = prefix;
    }
    if let Some(charset) = args.charset {
        probe_config.charset = charset;
    }
    if let Some(marker) = args.marker {
        probe_config.marker = marker;
    }
    if let Some(max_length) = args.max_length {
        probe_config.max_length = max_length;
    }

    let oracle = HttpOracle::new(probe_config.target())?;
    println!("[*] Enumerating row {} of {}", probe_config.row, probe_config.url);
    let outcome = probe::enumerate(&oracle, &probe_config.settings()).await?;

    match outcome.stop {
        StopReason::Exhausted => {
            println!("[*] Complete after {} queries: {}", outcome.queries, outcome.found);
            Ok(())
        }
        StopReason::LengthCap => {
            println!(
                "[*] Stopped at the {} character cap: {}",
                probe_config.max_length, outcome.found
            );
            Ok(())
        }
        StopReason::Aborted(e) => {
            println!("[!] Aborted, partial result: {}", outcome.found);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
