//! The export steps, run synchronously on a worker thread

use std::path::{Path, PathBuf};

use crate::engine::{Clip, MediaEngine, VideoCodecs};
use crate::error::{ExportError, Result};
use crate::types::{ExportJob, ExportMode};

use super::progress::ExportLogger;
use super::{CancelToken, ExportEvent, ExportSummary};

pub const STATUS_PREPARING: &str = "Preparing...";
pub const STATUS_EXTRACTING_AUDIO: &str = "Extracting audio...";
pub const STATUS_APPLYING_CROP: &str = "Applying crop...";
pub const STATUS_RENDERING: &str = "Rendering...";
pub const STATUS_DONE: &str = "Done!";

/// Status text shown when a job fails
pub fn failure_status(err: &ExportError) -> String {
    format!("Error: {}", err)
}

/// Run one export job to completion.
///
/// `notify` receives status and progress events in order; the terminal
/// `Finished` event is left to the caller. On failure after encoding started,
/// the partial output file is removed.
pub fn run_export<E: MediaEngine + ?Sized>(
    engine: &E,
    job: &ExportJob,
    codecs: &VideoCodecs,
    cancel: &CancelToken,
    notify: &mut dyn FnMut(ExportEvent),
) -> Result<ExportSummary> {
    let mut encode_started = false;
    let result = run_steps(engine, job, codecs, cancel, notify, &mut encode_started);

    if result.is_err() && encode_started && job.output.exists() {
        if let Err(e) = std::fs::remove_file(&job.output) {
            tracing::warn!(output = ?job.output, "failed to remove partial output: {}", e);
        } else {
            tracing::debug!(output = ?job.output, "removed partial output");
        }
    }
    result
}

fn run_steps<E: MediaEngine + ?Sized>(
    engine: &E,
    job: &ExportJob,
    codecs: &VideoCodecs,
    cancel: &CancelToken,
    notify: &mut dyn FnMut(ExportEvent),
    encode_started: &mut bool,
) -> Result<ExportSummary> {
    notify(ExportEvent::StatusChanged(STATUS_PREPARING.to_string()));

    check_output_dir(&job.output)?;
    if job.mode == ExportMode::Video {
        if let Some(crop) = &job.crop {
            crop.validate()?;
        }
    }
    cancel.check()?;

    // 1. Open the source and resolve the effective range.
    let source = engine.open(&job.source)?;
    let (start, end) = job.range.resolve(source.duration_secs)?;
    tracing::info!(
        source = ?job.source,
        duration = source.duration_secs,
        start,
        end,
        mode = %job.mode,
        "export started"
    );

    // 2. Slice.
    let mut clip = Clip::slice(&source, start, end)?;
    cancel.check()?;

    let dimensions = match job.mode {
        ExportMode::Audio => {
            if !source.has_audio {
                return Err(ExportError::MissingAudioTrack);
            }
            notify(ExportEvent::StatusChanged(STATUS_EXTRACTING_AUDIO.to_string()));
            *encode_started = true;
            let mut logger = ExportLogger::new(|p| notify(ExportEvent::ProgressChanged(p)))
                .with_cancel(cancel.clone());
            engine.encode_audio(&clip, &job.output, &mut logger)?;
            None
        }
        ExportMode::Video => {
            // 3. Crop in the sliced frame's pixel space.
            if let Some(crop) = &job.crop {
                let (w, h) = clip.size();
                let rect = crop.to_pixels(w, h);
                tracing::debug!(?crop, ?rect, "crop resolved to pixels");
                notify(ExportEvent::StatusChanged(STATUS_APPLYING_CROP.to_string()));
                clip = clip.crop(rect)?;
            }
            notify(ExportEvent::StatusChanged(STATUS_RENDERING.to_string()));
            *encode_started = true;
            let mut logger = ExportLogger::new(|p| notify(ExportEvent::ProgressChanged(p)))
                .with_cancel(cancel.clone());
            let size = engine.encode_video(&clip, &job.output, codecs, &mut logger)?;
            if size != clip.size() {
                tracing::debug!(requested = ?clip.size(), encoded = ?size, "frame size adjusted by encoder");
            }
            Some(size)
        }
    };

    // A complete output is kept even if a cancel arrived after the last packet.
    notify(ExportEvent::ProgressChanged(100));
    notify(ExportEvent::StatusChanged(STATUS_DONE.to_string()));

    let summary = ExportSummary {
        output: job.output.clone(),
        mode: job.mode,
        duration_secs: clip.duration_secs(),
        dimensions,
    };
    tracing::info!(output = ?summary.output, duration = summary.duration_secs, "export finished");
    Ok(summary)
}

fn check_output_dir(output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.is_dir() {
        return Err(ExportError::OutputDir(parent));
    }
    Ok(())
}
