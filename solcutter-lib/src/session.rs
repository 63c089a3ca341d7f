//! Editor session: the state behind the editing window
//!
//! Holds the loaded source, the playback position, the trim marks and the
//! crop overlay, and turns them into an [`ExportJob`] when the user asks for
//! an export. While an export runs the session is locked: loading, crop
//! toggling and pointer input are refused until the job finishes.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::engine::MediaEngine;
use crate::error::{ExportError, Result};
use crate::export::pipeline::failure_status;
use crate::export::{ExportHandle, ExportObserver, ExportSummary, Exporter};
use crate::selection::{CropSelector, PointerEvent};
use crate::trim::TrimMarks;
use crate::types::{ExportJob, ExportMode, SourceMedia};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_CROP_HINT: &str = "Drag over the picture to select the area to keep.";

/// Default file name offered for an export started on `date`.
///
/// Video exports default to `output.mp4`; audio exports to `YYYYMMDD_1.mp3`.
pub fn default_output_name_on(mode: ExportMode, date: NaiveDate) -> String {
    match mode {
        ExportMode::Video => "output.mp4".to_string(),
        ExportMode::Audio => format!("{}_1.mp3", date.format("%Y%m%d")),
    }
}

/// Default file name for an export started today, in local time.
pub fn default_output_name(mode: ExportMode) -> String {
    default_output_name_on(mode, chrono::Local::now().date_naive())
}

pub struct EditorSession<E: MediaEngine> {
    exporter: Exporter<E>,
    source: Option<SourceMedia>,
    position_ms: u64,
    trim: TrimMarks,
    selector: CropSelector,
    status: String,
    progress: u8,
}

impl<E: MediaEngine> EditorSession<E> {
    /// New session whose preview area is `view_width` x `view_height` pixels.
    pub fn new(exporter: Exporter<E>, view_width: f64, view_height: f64) -> Self {
        Self {
            exporter,
            source: None,
            position_ms: 0,
            trim: TrimMarks::new(),
            selector: CropSelector::new(view_width, view_height),
            status: STATUS_READY.to_string(),
            progress: 0,
        }
    }

    /// Open `path` and make it the current source.
    ///
    /// Trim marks, position and crop mode start over for the new file.
    pub fn load(&mut self, path: &Path) -> Result<&SourceMedia> {
        if self.is_locked() {
            return Err(ExportError::Busy);
        }
        let source = self.exporter.engine().open(path)?;
        tracing::info!(
            path = ?path,
            duration = source.duration_secs,
            width = source.width,
            height = source.height,
            "source loaded"
        );

        self.position_ms = 0;
        self.trim.reset();
        self.selector.set_enabled(false);
        self.progress = 0;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.status = format!("File: {}", name);
        Ok(&*self.source.insert(source))
    }

    pub fn source(&self) -> Option<&SourceMedia> {
        self.source.as_ref()
    }

    pub fn duration_ms(&self) -> u64 {
        self.source
            .as_ref()
            .map_or(0, |s| (s.duration_secs * 1000.0) as u64)
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    /// Move the playback position, clamped to the source duration.
    pub fn seek(&mut self, position_ms: u64) {
        self.position_ms = position_ms.min(self.duration_ms());
    }

    pub fn mark_start(&mut self) {
        self.trim.set_start(self.position_ms);
    }

    pub fn mark_end(&mut self) {
        self.trim.set_end(self.position_ms);
    }

    pub fn reset_trim(&mut self) {
        self.trim.reset();
    }

    pub fn trim(&self) -> &TrimMarks {
        &self.trim
    }

    pub fn trim_label(&self) -> String {
        self.trim.label()
    }

    /// Toggle the crop overlay. Needs a loaded source and no running export.
    pub fn set_crop_mode(&mut self, enabled: bool) {
        if self.source.is_none() || self.is_locked() {
            return;
        }
        self.selector.set_enabled(enabled);
        self.status = if enabled {
            STATUS_CROP_HINT.to_string()
        } else {
            STATUS_READY.to_string()
        };
    }

    pub fn crop_selector(&self) -> &CropSelector {
        &self.selector
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !self.is_locked() {
            self.selector.handle(event);
        }
    }

    /// True while an export is running
    pub fn is_locked(&self) -> bool {
        self.exporter.is_busy()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Snapshot the current edit state into a job writing to `output`.
    ///
    /// The crop only applies to video exports.
    pub fn job(&self, mode: ExportMode, output: PathBuf) -> Result<ExportJob> {
        let source = self.source.as_ref().ok_or(ExportError::NoSource)?;
        let crop = match mode {
            ExportMode::Video => self.selector.normalized_rect(),
            ExportMode::Audio => None,
        };
        Ok(ExportJob {
            source: source.path.clone(),
            range: self.trim.range(),
            crop,
            output,
            mode,
        })
    }

    /// Start exporting the current edit to `output`.
    pub fn start_export(&mut self, mode: ExportMode, output: PathBuf) -> Result<ExportHandle> {
        let job = self.job(mode, output)?;
        tracing::debug!(?job, "starting export");
        let handle = self.exporter.start_export(job)?;
        self.progress = 0;
        Ok(handle)
    }
}

impl<E: MediaEngine> ExportObserver for EditorSession<E> {
    fn on_status(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn on_progress(&mut self, percent: u8) {
        self.progress = percent;
    }

    fn on_finished(&mut self, outcome: &std::result::Result<ExportSummary, ExportError>) {
        match outcome {
            Ok(_) => {
                self.progress = 100;
                self.status = STATUS_READY.to_string();
            }
            Err(e) => self.status = failure_status(e),
        }
    }
}
