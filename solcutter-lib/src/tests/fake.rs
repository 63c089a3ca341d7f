//! Scripted media engine

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{Bar, BarAttribute, Clip, MediaEngine, ProgressSink, VideoCodecs};
use crate::error::{ExportError, Result};
use crate::export::CancelToken;
use crate::types::{PixelRect, SourceMedia};

/// One encode call the engine received
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeCall {
    pub audio_only: bool,
    pub start_secs: f64,
    pub end_secs: f64,
    pub size: (u32, u32),
    pub crop: Option<PixelRect>,
    pub output: PathBuf,
}

/// Engine that reports a fixed number of progress steps and writes a stub
/// output file.
///
/// Sources are 1920x1080 at 30 fps. Index updates are replayed as scripted,
/// including values past the total and going backwards, to exercise the
/// progress clamping. Video frames are reported at even dimensions, as
/// x264 writes them.
#[derive(Clone)]
pub struct ScriptedEngine {
    duration_secs: f64,
    has_audio: bool,
    indices: Vec<u64>,
    total: u64,
    step_delay: Option<Duration>,
    fail_at_step: Option<usize>,
    cancel_when_done: Option<CancelToken>,
    calls: Arc<Mutex<Vec<EncodeCall>>>,
}

impl ScriptedEngine {
    pub fn new(duration_secs: f64, has_audio: bool) -> Self {
        Self {
            duration_secs,
            has_audio,
            indices: (0..=10).collect(),
            total: 10,
            step_delay: None,
            fail_at_step: None,
            cancel_when_done: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replay these `Index` values against `total`.
    pub fn with_script(mut self, total: u64, indices: Vec<u64>) -> Self {
        self.total = total;
        self.indices = indices;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Fail with an encode error after this many steps.
    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at_step = Some(step);
        self
    }

    /// Cancel `token` after the last step, just before returning success.
    pub fn cancelling_when_done(mut self, token: CancelToken) -> Self {
        self.cancel_when_done = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<EncodeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn run(&self, clip: &Clip, output: &Path, audio_only: bool, progress: &mut dyn ProgressSink) -> Result<()> {
        self.calls.lock().unwrap().push(EncodeCall {
            audio_only,
            start_secs: clip.start_secs(),
            end_secs: clip.end_secs(),
            size: clip.size(),
            crop: clip.crop_rect(),
            output: output.to_path_buf(),
        });
        std::fs::write(output, b"partial")?;

        progress.bars_callback(Bar::Time, BarAttribute::Total, self.total, None);
        let mut old = None;
        for (step, index) in self.indices.iter().enumerate() {
            if progress.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            if self.fail_at_step == Some(step) {
                return Err(ExportError::Encode("scripted failure".into()));
            }
            progress.bars_callback(Bar::Packets, BarAttribute::Index, step as u64, None);
            progress.bars_callback(Bar::Time, BarAttribute::Index, *index, old);
            old = Some(*index);
            if let Some(delay) = self.step_delay {
                std::thread::sleep(delay);
            }
        }
        std::fs::write(output, b"complete")?;
        if let Some(token) = &self.cancel_when_done {
            token.cancel();
        }
        Ok(())
    }
}

impl MediaEngine for ScriptedEngine {
    fn open(&self, path: &Path) -> Result<SourceMedia> {
        if path.to_string_lossy().contains("missing") {
            return Err(ExportError::Open {
                path: path.to_path_buf(),
                reason: "No such file or directory".into(),
            });
        }
        Ok(SourceMedia {
            path: path.to_path_buf(),
            duration_secs: self.duration_secs,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            has_audio: self.has_audio,
        })
    }

    fn encode_audio(&self, clip: &Clip, output: &Path, progress: &mut dyn ProgressSink) -> Result<()> {
        self.run(clip, output, true, progress)
    }

    fn encode_video(
        &self,
        clip: &Clip,
        output: &Path,
        _codecs: &VideoCodecs,
        progress: &mut dyn ProgressSink,
    ) -> Result<(u32, u32)> {
        self.run(clip, output, false, progress)?;
        let (width, height) = clip.size();
        Ok((width & !1, height & !1))
    }
}
