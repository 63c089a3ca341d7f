//! FFmpeg input context wrapper and source metadata probing

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::input;

use crate::error::{ExportError, FfmpegError, Result};
use crate::types::SourceMedia;

use super::utils::{rational_to_f64, secs_to_ts, ts_to_secs};

/// FFmpeg's internal time base, in which container-level times are stored
fn av_time_base() -> ffmpeg::Rational {
    ffmpeg::Rational::new(1, ffmpeg::ffi::AV_TIME_BASE as i32)
}

/// Wrapper for FFmpeg input context
pub struct InputContext {
    inner: ffmpeg::format::context::Input,
    source_path: PathBuf,
}

impl InputContext {
    /// Open a media file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = input(&path).map_err(|e| ExportError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Opened input file: {:?}", path);

        Ok(Self {
            inner,
            source_path: path.to_path_buf(),
        })
    }

    /// Get the source file path
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Duration of the container in seconds
    pub fn duration(&self) -> f64 {
        let d = self.inner.duration();
        if d <= 0 {
            return 0.0;
        }
        ts_to_secs(d, av_time_base())
    }

    /// Presentation time of the first frame in seconds.
    ///
    /// Zero for MP4 written from scratch; MPEG-TS and many capture files
    /// start later. Stream timestamps include this offset.
    pub fn start_time(&self) -> f64 {
        // SAFETY: the format context stays valid for the lifetime of `inner`.
        let t = unsafe { (*self.inner.as_ptr()).start_time };
        if t == ffmpeg::ffi::AV_NOPTS_VALUE || t <= 0 {
            return 0.0;
        }
        ts_to_secs(t, av_time_base())
    }

    pub fn inner(&self) -> &ffmpeg::format::context::Input {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut ffmpeg::format::context::Input {
        &mut self.inner
    }

    /// Find the best video stream
    pub fn best_video_stream(&self) -> Option<usize> {
        self.inner
            .streams()
            .best(ffmpeg::media::Type::Video)
            .map(|s| s.index())
    }

    /// Find the best audio stream
    pub fn best_audio_stream(&self) -> Option<usize> {
        self.inner
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .map(|s| s.index())
    }

    /// Seek so that decoding starts at or before `secs`, given on the
    /// stream time axis (that is, including [`start_time`](Self::start_time)).
    pub fn seek_to(&mut self, secs: f64) -> Result<()> {
        if secs <= 0.0 {
            return Ok(());
        }
        let ts = secs_to_ts(secs, av_time_base());
        self.inner
            .seek(ts, ..ts)
            .map_err(|e| FfmpegError::Seek(format!("seek to {:.3}s failed: {}", secs, e)))?;
        Ok(())
    }

    /// Read the metadata the export pipeline needs from the container header.
    pub fn source_media(&self) -> Result<SourceMedia> {
        let video_index = self.best_video_stream().ok_or(ExportError::NoVideoStream)?;
        let stream = self
            .inner
            .stream(video_index)
            .ok_or(ExportError::NoVideoStream)?;

        let params = stream.parameters();
        // SAFETY: the parameters pointer is valid for the lifetime of `stream`.
        let (width, height) = unsafe {
            let p = params.as_ptr();
            ((*p).width as u32, (*p).height as u32)
        };

        let mut frame_rate = rational_to_f64(stream.avg_frame_rate());
        if frame_rate <= 0.0 {
            frame_rate = rational_to_f64(stream.rate());
        }

        let mut duration_secs = self.duration();
        if duration_secs <= 0.0 {
            duration_secs = stream.duration() as f64 * rational_to_f64(stream.time_base());
        }

        Ok(SourceMedia {
            path: self.source_path.clone(),
            duration_secs: duration_secs.max(0.0),
            width,
            height,
            frame_rate,
            has_audio: self.best_audio_stream().is_some(),
        })
    }
}

/// Open `path` and read its metadata; the input is closed again on return.
pub fn probe_source<P: AsRef<Path>>(path: P) -> Result<SourceMedia> {
    let ctx = InputContext::open(path)?;
    let media = ctx.source_media()?;
    tracing::debug!(
        path = ?media.path,
        duration = media.duration_secs,
        width = media.width,
        height = media.height,
        fps = media.frame_rate,
        has_audio = media.has_audio,
        "probed source"
    );
    Ok(media)
}
