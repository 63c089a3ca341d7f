//! Media engine abstraction
//!
//! The export pipeline never touches decoders or encoders directly. It asks a
//! [`MediaEngine`] to open a source, describes the wanted slice and crop as a
//! [`Clip`], and hands the clip to one of the two encode operations. The
//! engine reports encoding progress through a [`ProgressSink`].

pub mod ffmpeg;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::types::{PixelRect, SourceMedia};

pub use self::ffmpeg::FfmpegEngine;

/// Progress bars an engine maintains while encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bar {
    /// Output time axis; its `Index` counts encoded frames
    Time,
    /// Input packets read from the source
    Packets,
}

/// Attribute of a bar that changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarAttribute {
    Index,
    Total,
}

/// Receiver of engine progress callbacks
pub trait ProgressSink {
    /// Called whenever `attribute` of `bar` changes from `old_value` to `value`.
    fn bars_callback(&mut self, bar: Bar, attribute: BarAttribute, value: u64, old_value: Option<u64>);

    /// Polled between packets; returning true makes the engine abort with
    /// `ExportError::Cancelled`.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Encoder choices for video exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCodecs {
    /// Video encoder name, e.g. `libx264`
    pub video: String,
    /// Audio encoder name, e.g. `aac`
    pub audio: String,
    /// Constant rate factor for x264-family encoders
    pub crf: u32,
    /// Encoder speed preset for x264-family encoders
    pub preset: String,
    /// Audio bitrate in bps
    pub audio_bitrate: u64,
}

impl Default for VideoCodecs {
    fn default() -> Self {
        Self {
            video: "libx264".to_string(),
            audio: "aac".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            audio_bitrate: 128_000,
        }
    }
}

/// Settings for audio-only exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Audio bitrate in bps
    pub bitrate: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bitrate: 192_000,
        }
    }
}

/// A lazily described sub-range of a source, optionally cropped
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    source: SourceMedia,
    start_secs: f64,
    end_secs: f64,
    crop: Option<PixelRect>,
}

impl Clip {
    /// Describe `[start_secs, end_secs)` of `source`.
    pub fn slice(source: &SourceMedia, start_secs: f64, end_secs: f64) -> Result<Self> {
        if !(start_secs >= 0.0 && start_secs < end_secs && end_secs <= source.duration_secs) {
            return Err(ExportError::InvalidRange {
                start: start_secs,
                end: end_secs,
            });
        }
        Ok(Self {
            source: source.clone(),
            start_secs,
            end_secs,
            crop: None,
        })
    }

    /// Restrict the clip to `rect`, given in this clip's pixel space.
    pub fn crop(mut self, rect: PixelRect) -> Result<Self> {
        let (w, h) = self.size();
        if rect.is_empty() || rect.x2 > w || rect.y2 > h {
            return Err(ExportError::InvalidCrop(format!(
                "{:?} does not fit a {}x{} frame",
                rect, w, h
            )));
        }
        self.crop = Some(rect);
        Ok(self)
    }

    pub fn source(&self) -> &SourceMedia {
        &self.source
    }

    pub fn start_secs(&self) -> f64 {
        self.start_secs
    }

    pub fn end_secs(&self) -> f64 {
        self.end_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    pub fn crop_rect(&self) -> Option<PixelRect> {
        self.crop
    }

    /// Frame size of the clip as it will be encoded.
    pub fn size(&self) -> (u32, u32) {
        match self.crop {
            Some(r) => (r.width(), r.height()),
            None => (self.source.width, self.source.height),
        }
    }

    /// Expected number of video frames, used as the progress total.
    pub fn expected_frames(&self) -> u64 {
        let fps = if self.source.frame_rate > 0.0 {
            self.source.frame_rate
        } else {
            25.0
        };
        ((self.duration_secs() * fps).ceil() as u64).max(1)
    }
}

/// The operations the export pipeline needs from a media library
pub trait MediaEngine: Send + Sync + 'static {
    /// Open a source and read its metadata.
    fn open(&self, path: &Path) -> Result<SourceMedia>;

    /// Encode the clip's audio track to `output`.
    fn encode_audio(&self, clip: &Clip, output: &Path, progress: &mut dyn ProgressSink) -> Result<()>;

    /// Re-encode the clip's video and audio to `output`.
    ///
    /// Returns the frame size written, which may be smaller than
    /// [`Clip::size`] when the encoder needs even dimensions.
    fn encode_video(
        &self,
        clip: &Clip,
        output: &Path,
        codecs: &VideoCodecs,
        progress: &mut dyn ProgressSink,
    ) -> Result<(u32, u32)>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source() -> SourceMedia {
        SourceMedia {
            path: PathBuf::from("in.mp4"),
            duration_secs: 120.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            has_audio: true,
        }
    }

    #[test]
    fn test_slice_keeps_dimensions() {
        let clip = Clip::slice(&source(), 10.0, 40.0).unwrap();
        assert_eq!(clip.size(), (1920, 1080));
        assert_eq!(clip.duration_secs(), 30.0);
        assert_eq!(clip.expected_frames(), 900);
    }

    #[test]
    fn test_slice_rejects_out_of_bounds() {
        assert!(Clip::slice(&source(), 40.0, 10.0).is_err());
        assert!(Clip::slice(&source(), 0.0, 121.0).is_err());
    }

    #[test]
    fn test_crop_changes_size() {
        let rect = PixelRect { x1: 480, y1: 270, x2: 1440, y2: 810 };
        let clip = Clip::slice(&source(), 0.0, 5.0).unwrap().crop(rect).unwrap();
        assert_eq!(clip.size(), (960, 540));
    }

    #[test]
    fn test_crop_outside_frame_rejected() {
        let rect = PixelRect { x1: 0, y1: 0, x2: 2000, y2: 100 };
        assert!(Clip::slice(&source(), 0.0, 5.0).unwrap().crop(rect).is_err());
    }
}
