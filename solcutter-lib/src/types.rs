//! Core data types shared by the engine, the export pipeline and the session

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Smallest normalized crop edge accepted by the pipeline.
///
/// Display-space selections are filtered at 10 pixels by the selector; this
/// bound only rejects rectangles that would crop to nothing.
pub const MIN_CROP_FRACTION: f64 = 0.001;

/// Metadata of an opened, decodable source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    /// Path the source was opened from
    pub path: PathBuf,
    /// Total duration in seconds
    pub duration_secs: f64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Average frame rate in frames per second
    pub frame_rate: f64,
    /// Whether the file carries at least one audio stream
    pub has_audio: bool,
}

/// A `[start, end)` window in seconds; `end == 0` means "until the end"
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// The whole source
    pub fn full() -> Self {
        Self::default()
    }

    /// Resolve against a source duration.
    ///
    /// Returns the effective `(start, end)` with the end clamped to the
    /// duration, or `InvalidRange` when nothing would remain.
    pub fn resolve(&self, duration_secs: f64) -> Result<(f64, f64)> {
        let start = self.start_secs;
        let requested_end = if self.end_secs > 0.0 {
            self.end_secs
        } else {
            duration_secs
        };
        let end = requested_end.min(duration_secs);

        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return Err(ExportError::InvalidRange { start, end });
        }
        Ok((start, end))
    }
}

/// A crop region normalized to `[0, 1]` relative to the displayed frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the rectangle lies inside the unit square and is not degenerate.
    pub fn validate(&self) -> Result<()> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ExportError::InvalidCrop(format!("{} has a negative component", self)));
        }
        if self.width < MIN_CROP_FRACTION || self.height < MIN_CROP_FRACTION {
            return Err(ExportError::InvalidCrop(format!("{} is too small", self)));
        }
        // Allow a little float slack from display-space normalization.
        if self.x + self.width > 1.0 + 1e-6 || self.y + self.height > 1.0 + 1e-6 {
            return Err(ExportError::InvalidCrop(format!("{} exceeds the frame", self)));
        }
        Ok(())
    }

    /// Convert to absolute pixel bounds for a `frame_width` x `frame_height` frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let w = frame_width as f64;
        let h = frame_height as f64;
        let clamp_x = |v: f64| (v.round().max(0.0) as u32).min(frame_width);
        let clamp_y = |v: f64| (v.round().max(0.0) as u32).min(frame_height);

        PixelRect {
            x1: clamp_x(self.x * w),
            y1: clamp_y(self.y * h),
            x2: clamp_x((self.x + self.width) * w),
            y2: clamp_y((self.y + self.height) * h),
        }
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.4}, {:.4}, {:.4}, {:.4})",
            self.x, self.y, self.width, self.height
        )
    }
}

impl std::str::FromStr for CropRect {
    type Err = String;

    /// Parse `x,y,w,h` with normalized components.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("invalid crop component in {:?}: {}", s, e))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(CropRect::new(*x, *y, *w, *h)),
            _ => Err(format!("expected x,y,w,h but got {:?}", s)),
        }
    }
}

/// Absolute crop bounds `[x1, x2) x [y1, y2)` in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// What the export produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Re-encoded (optionally cropped) video with audio, MP4
    #[default]
    Video,
    /// Audio track only, container chosen by the output extension
    Audio,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Video => f.write_str("video"),
            ExportMode::Audio => f.write_str("audio"),
        }
    }
}

/// One complete, immutable export request
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub source: PathBuf,
    pub range: TimeRange,
    pub crop: Option<CropRect>,
    pub output: PathBuf,
    pub mode: ExportMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_resolves_unset_end_to_duration() {
        assert_eq!(TimeRange::new(0.0, 0.0).resolve(120.0).unwrap(), (0.0, 120.0));
    }

    #[test]
    fn test_range_end_clamped_to_duration() {
        assert_eq!(TimeRange::new(10.0, 500.0).resolve(120.0).unwrap(), (10.0, 120.0));
    }

    #[test]
    fn test_range_start_past_end_is_invalid() {
        let err = TimeRange::new(40.0, 10.0).resolve(120.0).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRange { .. }));

        let err = TimeRange::new(130.0, 0.0).resolve(120.0).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRange { .. }));
    }

    #[test]
    fn test_range_negative_start_is_invalid() {
        assert!(TimeRange::new(-1.0, 5.0).resolve(120.0).is_err());
    }

    #[test]
    fn test_crop_to_pixels_full_hd_center() {
        let rect = CropRect::new(0.25, 0.25, 0.5, 0.5).to_pixels(1920, 1080);
        assert_eq!(rect, PixelRect { x1: 480, y1: 270, x2: 1440, y2: 810 });
        assert_eq!((rect.width(), rect.height()), (960, 540));
    }

    #[test]
    fn test_crop_to_pixels_rounds() {
        // 0.3333 * 100 = 33.33 -> 33, (0.3333 + 0.3333) * 100 = 66.66 -> 67
        let rect = CropRect::new(0.3333, 0.0, 0.3333, 1.0).to_pixels(100, 50);
        assert_eq!((rect.x1, rect.x2), (33, 67));
        assert_eq!((rect.y1, rect.y2), (0, 50));
    }

    #[test]
    fn test_crop_validate() {
        assert!(CropRect::new(0.1, 0.1, 0.5, 0.5).validate().is_ok());
        assert!(CropRect::new(0.6, 0.1, 0.5, 0.5).validate().is_err());
        assert!(CropRect::new(0.1, 0.1, 0.0, 0.5).validate().is_err());
        assert!(CropRect::new(-0.1, 0.1, 0.5, 0.5).validate().is_err());
    }

    #[test]
    fn test_crop_from_str() {
        let rect: CropRect = "0.25, 0.25,0.5,0.5".parse().unwrap();
        assert_eq!(rect, CropRect::new(0.25, 0.25, 0.5, 0.5));
        assert!("0.1,0.2,0.3".parse::<CropRect>().is_err());
        assert!("a,b,c,d".parse::<CropRect>().is_err());
    }
}
