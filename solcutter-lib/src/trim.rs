//! Trim in/out marks taken from the playback position

use crate::types::TimeRange;

/// Label shown for an unset out point
pub const END_LABEL: &str = "end";

/// In/out points in seconds; an out point of 0 means "until the end"
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrimMarks {
    start_secs: f64,
    end_secs: f64,
}

impl TrimMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the in point at a playback position in milliseconds.
    pub fn set_start(&mut self, position_ms: u64) {
        self.start_secs = position_ms as f64 / 1000.0;
        tracing::debug!(start = self.start_secs, "trim start set");
    }

    /// Mark the out point at a playback position in milliseconds.
    pub fn set_end(&mut self, position_ms: u64) {
        self.end_secs = position_ms as f64 / 1000.0;
        tracing::debug!(end = self.end_secs, "trim end set");
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn start_secs(&self) -> f64 {
        self.start_secs
    }

    pub fn end_secs(&self) -> f64 {
        self.end_secs
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_secs, self.end_secs)
    }

    /// `"mm:ss ~ mm:ss"`, with [`END_LABEL`] for an unset out point.
    pub fn label(&self) -> String {
        let start = format_time(secs_to_ms(self.start_secs));
        let end = if self.end_secs > 0.0 {
            format_time(secs_to_ms(self.end_secs))
        } else {
            END_LABEL.to_string()
        };
        format!("{} ~ {}", start, end)
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0) as u64
}

/// Format milliseconds as `mm:ss`, or `hh:mm:ss` from one hour on.
pub fn format_time(ms: u64) -> String {
    let seconds = (ms / 1000) % 60;
    let minutes = (ms / 60_000) % 60;
    let hours = ms / 3_600_000;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(999), "00:00");
        assert_eq!(format_time(61_500), "01:01");
        assert_eq!(format_time(3_599_999), "59:59");
        assert_eq!(format_time(3_600_000), "01:00:00");
        assert_eq!(format_time(36_061_000), "10:01:01");
    }

    #[test]
    fn test_marks_from_position() {
        let mut marks = TrimMarks::new();
        marks.set_start(10_000);
        marks.set_end(40_500);
        assert_eq!(marks.range(), TimeRange::new(10.0, 40.5));
        assert_eq!(marks.label(), "00:10 ~ 00:40");
    }

    #[test]
    fn test_unset_end_label() {
        let mut marks = TrimMarks::new();
        marks.set_start(75_000);
        assert_eq!(marks.label(), "01:15 ~ end");
        assert_eq!(marks.range().end_secs, 0.0);
    }

    #[test]
    fn test_reset() {
        let mut marks = TrimMarks::new();
        marks.set_start(1_000);
        marks.set_end(2_000);
        marks.reset();
        assert_eq!(marks, TrimMarks::default());
        assert_eq!(marks.label(), "00:00 ~ end");
    }
}
