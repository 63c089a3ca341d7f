//! Turns engine bar callbacks into percentage notifications

use std::collections::HashMap;

use crate::engine::{Bar, BarAttribute, ProgressSink};

use super::CancelToken;

/// Listens to the `Time` bar's `Index` and reports whole percentages.
///
/// Percentages are computed as `floor(index / total * 100)`, clamped to
/// `[0, 100]` and only reported when they increase, so observers always see
/// a non-decreasing sequence.
pub struct ExportLogger<F: FnMut(u8)> {
    totals: HashMap<Bar, u64>,
    last_percent: Option<u8>,
    update: F,
    cancel: Option<CancelToken>,
}

impl<F: FnMut(u8)> ExportLogger<F> {
    pub fn new(update: F) -> Self {
        Self {
            totals: HashMap::new(),
            last_percent: None,
            update,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Highest percentage reported so far
    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }
}

impl<F: FnMut(u8)> ProgressSink for ExportLogger<F> {
    fn bars_callback(&mut self, bar: Bar, attribute: BarAttribute, value: u64, _old_value: Option<u64>) {
        match attribute {
            BarAttribute::Total => {
                self.totals.insert(bar, value);
            }
            BarAttribute::Index if bar == Bar::Time => {
                let total = self.totals.get(&bar).copied().unwrap_or(0);
                if total == 0 {
                    return;
                }
                let percent = (value.saturating_mul(100) / total).min(100) as u8;
                if self.last_percent.map_or(true, |last| percent > last) {
                    self.last_percent = Some(percent);
                    (self.update)(percent);
                }
            }
            BarAttribute::Index => {}
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[(Bar, BarAttribute, u64)]) -> Vec<u8> {
        let mut seen = Vec::new();
        {
            let mut logger = ExportLogger::new(|p| seen.push(p));
            for (bar, attr, value) in events {
                logger.bars_callback(*bar, *attr, *value, None);
            }
        }
        seen
    }

    #[test]
    fn test_index_converted_to_floor_percent() {
        let seen = run(&[
            (Bar::Time, BarAttribute::Total, 3),
            (Bar::Time, BarAttribute::Index, 0),
            (Bar::Time, BarAttribute::Index, 1),
            (Bar::Time, BarAttribute::Index, 2),
            (Bar::Time, BarAttribute::Index, 3),
        ]);
        assert_eq!(seen, vec![0, 33, 66, 100]);
    }

    #[test]
    fn test_other_bars_ignored() {
        let seen = run(&[
            (Bar::Time, BarAttribute::Total, 10),
            (Bar::Packets, BarAttribute::Index, 5),
            (Bar::Time, BarAttribute::Index, 5),
        ]);
        assert_eq!(seen, vec![50]);
    }

    #[test]
    fn test_index_without_total_ignored() {
        let seen = run(&[(Bar::Time, BarAttribute::Index, 5)]);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_overshoot_clamped_and_never_decreases() {
        let seen = run(&[
            (Bar::Time, BarAttribute::Total, 10),
            (Bar::Time, BarAttribute::Index, 6),
            (Bar::Time, BarAttribute::Index, 4),
            (Bar::Time, BarAttribute::Index, 12),
            (Bar::Time, BarAttribute::Index, 13),
        ]);
        assert_eq!(seen, vec![60, 100]);
    }
}
