//! Terminal rendering of export progress

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use solcutter_lib::{ExportError, ExportObserver, ExportSummary};

/// Draws an export as a progress bar, then forwards every notification to
/// `inner` so the editor session stays in sync.
pub struct ConsoleObserver<'a, O: ExportObserver> {
    bar: ProgressBar,
    inner: &'a mut O,
}

impl<'a, O: ExportObserver> ConsoleObserver<'a, O> {
    pub fn new(inner: &'a mut O) -> Self {
        let bar = if std::io::stderr().is_terminal() {
            ProgressBar::new(100)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar, inner }
    }
}

impl<O: ExportObserver> ExportObserver for ConsoleObserver<'_, O> {
    fn on_status(&mut self, text: &str) {
        self.bar.set_message(text.to_string());
        self.inner.on_status(text);
    }

    fn on_progress(&mut self, percent: u8) {
        self.bar.set_position(u64::from(percent));
        self.inner.on_progress(percent);
    }

    fn on_finished(&mut self, outcome: &Result<ExportSummary, ExportError>) {
        match outcome {
            Ok(summary) => self
                .bar
                .finish_with_message(format!("Saved {}", summary.output.display())),
            Err(e) => self.bar.abandon_with_message(format!("Error: {}", e)),
        }
        self.inner.on_finished(outcome);
    }
}
