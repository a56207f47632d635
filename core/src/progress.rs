use indicatif::{ProgressBar, ProgressStyle};

/// Textual progress counter for a run.
///
/// Hidden when disabled (quiet mode, structured output, tests) so callers
/// never need to branch.
pub struct ProgressCounter {
    bar: ProgressBar,
    enabled: bool,
}

impl ProgressCounter {
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                enabled: false,
            };
        }

        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {pos}/{len} actions {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar, enabled: true }
    }

    pub fn tick(&self, status: &str) {
        if self.enabled {
            self.bar.set_message(status.to_string());
            self.bar.inc(1);
        }
    }

    pub fn finish(&self, success: bool) {
        if self.enabled {
            if success {
                self.bar.finish_with_message("done");
            } else {
                self.bar.abandon_with_message("failed");
            }
        }
    }
}
