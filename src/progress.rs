//! 端末向け進捗表示（indicatif）

use crate::orchestrator::{ProgressReporter, RunSummary, TargetOutcome, TargetState};
use indicatif::{ProgressBar, ProgressStyle};

pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn target_started(&self, label: &str, name: &str, _current: usize, _total: usize) {
        self.bar.set_message(format!("{} {}", label, name));
    }

    fn target_finished(&self, outcome: &TargetOutcome) {
        let line = match &outcome.state {
            TargetState::Written(_) => format!("  ✔ {} {} 已寫入", outcome.label, outcome.name),
            TargetState::PendingReview(status) => {
                format!("  📷 {} {} 照片候補を記録 ({})", outcome.label, outcome.name, status)
            }
            TargetState::Failed(reason) => format!("  ✘ {} {} {}", outcome.label, outcome.name, reason),
            TargetState::Skipped(reason) => format!("  - {} {} 略過: {}", outcome.label, outcome.name, reason),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
