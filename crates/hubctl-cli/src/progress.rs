//! Terminal progress for provisioning runs

use console::style;
use hubctl_cloud::{ProgressObserver, StepOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Spinner with one summary line per finished step
pub struct StepProgress {
    bar: ProgressBar,
    action: &'static str,
    started: Instant,
    failed: usize,
}

impl StepProgress {
    pub fn new(action: &'static str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            bar,
            action,
            started: Instant::now(),
            failed: 0,
        }
    }
}

impl ProgressObserver for StepProgress {
    fn begin(&mut self, _cluster: &str, steps: usize) {
        self.bar.set_length(steps as u64);
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn step_started(&mut self, _step: &str, stack: &str) {
        self.bar
            .set_message(format!("{} {}", self.action, style(stack).cyan()));
    }

    fn step_finished(&mut self, step: &str, stack: &str, outcome: &StepOutcome) {
        let symbol = match outcome {
            StepOutcome::Created | StepOutcome::Deleted => style("✓").green(),
            StepOutcome::Skipped | StepOutcome::AlreadyAbsent => style("⊘").dim(),
            StepOutcome::Failed(_) => style("✗").red(),
        };
        if outcome.is_failure() {
            self.failed += 1;
        }
        // suspend keeps the line visible when the bar is hidden (no tty)
        self.bar.suspend(|| {
            println!(
                "  {} {:<14} {} {}",
                symbol,
                step,
                stack,
                style(format!("({})", outcome)).dim()
            );
        });
        self.bar.inc(1);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
        tracing::debug!(
            "{} finished in {:.1}s, {} failed step(s)",
            self.action,
            self.started.elapsed().as_secs_f64(),
            self.failed
        );
    }
}
