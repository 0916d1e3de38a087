//! Terminal feedback for batch phases.
//!
//! Interactive runs draw indicatif bars on stderr. With `--log-only` the bars
//! are hidden and each phase emits a `tracing` line every `LOG_INTERVAL`
//! files instead, which reads better in a captured log.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Files between two progress lines in log-only mode.
pub const LOG_INTERVAL: u64 = 100;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// `1.5s` under a minute, `2.3m` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

fn progress_bar(len: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() || len == 0 {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(phase.to_string());
    pb
}

fn log_line(phase: &str, current: u64, total: u64) {
    if is_log_only() && total > 0 && (current % LOG_INTERVAL == 0 || current == total) {
        let pct = 100.0 * current as f64 / total as f64;
        tracing::info!(phase, current, total, "{:.1}%", pct);
    }
}

/// Counts files through one phase of a run. `tick` may be called from rayon
/// workers.
pub struct PhaseProgress {
    phase: &'static str,
    bar: ProgressBar,
    done: AtomicU64,
    total: u64,
}

impl PhaseProgress {
    pub fn start(phase: &'static str, total: u64) -> Self {
        Self {
            phase,
            bar: progress_bar(total, phase),
            done: AtomicU64::new(0),
            total,
        }
    }

    pub fn tick(&self) {
        self.bar.inc(1);
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        log_line(self.phase, n, self.total);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

/// Spinner for the directory scan, whose size is unknown up front.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_spinner()
            .template("{msg} {spinner} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}
