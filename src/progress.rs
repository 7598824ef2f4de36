//! Progress reporting utilities using indicatif.
//!
//! The scanner reports through the [`ProgressCallback`] trait; the
//! [`Progress`] struct renders those events as terminal progress bars.
//! The counting pre-pass shows a spinner (total unknown while counting),
//! the indexing pass a bar with percentage and ETA.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for scan phases.
///
/// Implement this trait to receive progress updates while a scan runs.
/// Counts reported to [`on_progress`](Self::on_progress) are
/// monotonically increasing within a phase.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "counting", "indexing")
    /// * `total` - Total number of items, 0 when not yet known
    fn on_phase_start(&self, phase: &str, total: u64);

    /// Called for each item processed.
    fn on_progress(&self, current: u64, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called with a one-line status message.
    fn on_message(&self, _message: &str) {}
}

/// No-op callback for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn on_phase_start(&self, _phase: &str, _total: u64) {}
    fn on_progress(&self, _current: u64, _path: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

/// Terminal progress renderer.
pub struct Progress {
    multi: MultiProgress,
    counting: Mutex<Option<ProgressBar>>,
    indexing: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress renderer.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            counting: Mutex::new(None),
            indexing: Mutex::new(None),
            quiet,
        }
    }

    fn counting_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn indexing_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: u64) {
        if self.quiet {
            return;
        }

        match phase {
            "counting" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::counting_style());
                pb.set_message("Counting files");
                pb.enable_steady_tick(Duration::from_millis(100));
                *self.counting.lock().unwrap() = Some(pb);
            }
            "indexing" => {
                let pb = self.multi.add(ProgressBar::new(total));
                pb.set_style(Self::indexing_style());
                pb.set_message("Indexing");
                *self.indexing.lock().unwrap() = Some(pb);
            }
            _ => {}
        }
    }

    fn on_progress(&self, current: u64, path: &str) {
        if self.quiet {
            return;
        }

        if let Some(ref pb) = *self.indexing.lock().unwrap() {
            pb.set_position(current);
            pb.set_message(truncate_path(path, 30));
        } else if let Some(ref pb) = *self.counting.lock().unwrap() {
            pb.set_position(current);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        match phase {
            "counting" => {
                if let Some(pb) = self.counting.lock().unwrap().take() {
                    pb.finish_and_clear();
                }
            }
            "indexing" => {
                if let Some(pb) = self.indexing.lock().unwrap().take() {
                    pb.finish_with_message("Indexing complete");
                }
            }
            _ => {}
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Some(ref pb) = *self.indexing.lock().unwrap() {
            pb.set_message(message.to_string());
        } else if let Some(ref pb) = *self.counting.lock().unwrap() {
            pb.set_message(message.to_string());
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.len() >= max_len {
        return format!("...{}", &file_name[file_name.len() - max_len + 3..]);
    }

    format!(".../{}", file_name)
}
