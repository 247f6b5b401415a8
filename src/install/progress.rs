//! Progress reporting for installation runs.
//!
//! The engine talks to an observer through the [`ProgressReporter`] trait.
//! Two implementations ship with the crate: [`ChannelProgress`] publishes
//! immutable [`ProgressSnapshot`]s on a `watch` channel for a UI to poll, and
//! [`TracingProgress`] writes progress lines to the log.

use tokio::sync::watch;

/// Observer of an installation run.
///
/// Calls come from the single task running the installation, in order.
///
/// # Example
///
/// ```rust
/// use feature_installer::ProgressReporter;
///
/// struct Stdout;
///
/// impl ProgressReporter for Stdout {
///     fn set_header(&self, header: &str) {
///         println!("== {header} ==");
///     }
///     fn set_text(&self, text: &str) {
///         println!("{text}");
///     }
///     fn update(&self, percent: u8, message: &str) {
///         println!("[{percent:>3}%] {message}");
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Set the title of the current phase, usually the feature being installed.
    fn set_header(&self, header: &str);

    /// Set a free-text status line.
    fn set_text(&self, text: &str);

    /// Report overall completion (0 to 100) with a short message.
    fn update(&self, percent: u8, message: &str);
}

/// Latest known state of an installation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub header: String,
    pub text: String,
    pub percent: u8,
    pub message: String,
}

/// [`ProgressReporter`] publishing snapshots on a `watch` channel.
///
/// Readers only ever see the most recent snapshot.
///
/// # Example
///
/// ```rust
/// use feature_installer::{ChannelProgress, ProgressReporter};
///
/// let progress = ChannelProgress::new();
/// let receiver = progress.subscribe();
///
/// progress.set_header("julius");
/// progress.update(40, "Installing julius");
///
/// let snapshot = receiver.borrow().clone();
/// assert_eq!(snapshot.header, "julius");
/// assert_eq!(snapshot.percent, 40);
/// ```
#[derive(Debug)]
pub struct ChannelProgress {
    sender: watch::Sender<ProgressSnapshot>,
}

impl ChannelProgress {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressSnapshot::default());
        Self { sender }
    }

    /// A new receiver positioned on the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.sender.borrow().clone()
    }
}

impl Default for ChannelProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ChannelProgress {
    fn set_header(&self, header: &str) {
        self.sender.send_modify(|s| s.header = header.to_string());
    }

    fn set_text(&self, text: &str) {
        self.sender.send_modify(|s| s.text = text.to_string());
    }

    fn update(&self, percent: u8, message: &str) {
        self.sender.send_modify(|s| {
            s.percent = percent.min(100);
            s.message = message.to_string();
        });
    }
}

/// [`ProgressReporter`] writing to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn set_header(&self, header: &str) {
        tracing::info!("{}", header);
    }

    fn set_text(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn update(&self, percent: u8, message: &str) {
        tracing::info!(percent, "{}", message);
    }
}

/// Saved tracker position, to replay a group of sub-steps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    done: f64,
    step: f64,
}

/// Splits 100% across features, then across each feature's sub-steps.
///
/// The reported value never decreases and reaches exactly 100 on
/// [`finish`](Self::finish).
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    share: f64,
    step: f64,
    done: f64,
    reported: u8,
}

impl ProgressTracker {
    /// Tracker for a run over `features` features.
    pub(crate) fn new(features: usize) -> Self {
        let share = if features == 0 { 100.0 } else { 100.0 / features as f64 };
        Self {
            share,
            step: share,
            done: 0.0,
            reported: 0,
        }
    }

    /// Start a feature made of `steps` sub-steps (at least one).
    pub(crate) fn begin_feature(&mut self, steps: usize) {
        self.step = self.share / steps.max(1) as f64;
    }

    /// Account for one finished sub-step and return the new percentage.
    pub(crate) fn advance(&mut self) -> u8 {
        self.done += self.step;
        self.current()
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            done: self.done,
            step: self.step,
        }
    }

    /// Go back to `checkpoint` to redo the `planned` sub-steps that followed
    /// it as `actual` sub-steps covering the same span.
    ///
    /// The reported value does not go back.
    pub(crate) fn rewind(&mut self, checkpoint: Checkpoint, planned: usize, actual: usize) {
        self.done = checkpoint.done;
        self.step = checkpoint.step * planned as f64 / actual.max(1) as f64;
    }

    /// Restore the step size saved in `checkpoint` after a replayed group.
    pub(crate) fn restore_step(&mut self, checkpoint: Checkpoint) {
        self.step = checkpoint.step;
    }

    /// Account for the rest of the current feature, skipped or failed.
    pub(crate) fn complete_feature(&mut self, index: usize) -> u8 {
        let target = self.share * (index + 1) as f64;
        if target > self.done {
            self.done = target;
        }
        self.current()
    }

    pub(crate) fn finish(&mut self) -> u8 {
        self.reported = 100;
        100
    }

    fn current(&mut self) -> u8 {
        // Equal shares do not sum exactly; absorb the float error.
        let value = ((self.done + 1e-6).floor() as u8).min(100);
        self.reported = self.reported.max(value);
        self.reported
    }
}
