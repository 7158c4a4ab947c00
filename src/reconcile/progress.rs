//! Run identity and progress reporting.
//!
//! The caller owns the [`RunContext`] and decides where updates go; the core
//! only pushes updates and never waits on the consumer.

use std::fmt;
use std::sync::Mutex;

use tracing::info;
use uuid::Uuid;

/// Receives progress updates for a run.
pub trait ProgressSink {
    fn report(&self, run_id: Uuid, status: &str, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(Uuid, &str, u8),
{
    fn report(&self, run_id: Uuid, status: &str, percent: u8) {
        self(run_id, status, percent)
    }
}

/// Sink that forwards updates to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, run_id: Uuid, status: &str, percent: u8) {
        info!(%run_id, percent, "{status}");
    }
}

/// One recorded progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub run_id: Uuid,
    pub status: String,
    pub percent: u8,
}

/// Sink that keeps every update in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the updates received so far.
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    /// The most recent update.
    pub fn last(&self) -> Option<ProgressUpdate> {
        self.updates().pop()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, run_id: Uuid, status: &str, percent: u8) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(ProgressUpdate {
                run_id,
                status: status.to_string(),
                percent,
            });
        }
    }
}

/// Per-run handle passed through the pipeline.
pub struct RunContext<'a> {
    id: Uuid,
    sink: &'a dyn ProgressSink,
}

impl<'a> RunContext<'a> {
    /// Creates a context with a fresh random run id.
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self::with_id(Uuid::new_v4(), sink)
    }

    pub fn with_id(id: Uuid, sink: &'a dyn ProgressSink) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pushes a status update. `percent` is capped at 100.
    pub fn report(&self, status: &str, percent: u8) {
        self.sink.report(self.id, status, percent.min(100));
    }

    /// Pushes the terminal failure status for the run.
    pub fn fail(&self, error: &dyn fmt::Display) {
        self.report(&format!("Error: {error}"), 100);
    }
}

impl fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext").field("id", &self.id).finish()
    }
}
