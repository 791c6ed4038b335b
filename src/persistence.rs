use crate::error::PersistError;
use crate::metrics::FinalStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Result payload as submitted to a results store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub wpm: u32,
    pub raw_wpm: u32,
    pub accuracy: u32,
    pub burst_wpm: u32,
    pub total_errors: u32,
    pub time_mode: u32,
    pub test_duration: u32,
    pub consistency: u32,
}

impl TestResult {
    pub fn from_stats(stats: &FinalStats, time_mode: u32) -> Self {
        Self {
            wpm: stats.wpm,
            raw_wpm: stats.raw_wpm,
            accuracy: stats.accuracy,
            burst_wpm: stats.burst_wpm,
            total_errors: stats.total_errors,
            time_mode,
            test_duration: stats.test_duration,
            consistency: stats.consistency,
        }
    }
}

pub trait ResultSink: Send + Sync {
    fn submit(&self, result: &TestResult) -> Result<(), PersistError>;
}

/// Runs a submission job. The engine never waits on it.
pub trait Spawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Fire-and-forget on a detached thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        thread::spawn(job);
    }
}

/// Runs the job on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}

/// Sink, spawner and the authentication predicate that gates submission.
pub struct Persistence {
    sink: Arc<dyn ResultSink>,
    spawner: Box<dyn Spawner>,
    authenticated: Box<dyn Fn() -> bool>,
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(
        sink: Arc<dyn ResultSink>,
        spawner: impl Spawner + 'static,
        authenticated: impl Fn() -> bool + 'static,
    ) -> Self {
        Self {
            sink,
            spawner: Box::new(spawner),
            authenticated: Box::new(authenticated),
        }
    }

    /// Hands `result` to the sink when the caller is authenticated. Returns
    /// whether a submission was dispatched; its outcome is only logged.
    pub fn dispatch(&self, result: TestResult) -> bool {
        if !(self.authenticated)() {
            return false;
        }
        let sink = Arc::clone(&self.sink);
        self.spawner.spawn(Box::new(move || match sink.submit(&result) {
            Ok(()) => info!(wpm = result.wpm, accuracy = result.accuracy, "test result saved"),
            Err(e) => warn!(error = %e, "failed to save test result"),
        }));
        true
    }
}
