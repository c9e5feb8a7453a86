use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::error;

use crate::domain::entities::merge::{MergeRequest, MergeResult, ProgressUpdate};
use crate::usecase::ports::spreadsheet::{SourceOpener, SpreadsheetSink};
use crate::usecase::services::merge_service::{MergeError, MergeOrchestrator};

type JobOutput<S> = Result<(MergeResult, S), MergeError>;

/// A merge running on its own thread.
pub struct MergeJob<S> {
    handle: JoinHandle<JobOutput<S>>,
    progress: Receiver<ProgressUpdate>,
}

impl<S> MergeJob<S> {
    pub fn progress(&self) -> &Receiver<ProgressUpdate> {
        &self.progress
    }

    /// Discards undelivered progress updates, then joins the worker.
    pub fn wait(self) -> JobOutput<S> {
        for _ in self.progress.iter() {}

        self.handle.join().map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            error!(message = %message, "merge worker panicked");
            MergeError::Worker(message)
        })?
    }
}

/// `capacity` bounds the progress channel; the worker blocks while it is full.
pub fn spawn_merge<S>(
    opener: Arc<dyn SourceOpener>,
    request: MergeRequest,
    mut sink: S,
    capacity: usize,
) -> Result<MergeJob<S>, MergeError>
where
    S: SpreadsheetSink + Send + 'static,
{
    let orchestrator = MergeOrchestrator::new(opener);
    let progress = orchestrator.progress().subscribe_channel(capacity);

    let handle = thread::Builder::new()
        .name("merge-worker".to_string())
        .spawn(move || -> JobOutput<S> {
            let result = orchestrator.merge(&request, &mut sink)?;
            Ok((result, sink))
        })
        .map_err(|err| MergeError::Worker(format!("failed to spawn merge worker: {err}")))?;

    Ok(MergeJob { handle, progress })
}
