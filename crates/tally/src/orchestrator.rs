// Runs one FileTallyTask per path against a shared WordCounter, waits on all
// of them, then turns the counter into a report.

use std::{collections::HashMap, fmt, path::PathBuf, time::Duration};

use concur_config::{TallyMode, TallySettings};
use futures::future;
use tokio::{
    sync::broadcast,
    task::{JoinError, JoinHandle},
};
use tracing::Instrument;

use crate::{counter::repeated_words, FileTallyTask, TallyError, TallyResult, WordCounter};

/// Default threshold: a word is repeated once seen more than once.
pub const DEFAULT_MIN_COUNT: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTally {
    pub path: PathBuf,
    pub words: u64,
}

/// Result of a finished tally. In lenient mode `failures` lists the files
/// that could not be read; their words may be partially counted.
#[derive(Debug)]
pub struct TallyReport {
    counts: HashMap<String, u64>,
    min_count: u64,
    pub tallied: Vec<FileTally>,
    pub failures: Vec<TallyError>,
}

impl TallyReport {
    pub fn counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    pub fn count(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    pub fn total_words(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Words that reached the report threshold, highest count first.
    pub fn repeated(&self) -> Vec<(String, u64)> {
        repeated_words(&self.counts, self.min_count)
    }
}

impl fmt::Display for TallyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (word, count) in self.repeated() {
            writeln!(f, "{word} - {count}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TallyOrchestrator {
    paths: Vec<PathBuf>,
    mode: TallyMode,
    min_count: u64,
    deadline: Option<Duration>,
    batched: bool,
}

impl From<&TallySettings> for TallyOrchestrator {
    fn from(settings: &TallySettings) -> Self {
        Self::new(settings.files.clone())
            .with_mode(settings.mode)
            .with_min_count(settings.min_count)
            .with_deadline(settings.deadline)
    }
}

impl TallyOrchestrator {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            mode: TallyMode::Strict,
            min_count: DEFAULT_MIN_COUNT,
            deadline: None,
            batched: false,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TallyMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// `run` tallies every path concurrently and returns once all tasks are
    /// done. In strict mode the first failure (in path order) is returned
    /// instead of a report. A fired `cancel_signal` or elapsed deadline aborts
    /// the tasks, waits for them to wind down and returns an error.
    pub async fn run(&self, cancel_signal: broadcast::Receiver<()>) -> TallyResult<TallyReport> {
        let counter = WordCounter::new();

        let handles: Vec<JoinHandle<TallyResult<u64>>> = self
            .paths
            .iter()
            .map(|path| {
                concur_logs::info!("tallying file {}", path.display());
                let task = FileTallyTask::new(path.clone(), counter.clone()).batched(self.batched);
                tokio::spawn(task.run().instrument(tracing::Span::current()))
            })
            .collect();

        let results = await_all(handles, self.deadline, cancel_signal).await?;

        let mut tallied = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (path, result) in self.paths.iter().zip(results) {
            match result {
                Ok(Ok(words)) => tallied.push(FileTally {
                    path: path.clone(),
                    words,
                }),
                Ok(Err(err)) => {
                    concur_logs::error!("tally failed: {}", err);
                    failures.push(err);
                }
                Err(err) => {
                    concur_logs::error!("tally task for {} failed: {}", path.display(), err);
                    failures.push(TallyError::TaskFailed {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if self.mode == TallyMode::Strict && !failures.is_empty() {
            return Err(failures.remove(0));
        }

        Ok(TallyReport {
            counts: counter.snapshot(),
            min_count: self.min_count,
            tallied,
            failures,
        })
    }
}

/// `await_all` is the completion barrier: it resolves once every handle has
/// finished, keeping their order. When the deadline passes or the cancel
/// signal fires first, every task is aborted and awaited before the error is
/// returned. Dropping every cancel sender counts as a cancel.
pub async fn await_all<T>(
    handles: Vec<JoinHandle<T>>,
    deadline: Option<Duration>,
    mut cancel_signal: broadcast::Receiver<()>,
) -> TallyResult<Vec<Result<T, JoinError>>> {
    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
    let barrier = future::join_all(handles);
    tokio::pin!(barrier);

    let timer = async move {
        match deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timer);

    let stopped = tokio::select! {
        biased;

        _ = cancel_signal.recv() => TallyError::Cancelled,
        () = &mut timer => TallyError::DeadlineElapsed,
        results = &mut barrier => return Ok(results),
    };

    concur_logs::warn!("stopping {} tally tasks: {}", aborts.len(), stopped);
    for abort in &aborts {
        abort.abort();
    }
    let _ = barrier.await;

    Err(stopped)
}
