// Admission gate: mutual exclusion built from a capacity-one channel instead
// of a lock object. Holding the gate means owning the single token that sits
// in the channel's only slot.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::Instrument;

use crate::mspc::{self, ChannelError};

#[derive(Error, Debug)]
pub enum GateError {
    #[error("gate channel failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("gate worker {0} did not finish: {1}")]
    WorkerFailed(usize, String),
}

pub type GateResult<T> = anyhow::Result<T, GateError>;

/// Observable state of an [`AdmissionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Free,
    Held,
}

/// `AdmissionGate` admits one holder at a time. Clone it to hand a gate to
/// each worker; every clone shares the same slot.
pub struct AdmissionGate {
    slot: mspc::SendChannel<()>,
    release: mspc::ReceiveChannel<()>,
}

impl Clone for AdmissionGate {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            release: self.release.clone(),
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        let (slot, release) = mspc::create_bounded::<()>(1);
        Self { slot, release }
    }

    /// `acquire` places this caller's token in the slot, suspending while
    /// another holder owns it. Dropping the future before it resolves leaves
    /// the gate untouched.
    pub async fn acquire(&mut self) -> GateResult<GatePass> {
        self.slot.async_send(()).await?;
        Ok(GatePass::new(self.release.clone()))
    }

    /// `try_acquire` returns `None` instead of waiting when the gate is held.
    pub fn try_acquire(&mut self) -> GateResult<Option<GatePass>> {
        match self.slot.try_send(()) {
            Ok(()) => Ok(Some(GatePass::new(self.release.clone()))),
            Err(ChannelError::Full) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn state(&self) -> GateResult<GateState> {
        if self.slot.pending_message_count()? == 0 {
            Ok(GateState::Free)
        } else {
            Ok(GateState::Held)
        }
    }

    pub fn is_held(&self) -> GateResult<bool> {
        Ok(self.state()? == GateState::Held)
    }
}

/// Proof of holding the gate. The token is taken back out of the slot on
/// [`GatePass::release`] or when the pass is dropped.
#[must_use = "the gate is released as soon as the pass is dropped"]
pub struct GatePass {
    release: mspc::ReceiveChannel<()>,
    released: bool,
}

impl GatePass {
    fn new(release: mspc::ReceiveChannel<()>) -> Self {
        Self {
            release,
            released: false,
        }
    }

    pub fn release(mut self) -> GateResult<()> {
        self.take_token()
    }

    fn take_token(&mut self) -> GateResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.release.try_receive()?;
        Ok(())
    }
}

impl Drop for GatePass {
    fn drop(&mut self) {
        if let Err(err) = self.take_token() {
            concur_logs::error!("Failed to release admission gate: {}", err);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRunOptions {
    pub workers: usize,
    pub hold: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRunSummary {
    /// workers that acquired and released the gate
    pub completed: usize,

    /// worker ids in the order they became the holder
    pub order: Vec<usize>,

    /// most holders ever seen at once; anything but 1 is a broken gate
    pub max_holders: usize,
}

#[derive(Default)]
struct HoldTracker {
    current: AtomicUsize,
    max: AtomicUsize,
    order: Mutex<Vec<usize>>,
}

impl HoldTracker {
    fn enter(&self, id: usize) {
        let holders = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(holders, Ordering::SeqCst);
        self.order
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(id);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `run_workers` launches every worker at once against one gate. Each worker
/// acquires, holds for `options.hold`, then releases. Sending on `cancel`
/// stops waiting workers and cuts the current hold short.
pub async fn run_workers(
    options: GateRunOptions,
    cancel: &broadcast::Sender<()>,
) -> GateResult<GateRunSummary> {
    let gate = AdmissionGate::new();
    let tracker = Arc::new(HoldTracker::default());

    let handles: Vec<_> = (1..=options.workers)
        .map(|id| {
            let worker_gate = gate.clone();
            let worker_tracker = tracker.clone();
            let worker_cancel = cancel.subscribe();
            concur_logs::debug!("launching worker {}", id);
            (
                id,
                tokio::spawn(
                    gate_worker(id, worker_gate, options.hold, worker_tracker, worker_cancel)
                        .instrument(tracing::Span::current()),
                ),
            )
        })
        .collect();

    let completed = join_workers(handles).await?;

    let order = tracker
        .order
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();

    Ok(GateRunSummary {
        completed,
        order,
        max_holders: tracker.max.load(Ordering::SeqCst),
    })
}

// Awaits workers in launch order and counts the ones that got through. On the
// first failure the remaining workers are aborted and awaited before the error
// is returned.
async fn join_workers(handles: Vec<(usize, JoinHandle<GateResult<bool>>)>) -> GateResult<usize> {
    let mut pending = handles.into_iter();
    let mut completed = 0;
    let mut failure = None;

    for (id, handle) in pending.by_ref() {
        match handle.await {
            Ok(Ok(true)) => completed += 1,
            Ok(Ok(false)) => {}
            Ok(Err(err)) => {
                failure = Some(err);
                break;
            }
            Err(err) => {
                failure = Some(GateError::WorkerFailed(id, err.to_string()));
                break;
            }
        }
    }

    let Some(err) = failure else {
        return Ok(completed);
    };

    concur_logs::error!("gate run failed, stopping remaining workers: {}", err);
    for (_, handle) in pending {
        handle.abort();
        let _ = handle.await;
    }
    Err(err)
}

// Returns false when cancelled before getting hold of the gate.
async fn gate_worker(
    id: usize,
    mut gate: AdmissionGate,
    hold: Duration,
    tracker: Arc<HoldTracker>,
    mut cancel: broadcast::Receiver<()>,
) -> GateResult<bool> {
    let pass = tokio::select! {
        biased;

        _ = cancel.recv() => {
            concur_logs::info!("worker {} cancelled while waiting", id);
            return Ok(false);
        },
        pass = gate.acquire() => pass?,
    };

    tracker.enter(id);
    concur_logs::info!("locked worker {}", id);

    tokio::select! {
        _ = cancel.recv() => {
            concur_logs::info!("worker {} hold cut short", id);
        },
        () = tokio::time::sleep(hold) => {},
    }

    concur_logs::info!("releasing worker {}", id);
    tracker.leave();
    pass.release()?;
    Ok(true)
}
