//! The three executors a request can be routed to, each its own worker
//! thread with its own queue, matching the explicit-thread-per-subsystem
//! concurrency model the broker is specified around.

pub mod event;
pub mod normal;
pub mod service;

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use sace_protocol::{Request, RequestKind};

use crate::writer::Writer;

/// One unit of work handed to an executor's worker thread.
pub struct Job {
    pub request: Request,
    pub writer: Arc<dyn Writer>,
}

/// How often a worker thread wakes up even with no queued job, to run its
/// maintenance pass (reaping dead children, polling event triggers). The
/// original broker's dedicated threads use a similar short poll interval
/// driven by `sem_timedwait`.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_millis(300);

/// What an executor's queue carries: either real work, or an explicit
/// request to wind down. A dropped `Sender` alone isn't a reliable
/// shutdown signal here, since a job can hold a clone of another
/// executor's handle (the event executor forwards starts into the
/// service executor's queue) long after the dispatcher's own clone is
/// gone — so shutdown is its own message, not an artifact of every
/// sender disappearing.
enum Envelope {
    Job(Job),
    Shutdown,
}

/// A cheap, cloneable front for an executor's queue. Held by the
/// dispatcher; the executor's own worker thread holds the matching
/// `Receiver`.
#[derive(Clone)]
pub struct ExecutorHandle {
    kind: RequestKind,
    sender: Sender<Envelope>,
}

impl ExecutorHandle {
    fn new(kind: RequestKind, sender: Sender<Envelope>) -> Self {
        ExecutorHandle { kind, sender }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Returns `true` (and queues the job) if this handle's kind matches
    /// the request, mirroring the original dispatcher's `excute()` offer
    /// protocol: every executor is asked in turn, and the first one whose
    /// handler id matches claims it.
    pub fn offer(&self, job: Job) -> Result<(), Job> {
        let matches = match (&job.request, self.kind) {
            (Request::Normal(_), RequestKind::Normal) => true,
            (Request::Service(_), RequestKind::Service) => true,
            (Request::Event(_), RequestKind::Event) => true,
            _ => false,
        };
        if !matches {
            return Err(job);
        }
        // A closed receiver means the worker thread died; drop the job
        // rather than panic the accept loop.
        let _ = self.sender.send(Envelope::Job(job));
        Ok(())
    }

    /// Tells this executor's worker thread to finish its current pass and
    /// exit; does not wait for it to do so.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Envelope::Shutdown);
    }
}

/// The receiving end an executor's worker loop owns.
pub(crate) type Receiver = std::sync::mpsc::Receiver<Envelope>;

/// Builds the `(ExecutorHandle, Receiver)` pair an executor's
/// `spawn_executor` wraps into a handle plus its worker loop's receiving
/// end.
pub(crate) fn channel(kind: RequestKind) -> (ExecutorHandle, Receiver) {
    let (tx, rx) = std::sync::mpsc::channel::<Envelope>();
    (ExecutorHandle::new(kind, tx), rx)
}

pub(crate) enum RecvOutcome {
    Job(Job),
    Tick,
    Shutdown,
}

pub(crate) fn recv_with_maintenance(rx: &Receiver) -> RecvOutcome {
    match rx.recv_timeout(MAINTENANCE_INTERVAL) {
        Ok(Envelope::Job(job)) => RecvOutcome::Job(job),
        Ok(Envelope::Shutdown) => RecvOutcome::Shutdown,
        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => RecvOutcome::Tick,
        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => RecvOutcome::Shutdown,
    }
}
