//! Routes an incoming request to the executor that claims it.
//!
//! Executors are tried in a fixed order — service, normal, event — the
//! same order the original broker registered its handlers in, with the
//! same warning attached: it is dangerous to change it, because it's the
//! order client requests are matched against when more than one executor
//! could plausibly claim a malformed message.

use log::warn;

use crate::executor::{ExecutorHandle, Job};

pub struct Dispatcher {
    executors: Vec<ExecutorHandle>,
}

impl Dispatcher {
    pub fn new(service: ExecutorHandle, normal: ExecutorHandle, event: ExecutorHandle) -> Self {
        Dispatcher { executors: vec![service, normal, event] }
    }

    pub fn dispatch(&self, job: Job) {
        let mut job = job;
        for executor in &self.executors {
            match executor.offer(job) {
                Ok(()) => return,
                Err(returned) => job = returned,
            }
        }
        warn!("no executor claimed a request with sequence {:?}", job.request.sequence());
    }

    /// Tells every executor's worker thread to finish its current pass
    /// and exit. Does not wait for them; the caller joins their threads
    /// separately.
    pub fn shutdown(&self) {
        for executor in &self.executors {
            executor.shutdown();
        }
    }
}
