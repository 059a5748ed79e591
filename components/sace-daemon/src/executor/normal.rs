//! Interactive command executor: spawns a shell command, hands the
//! caller the read or write end of its stdio pipe, and forgets about it
//! until the caller asks to close it. No lifecycle notifications go out
//! for normal commands — only the two request/result round trips.

use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use nix::sys::signal::Signal;

use sace_core::signal::{send_group, try_reap, Termination};
use sace_core::spawn::{spawn, SpawnRequest};
use sace_protocol::{Direction, NormalOp, NormalRequest, ResultStatus, ResultType, WireResult};

use crate::executor::{channel, recv_with_maintenance, ExecutorHandle, RecvOutcome, Receiver};
use crate::label::LabelAllocator;
use sace_protocol::{Label, RequestKind};

struct CommandInfo {
    pid: i32,
    child: Child,
}

/// Runs the normal executor's worker thread; returns immediately with the
/// handle the dispatcher queues jobs through and a join handle for clean
/// shutdown. `labels` is shared with the service executor so labels stay
/// unique across the whole daemon, not just within this executor.
pub fn spawn_executor(shell: PathBuf, labels: Arc<LabelAllocator>) -> (ExecutorHandle, JoinHandle<()>) {
    let (handle, rx) = channel(RequestKind::Normal);

    let join = thread::Builder::new()
        .name("sace-normal".into())
        .spawn(move || run(rx, shell, labels))
        .expect("failed to spawn normal executor thread");

    (handle, join)
}

fn run(rx: Receiver, shell: PathBuf, labels: Arc<LabelAllocator>) {
    let mut running: HashMap<Label, CommandInfo> = HashMap::new();

    loop {
        match recv_with_maintenance(&rx) {
            RecvOutcome::Job(job) => {
                if let sace_protocol::Request::Normal(req) = job.request {
                    handle_request(&shell, &labels, &mut running, req, job.writer.as_ref());
                }
            }
            RecvOutcome::Tick => reap_finished(&mut running),
            RecvOutcome::Shutdown => {
                shutdown_all(&mut running);
                break;
            }
        }
    }
}

fn handle_request(
    shell: &PathBuf,
    labels: &LabelAllocator,
    running: &mut HashMap<Label, CommandInfo>,
    req: NormalRequest,
    writer: &dyn crate::writer::Writer,
) {
    match req.op {
        NormalOp::Start => start(shell, labels, running, req, writer),
        NormalOp::Close => close(running, req, writer),
    }
}

fn start(
    shell: &PathBuf,
    labels: &LabelAllocator,
    running: &mut HashMap<Label, CommandInfo>,
    req: NormalRequest,
    writer: &dyn crate::writer::Writer,
) {
    let (stdin, stdout, stderr, passed_end) = match req.direction {
        // Caller wants to read the command's output.
        Direction::Read => (Stdio::null(), Stdio::piped(), Stdio::piped(), PassedEnd::Stdout),
        // Caller wants to write to the command's input.
        Direction::Write => (Stdio::piped(), Stdio::null(), Stdio::piped(), PassedEnd::Stdin),
    };

    let spawn_req = SpawnRequest {
        shell,
        command: &req.command,
        process_name: &req.command,
        params: req.params.as_ref(),
        stdin,
        stdout,
        stderr,
    };

    let mut child = match spawn(spawn_req) {
        Ok(child) => child,
        Err(err) => {
            warn!("normal command {:?} failed to start: {err}", req.name);
            let _ = writer.send_result(
                &WireResult::fail(req.sequence, req.name, ResultStatus::Fail),
                None,
            );
            return;
        }
    };

    let owned_fd: OwnedFd = match passed_end {
        PassedEnd::Stdout => unsafe { OwnedFd::from_raw_fd(child.stdout.take().unwrap().into_raw_fd()) },
        PassedEnd::Stdin => unsafe { OwnedFd::from_raw_fd(child.stdin.take().unwrap().into_raw_fd()) },
    };

    let pid = child.id() as i32;
    let label = labels.allocate();
    info!("normal command {:?} (pid {pid}) started as label {:?}", req.name, label);

    let mut result = WireResult::ok_label(req.sequence, req.name.clone(), label);
    result.kind = ResultType::Fd;
    if writer.send_result(&result, Some(owned_fd.as_raw_fd())).is_err() {
        warn!("failed to deliver fd for normal command {:?}; killing it", req.name);
        let _ = send_group(pid, Signal::SIGKILL);
        let _ = child.wait();
        return;
    }
    drop(owned_fd);

    running.insert(label, CommandInfo { pid, child });
}

fn close(running: &mut HashMap<Label, CommandInfo>, req: NormalRequest, writer: &dyn crate::writer::Writer) {
    let Some(mut info) = running.remove(&req.label) else {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    };

    if let Err(err) = send_group(info.pid, Signal::SIGTERM) {
        debug!("close: pid {} already gone: {err}", info.pid);
    }
    let _ = info.child.wait();
    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

fn reap_finished(running: &mut HashMap<Label, CommandInfo>) {
    running.retain(|label, info| match try_reap(info.pid) {
        Ok(Termination::StillAlive) => true,
        Ok(_) => {
            debug!("reaped finished normal command, label {:?}", label);
            false
        }
        Err(err) => {
            warn!("error reaping normal command pid {}: {err}", info.pid);
            true
        }
    });
}

/// Signals every still-running command's process group and blocking-waits
/// each one, so none are left behind once this executor's thread exits.
fn shutdown_all(running: &mut HashMap<Label, CommandInfo>) {
    for info in running.values_mut() {
        let _ = send_group(info.pid, Signal::SIGINT);
        let _ = info.child.wait();
    }
    running.clear();
}

enum PassedEnd {
    Stdout,
    Stdin,
}
