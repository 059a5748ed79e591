//! Service executor: start/stop/pause/restart/info for long-running
//! children, with termination broadcast to every writer that has asked
//! for status on that service by name.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use nix::sys::signal::Signal;

use sace_core::signal::{send_group, try_reap, Termination};
use sace_core::spawn::{spawn, SpawnRequest};
use sace_protocol::{
    framing, InfoKey, Label, RequestKind, ResponseKind, ResponseStatus, ResultStatus, ResultType,
    ServiceFlags, ServiceOp, ServiceRequest, WireResult,
};

use crate::executor::{channel, recv_with_maintenance, ExecutorHandle, RecvOutcome, Receiver};
use crate::label::LabelAllocator;
use crate::writer::{add_subscriber, Writer};
use sace_protocol::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Paused,
    FinishingUser,
}

struct ServiceInfo {
    label: Label,
    pid: i32,
    name: String,
    command: String,
    flags: ServiceFlags,
    state: State,
    started_at: u64,
    subscribers: Vec<Arc<dyn Writer>>,
}

/// Runs the service executor's worker thread; returns immediately with
/// the handle the dispatcher queues jobs through and a join handle for
/// clean shutdown. `labels` is shared with the normal executor so labels
/// stay unique across the whole daemon, not just within this executor.
pub fn spawn_executor(shell: PathBuf, labels: Arc<LabelAllocator>) -> (ExecutorHandle, JoinHandle<()>) {
    let (handle, rx) = channel(RequestKind::Service);

    let join = thread::Builder::new()
        .name("sace-service".into())
        .spawn(move || run(rx, shell, labels))
        .expect("failed to spawn service executor thread");

    (handle, join)
}

fn run(rx: Receiver, shell: PathBuf, labels: Arc<LabelAllocator>) {
    let mut running: HashMap<Label, ServiceInfo> = HashMap::new();
    let mut by_name: HashMap<String, Label> = HashMap::new();

    loop {
        match recv_with_maintenance(&rx) {
            RecvOutcome::Job(job) => {
                if let sace_protocol::Request::Service(req) = job.request {
                    handle_request(&shell, &labels, &mut running, &mut by_name, req, job.writer);
                }
            }
            RecvOutcome::Tick => reap_and_notify(&mut running, &mut by_name),
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
    running: &mut HashMap<Label, ServiceInfo>,
    by_name: &mut HashMap<String, Label>,
    req: ServiceRequest,
    writer: Arc<dyn Writer>,
) {
    match req.op {
        ServiceOp::Start => start(shell, labels, running, by_name, req, writer),
        ServiceOp::Stop => stop(running, req, writer),
        ServiceOp::Pause => pause(running, req, writer),
        ServiceOp::Restart => restart(running, req, writer),
        ServiceOp::Info => info_lookup(running, by_name, req, writer),
    }
}

fn start(
    shell: &PathBuf,
    labels: &LabelAllocator,
    running: &mut HashMap<Label, ServiceInfo>,
    by_name: &mut HashMap<String, Label>,
    req: ServiceRequest,
    writer: Arc<dyn Writer>,
) {
    if by_name.contains_key(&req.name) {
        let _ = writer.send_result(
            &WireResult::fail(req.sequence, req.name, ResultStatus::Exists),
            None,
        );
        return;
    }

    let spawn_req = SpawnRequest {
        shell,
        command: &req.command,
        process_name: &req.name,
        params: req.params.as_ref(),
        stdin: Stdio::null(),
        stdout: Stdio::piped(),
        stderr: Stdio::piped(),
    };

    let mut child = match spawn(spawn_req) {
        Ok(child) => child,
        Err(err) => {
            warn!("service {:?} failed to start: {err}", req.name);
            let _ = writer.send_result(
                &WireResult::fail(req.sequence, req.name, ResultStatus::Fail),
                None,
            );
            return;
        }
    };

    let pid = child.id() as i32;
    pipe_output(child.stdout.take(), &req.name, false);
    pipe_output(child.stderr.take(), &req.name, true);
    drop(child);

    let label = labels.allocate();
    let started_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    info!("service {:?} (pid {pid}) started as label {:?}", req.name, label);
    by_name.insert(req.name.clone(), label);
    running.insert(
        label,
        ServiceInfo {
            label,
            pid,
            name: req.name.clone(),
            command: req.command,
            flags: req.flags,
            state: State::Running,
            started_at,
            subscribers: Vec::new(),
        },
    );

    let _ = writer.send_result(&WireResult::ok_label(req.sequence, req.name, label), None);
}

/// An unknown label is the only `fail` case; a known label always replies
/// `ok`, signaling and moving to `finishing-user` only if it was actually
/// live (stopping an already-stopping service is a harmless no-op).
fn stop(running: &mut HashMap<Label, ServiceInfo>, req: ServiceRequest, writer: Arc<dyn Writer>) {
    let Some(info) = running.get_mut(&req.label) else {
        warn!("stop: unknown label {:?}", req.label);
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    };

    if matches!(info.state, State::Running | State::Paused) {
        if let Err(err) = send_group(info.pid, Signal::SIGTERM) {
            warn!("stop: failed to signal pid {}: {err}", info.pid);
        }
        info.state = State::FinishingUser;
    } else {
        debug!("stop: service {:?} already stopped", req.label);
    }
    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

/// An invalid source state (including an unknown label) is logged and
/// replied `ok` without taking any action, per the source-state rule for
/// pause/restart.
fn pause(running: &mut HashMap<Label, ServiceInfo>, req: ServiceRequest, writer: Arc<dyn Writer>) {
    match running.get_mut(&req.label) {
        Some(info) if info.state == State::Running => {
            if let Err(err) = send_group(info.pid, Signal::SIGSTOP) {
                warn!("pause: failed to signal pid {}: {err}", info.pid);
            } else {
                info.state = State::Paused;
            }
        }
        _ => warn!("pause: service {:?} is not running", req.label),
    }
    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

fn restart(running: &mut HashMap<Label, ServiceInfo>, req: ServiceRequest, writer: Arc<dyn Writer>) {
    match running.get_mut(&req.label) {
        Some(info) if info.state == State::Paused => {
            if let Err(err) = send_group(info.pid, Signal::SIGCONT) {
                warn!("restart: failed to signal pid {}: {err}", info.pid);
            } else {
                info.state = State::Running;
            }
        }
        _ => warn!("restart: service {:?} is not paused", req.label),
    }
    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

fn info_lookup(
    running: &mut HashMap<Label, ServiceInfo>,
    by_name: &mut HashMap<String, Label>,
    req: ServiceRequest,
    writer: Arc<dyn Writer>,
) {
    let label = match req.info_key {
        InfoKey::ByLabel => Some(req.label),
        InfoKey::ByName => by_name.get(&req.name).copied(),
    };

    let Some(info) = label.and_then(|l| running.get_mut(&l)) else {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    };

    if info.flags != req.flags {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    }

    add_subscriber(&mut info.subscribers, writer.clone());

    let extra = encode_snapshot(info);
    let mut result = WireResult::ok_none(req.sequence, req.name);
    result.kind = ResultType::Extra;
    result.extra = extra;
    let _ = writer.send_result(&result, None);
}

/// Packs label/state/name/command into the bounded extra buffer. Truncates
/// the command line (never the name) if the pair doesn't fit.
fn encode_snapshot(info: &ServiceInfo) -> Vec<u8> {
    let state_byte: u8 = match info.state {
        State::Running => 0,
        State::Paused => 1,
        State::FinishingUser => 2,
    };

    let mut command = info.command.clone();
    loop {
        let mut buf = Vec::new();
        let _ = framing::write_u64(&mut buf, info.label.0);
        let _ = framing::write_u8(&mut buf, state_byte);
        let _ = framing::write_u64(&mut buf, info.started_at);
        let _ = framing::write_string(&mut buf, &info.name);
        let _ = framing::write_string(&mut buf, &command);
        if buf.len() <= framing::MAX_EXTRA_LEN || command.is_empty() {
            return buf;
        }
        let overflow = buf.len() - framing::MAX_EXTRA_LEN;
        let new_len = command.len().saturating_sub(overflow.min(command.len()));
        command.truncate(new_len);
    }
}

fn reap_and_notify(running: &mut HashMap<Label, ServiceInfo>, by_name: &mut HashMap<String, Label>) {
    let mut finished = Vec::new();

    for (label, info) in running.iter() {
        if !matches!(info.state, State::Running | State::Paused | State::FinishingUser) {
            continue;
        }
        match try_reap(info.pid) {
            Ok(Termination::StillAlive) | Ok(Termination::Stopped(_)) | Ok(Termination::Continued) => {}
            Ok(term) => finished.push((*label, term)),
            Err(err) => warn!("error reaping service pid {}: {err}", info.pid),
        }
    }

    for (label, term) in finished {
        let Some(info) = running.remove(&label) else { continue };
        by_name.remove(&info.name);

        let (status, extra) = classify(&info, term);
        let response = Response {
            label: info.label,
            name: info.name.clone(),
            kind: ResponseKind::Service,
            status,
            extra,
        };
        if info.subscribers.is_empty() {
            debug!("service {:?} terminated with no subscribers", info.name);
        }
        for subscriber in &info.subscribers {
            if let Err(err) = subscriber.send_response(&response) {
                debug!("failed to notify subscriber for {:?}: {err}", info.name);
            }
        }
    }
}

fn classify(info: &ServiceInfo, term: Termination) -> (ResponseStatus, Vec<u8>) {
    match term {
        Termination::Exited(code) => (ResponseStatus::Exit, code.to_le_bytes().to_vec()),
        Termination::Signaled(sig) if info.state == State::FinishingUser && sig == Signal::SIGTERM as i32 => {
            (ResponseStatus::FinishedByUser, Vec::new())
        }
        Termination::Signaled(sig) => (ResponseStatus::Signal, sig.to_le_bytes().to_vec()),
        _ => (ResponseStatus::Unknown, Vec::new()),
    }
}

/// Signals every live service `SIGINT` and gives it a moment to exit,
/// then runs one final reap. Anything still alive afterward is
/// abandoned: its subscribers get a synthetic `status=signal` response
/// rather than being left to wait forever for one that will never come.
fn shutdown_all(running: &mut HashMap<Label, ServiceInfo>) {
    for info in running.values() {
        if matches!(info.state, State::Running | State::Paused | State::FinishingUser) {
            let _ = send_group(info.pid, Signal::SIGINT);
        }
    }

    thread::sleep(Duration::from_millis(200));

    let mut abandoned = Vec::new();
    for (label, info) in running.iter() {
        match try_reap(info.pid) {
            Ok(Termination::StillAlive) => abandoned.push(*label),
            Ok(_) => {}
            Err(err) => warn!("error reaping service pid {} during shutdown: {err}", info.pid),
        }
    }

    for label in abandoned {
        let Some(info) = running.get(&label) else { continue };
        warn!("service {:?} still alive at shutdown, abandoning it", info.name);
        let response = Response {
            label: info.label,
            name: info.name.clone(),
            kind: ResponseKind::Service,
            status: ResponseStatus::Signal,
            extra: (Signal::SIGINT as i32).to_le_bytes().to_vec(),
        };
        for subscriber in &info.subscribers {
            if let Err(err) = subscriber.send_response(&response) {
                debug!("failed to notify subscriber for {:?} during shutdown: {err}", info.name);
            }
        }
    }

    running.clear();
}

fn pipe_output(stream: Option<impl std::io::Read + Send + 'static>, name: &str, is_stderr: bool) {
    let Some(stream) = stream else { return };
    let name = name.to_string();
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            if is_stderr {
                warn!("{name}: {line}");
            } else {
                info!("{name}: {line}");
            }
        }
    });
}
