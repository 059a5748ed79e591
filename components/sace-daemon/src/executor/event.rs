//! Event executor: holds a set of named event definitions, each armed
//! with one or more triggers, and starts the matching service (through
//! the service executor) the moment any of its triggers fires.
//!
//! Triggers are polled on the same cadence as the other executors'
//! maintenance tick rather than driven by an inotify-style watch, mostly
//! because the property store they watch is itself just a flat file on
//! this port — see [`PropertyStore`].

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use sace_protocol::{
    EventFlags, EventOp, EventRequest, InfoKey, Label, RequestKind, ResponseKind, ResponseStatus,
    ResultStatus, ResultType, Sequence, ServiceFlags, ServiceOp, ServiceRequest, Trigger,
    WireResult,
};

use crate::config::{self, EventDefinition};
use crate::executor::{channel, recv_with_maintenance, ExecutorHandle, Job, RecvOutcome, Receiver};
use crate::writer::{add_subscriber, Writer, WriterId};

/// Flat `key=value`-per-line property store, refreshed from disk every
/// tick. Stands in for the property service the original triggers read
/// from.
pub struct PropertyStore {
    path: Option<PathBuf>,
    values: HashMap<String, String>,
}

impl PropertyStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        PropertyStore { path, values: HashMap::new() }
    }

    fn refresh(&mut self) {
        let Some(path) = &self.path else { return };
        match fs::read_to_string(path) {
            Ok(text) => {
                self.values.clear();
                for line in text.lines() {
                    if let Some((k, v)) = line.split_once('=') {
                        self.values.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to read property store {path:?}: {err}"),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

struct EventState {
    def: EventDefinition,
    running: bool,
    label: Option<Label>,
    boot_fired: bool,
    last_values: HashMap<String, String>,
    /// Writers that asked for this event's status via `info by name`;
    /// fed the event-triggered service's termination response.
    subscribers: Vec<Arc<dyn Writer>>,
}

enum Feedback {
    StartResult { event_name: String, status: ResultStatus, label: Option<Label> },
    Terminated { event_name: String, status: ResponseStatus },
}

/// Feeds the event executor its own service's lifecycle back over a
/// channel instead of down a socket — an event-started service has no
/// requesting client to report to.
struct EventWriter {
    id: WriterId,
    event_name: String,
    feedback: mpsc::Sender<Feedback>,
}

impl Writer for EventWriter {
    fn id(&self) -> WriterId {
        self.id
    }

    fn send_result(&self, result: &WireResult, _fd: Option<std::os::unix::io::RawFd>) -> std::io::Result<()> {
        let _ = self.feedback.send(Feedback::StartResult {
            event_name: self.event_name.clone(),
            status: result.status,
            label: result.label(),
        });
        Ok(())
    }

    fn send_response(&self, response: &sace_protocol::Response) -> std::io::Result<()> {
        let _ = self.feedback.send(Feedback::Terminated {
            event_name: self.event_name.clone(),
            status: response.status,
        });
        Ok(())
    }
}

/// Wraps a writer so only `Response` notifications reach it, never a
/// `send_result`. Used to subscribe a caller to another operation's
/// termination (an internal `info`/`stop` pair issued on their behalf)
/// without also delivering that operation's own synchronous result to
/// them, which would arrive on a sequence number they never sent.
struct ResponseOnlyWriter {
    inner: Arc<dyn Writer>,
}

impl Writer for ResponseOnlyWriter {
    fn id(&self) -> WriterId {
        self.inner.id()
    }

    fn send_result(&self, _result: &WireResult, _fd: Option<std::os::unix::io::RawFd>) -> std::io::Result<()> {
        Ok(())
    }

    fn send_response(&self, response: &sace_protocol::Response) -> std::io::Result<()> {
        self.inner.send_response(response)
    }
}

/// Runs the event executor's worker thread; returns immediately with the
/// handle the dispatcher queues jobs through and a join handle for clean
/// shutdown.
pub fn spawn_executor(
    service_handle: ExecutorHandle,
    config_path: Option<PathBuf>,
    property_path: Option<PathBuf>,
) -> (ExecutorHandle, JoinHandle<()>) {
    let (handle, rx) = channel(RequestKind::Event);

    let join = thread::Builder::new()
        .name("sace-event".into())
        .spawn(move || run(rx, service_handle, config_path, property_path))
        .expect("failed to spawn event executor thread");

    (handle, join)
}

fn run(
    rx: Receiver,
    service_handle: ExecutorHandle,
    config_path: Option<PathBuf>,
    property_path: Option<PathBuf>,
) {
    let mut events: HashMap<String, EventState> = HashMap::new();
    let mut properties = PropertyStore::new(property_path);
    let (feedback_tx, feedback_rx) = mpsc::channel::<Feedback>();

    if let Some(path) = &config_path {
        match fs::read_to_string(path) {
            Ok(text) => match config::parse(&text) {
                Ok(defs) => {
                    for def in defs {
                        let name = def.name.clone();
                        events.insert(name, EventState {
                            def,
                            running: false,
                            label: None,
                            boot_fired: false,
                            last_values: HashMap::new(),
                            subscribers: Vec::new(),
                        });
                    }
                }
                Err(err) => warn!("failed to parse event config {path:?}: {err}"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to read event config {path:?}: {err}"),
        }
    }

    loop {
        while let Ok(fb) = feedback_rx.try_recv() {
            apply_feedback(&mut events, &service_handle, &feedback_tx, fb);
        }

        match recv_with_maintenance(&rx) {
            RecvOutcome::Job(job) => {
                if let sace_protocol::Request::Event(req) = job.request {
                    handle_request(&mut events, &config_path, &service_handle, req, job.writer);
                }
            }
            RecvOutcome::Tick => {
                properties.refresh();
                poll_triggers(&mut events, &properties, &service_handle, &feedback_tx);
            }
            RecvOutcome::Shutdown => break,
        }
    }
}

fn handle_request(
    events: &mut HashMap<String, EventState>,
    config_path: &Option<PathBuf>,
    service_handle: &ExecutorHandle,
    req: EventRequest,
    writer: Arc<dyn Writer>,
) {
    match req.op {
        EventOp::Add => add(events, config_path, req, writer),
        EventOp::Delete => delete(events, config_path, service_handle, req, writer),
        EventOp::Info => info_lookup(events, req, writer),
    }
}

fn add(
    events: &mut HashMap<String, EventState>,
    config_path: &Option<PathBuf>,
    req: EventRequest,
    writer: Arc<dyn Writer>,
) {
    if events.contains_key(&req.name) {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Exists), None);
        return;
    }

    let triggers = req.params.as_ref().map(|p| p.triggers.as_slice()).unwrap_or(&[]);
    if triggers.is_empty() {
        warn!("event {:?} rejected: no triggers", req.name);
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    }

    let def = EventDefinition {
        name: req.name.clone(),
        command: req.command,
        flags: req.flags,
        params: req.params.unwrap_or_default(),
    };
    events.insert(req.name.clone(), EventState {
        def,
        running: false,
        label: None,
        boot_fired: false,
        last_values: HashMap::new(),
        subscribers: Vec::new(),
    });

    persist(events, config_path);
    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

/// Removes the definition unconditionally. If `delete_stop_flag` is set
/// and the event's service is currently running, also subscribes the
/// caller's writer to its termination and enqueues a stop for it; the
/// caller still gets this delete's own `ok` right away, with the
/// termination arriving later as an out-of-band response. If the
/// service was already terminal (or never started), deleting is a plain
/// no-stop-needed removal.
fn delete(
    events: &mut HashMap<String, EventState>,
    config_path: &Option<PathBuf>,
    service_handle: &ExecutorHandle,
    req: EventRequest,
    writer: Arc<dyn Writer>,
) {
    let Some(state) = events.remove(&req.name) else {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    };

    persist(events, config_path);

    if req.delete_stop_flag {
        if let Some(label) = state.label.filter(|_| state.running) {
            let subscriber: Arc<dyn Writer> = Arc::new(ResponseOnlyWriter { inner: writer.clone() });

            let info_job = Job {
                request: sace_protocol::Request::Service(ServiceRequest {
                    sequence: Sequence(0),
                    label,
                    name: state.def.name.clone(),
                    command: String::new(),
                    flags: ServiceFlags::FromEvent,
                    op: ServiceOp::Info,
                    info_key: InfoKey::ByLabel,
                    params: None,
                }),
                writer: subscriber.clone(),
            };
            // Subscribe before stopping so the termination can't race
            // ahead of the subscription.
            let _ = service_handle.offer(info_job);

            let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name.clone()), None);

            let stop_job = Job {
                request: sace_protocol::Request::Service(ServiceRequest {
                    sequence: Sequence(0),
                    label,
                    name: state.def.name.clone(),
                    command: String::new(),
                    flags: ServiceFlags::FromEvent,
                    op: ServiceOp::Stop,
                    info_key: InfoKey::ByLabel,
                    params: None,
                }),
                writer: subscriber,
            };
            if service_handle.offer(stop_job).is_err() {
                warn!("service executor is gone; can't stop event {:?} on delete", req.name);
            }
            return;
        }
    }

    let _ = writer.send_result(&WireResult::ok_none(req.sequence, req.name), None);
}

fn info_lookup(events: &mut HashMap<String, EventState>, req: EventRequest, writer: Arc<dyn Writer>) {
    let Some(state) = events.get_mut(&req.name) else {
        let _ = writer.send_result(&WireResult::fail(req.sequence, req.name, ResultStatus::Fail), None);
        return;
    };

    add_subscriber(&mut state.subscribers, writer.clone());

    let mut extra = Vec::new();
    let _ = sace_protocol::framing::write_bool(&mut extra, state.running);
    let _ = sace_protocol::framing::write_u8(&mut extra, state.def.flags.to_u8());
    let _ = sace_protocol::framing::write_string(&mut extra, &state.def.command);

    let mut result = WireResult::ok_none(req.sequence, req.name);
    result.kind = ResultType::Extra;
    result.extra = extra;
    let _ = writer.send_result(&result, None);
}

fn persist(events: &HashMap<String, EventState>, config_path: &Option<PathBuf>) {
    let Some(path) = config_path else { return };
    let defs: Vec<EventDefinition> = events.values().map(|s| s.def.clone()).collect();
    if let Err(err) = fs::write(path, config::format(&defs)) {
        warn!("failed to persist event config to {path:?}: {err}");
    }
}

fn poll_triggers(
    events: &mut HashMap<String, EventState>,
    properties: &PropertyStore,
    service_handle: &ExecutorHandle,
    feedback_tx: &mpsc::Sender<Feedback>,
) {
    for state in events.values_mut() {
        if state.running {
            continue;
        }
        if !evaluate_triggers(state, properties) {
            continue;
        }

        info!("event {:?} triggered, starting its service", state.def.name);
        state.running = true;

        let writer: Arc<dyn Writer> = Arc::new(EventWriter {
            id: crate::writer::next_writer_id(),
            event_name: state.def.name.clone(),
            feedback: feedback_tx.clone(),
        });
        let job = Job {
            request: sace_protocol::Request::Service(ServiceRequest {
                sequence: Sequence(0),
                label: Label::NONE,
                name: state.def.name.clone(),
                command: state.def.command.clone(),
                flags: ServiceFlags::FromEvent,
                op: ServiceOp::Start,
                info_key: InfoKey::ByName,
                params: Some(state.def.params.base.clone()),
            }),
            writer,
        };
        if service_handle.offer(job).is_err() {
            warn!("service executor is gone; can't start event {:?}", state.def.name);
            state.running = false;
        }
    }
}

fn evaluate_triggers(state: &mut EventState, properties: &PropertyStore) -> bool {
    let mut fired = false;
    for trigger in &state.def.params.triggers {
        match trigger {
            Trigger::Boot => {
                if !state.boot_fired {
                    state.boot_fired = true;
                    fired = true;
                }
            }
            Trigger::Property { key, value } => {
                let current = properties.get(key).map(str::to_string);
                let previous = state.last_values.insert(key.clone(), current.clone().unwrap_or_default());
                let changed = previous.as_deref() != current.as_deref();
                if changed && current.as_deref() == Some(value.as_str()) {
                    fired = true;
                }
            }
        }
    }
    fired
}

fn apply_feedback(
    events: &mut HashMap<String, EventState>,
    service_handle: &ExecutorHandle,
    feedback_tx: &mpsc::Sender<Feedback>,
    fb: Feedback,
) {
    match fb {
        Feedback::StartResult { event_name, status, label } => {
            let Some(state) = events.get_mut(&event_name) else { return };
            if status != ResultStatus::Ok {
                warn!("event {event_name:?}'s service failed to start: {status:?}");
                state.running = false;
                return;
            }
            state.label = label;
            // Subscribe our own internal writer to the service's eventual
            // termination, the same way an external "info by name" caller
            // would, so `restart_on_fail` learns when to re-arm.
            if let Some(label) = label {
                let subscriber: Arc<dyn Writer> = Arc::new(ResponseOnlyWriter {
                    inner: Arc::new(EventWriter {
                        id: crate::writer::next_writer_id(),
                        event_name: event_name.clone(),
                        feedback: feedback_tx.clone(),
                    }),
                });
                let job = Job {
                    request: sace_protocol::Request::Service(ServiceRequest {
                        sequence: Sequence(0),
                        label,
                        name: event_name.clone(),
                        command: String::new(),
                        flags: ServiceFlags::FromEvent,
                        op: ServiceOp::Info,
                        info_key: InfoKey::ByLabel,
                        params: None,
                    }),
                    writer: subscriber,
                };
                let _ = service_handle.offer(job);
            }
        }
        Feedback::Terminated { event_name, status } => {
            let Some(state) = events.get_mut(&event_name) else { return };
            debug!("event {event_name:?}'s service terminated: {status:?}");
            state.running = false;
            state.label = None;
            // Only an unrequested exit counts as a failure worth re-arming
            // for; a stop the user asked for shouldn't bounce right back.
            let crashed = status != ResponseStatus::FinishedByUser;
            if state.def.flags == EventFlags::RestartOnFail && crashed {
                state.boot_fired = false;
                state.last_values.clear();
            }

            let subscribers = std::mem::take(&mut state.subscribers);
            if subscribers.is_empty() {
                return;
            }
            let response = sace_protocol::Response {
                label: Label::NONE,
                name: event_name.clone(),
                kind: ResponseKind::Service,
                status,
                extra: Vec::new(),
            };
            for subscriber in &subscribers {
                if let Err(err) = subscriber.send_response(&response) {
                    debug!("failed to notify event subscriber for {event_name:?}: {err}");
                }
            }
        }
    }
}
