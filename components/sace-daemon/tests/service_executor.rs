//! Exercises the service executor: start a long-running service, ask for
//! its info, stop it and observe the termination response.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sace_daemon::executor::service;
use sace_daemon::executor::Job;
use sace_daemon::label::LabelAllocator;
use sace_daemon::writer::{ClientWriter, Writer};
use sace_protocol::{
    InfoKey, Label, ReplyRecord, Request, ResponseStatus, ResultStatus, ServiceFlags,
    ServiceOp, ServiceRequest, Sequence,
};

fn shell() -> PathBuf {
    PathBuf::from("/bin/sh")
}

#[test]
fn start_info_then_stop() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");
    let writer: Arc<dyn Writer> = ClientWriter::new(server_sock);
    let (handle, _join) = service::spawn_executor(shell(), Arc::new(LabelAllocator::new()));

    handle
        .offer(Job {
            request: Request::Service(ServiceRequest {
                sequence: Sequence(1),
                label: Label::NONE,
                name: "sleeper".into(),
                command: "sleep 5".into(),
                flags: ServiceFlags::Plain,
                op: ServiceOp::Start,
                info_key: InfoKey::ByName,
                params: None,
            }),
            writer: writer.clone(),
        })
        .ok();

    let mut client_sock = client_sock;
    let start_result = match ReplyRecord::read_from(&mut client_sock).expect("start result") {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(start_result.status, ResultStatus::Ok);
    let label = start_result.label().expect("start carries a label");

    handle
        .offer(Job {
            request: Request::Service(ServiceRequest {
                sequence: Sequence(2),
                label,
                name: "sleeper".into(),
                command: String::new(),
                flags: ServiceFlags::Plain,
                op: ServiceOp::Info,
                info_key: InfoKey::ByLabel,
                params: None,
            }),
            writer: writer.clone(),
        })
        .ok();

    let info_result = match ReplyRecord::read_from(&mut client_sock).expect("info result") {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(info_result.status, ResultStatus::Ok);

    handle
        .offer(Job {
            request: Request::Service(ServiceRequest {
                sequence: Sequence(3),
                label,
                name: "sleeper".into(),
                command: String::new(),
                flags: ServiceFlags::Plain,
                op: ServiceOp::Stop,
                info_key: InfoKey::ByLabel,
                params: None,
            }),
            writer: writer.clone(),
        })
        .ok();

    let stop_result = match ReplyRecord::read_from(&mut client_sock).expect("stop result") {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(stop_result.status, ResultStatus::Ok);

    client_sock
        .set_read_timeout(Some(Duration::from_secs(3)))
        .expect("set timeout");
    let termination = match ReplyRecord::read_from(&mut client_sock).expect("termination response") {
        ReplyRecord::Response(r) => r,
        other => panic!("expected a response, got {other:?}"),
    };
    assert_eq!(termination.status, ResponseStatus::FinishedByUser);
    assert_eq!(termination.label, label);
}

#[test]
fn starting_a_duplicate_name_fails_with_exists() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");
    let writer: Arc<dyn Writer> = ClientWriter::new(server_sock);
    let (handle, _join) = service::spawn_executor(shell(), Arc::new(LabelAllocator::new()));

    let start = |sequence: u32, writer: Arc<dyn Writer>| {
        handle
            .offer(Job {
                request: Request::Service(ServiceRequest {
                    sequence: Sequence(sequence),
                    label: Label::NONE,
                    name: "dup".into(),
                    command: "sleep 5".into(),
                    flags: ServiceFlags::Plain,
                    op: ServiceOp::Start,
                    info_key: InfoKey::ByName,
                    params: None,
                }),
                writer,
            })
            .ok();
    };

    start(1, writer.clone());
    start(2, writer.clone());

    let mut client_sock = client_sock;
    let first = match ReplyRecord::read_from(&mut client_sock).expect("first result") {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(first.status, ResultStatus::Ok);

    let second = match ReplyRecord::read_from(&mut client_sock).expect("second result") {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(second.status, ResultStatus::Exists);
}
