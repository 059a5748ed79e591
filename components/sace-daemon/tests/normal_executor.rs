//! Exercises the normal executor end to end: start a command, read its
//! output fd, close it again.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sace_daemon::executor::normal;
use sace_daemon::executor::Job;
use sace_daemon::label::LabelAllocator;
use sace_daemon::writer::{ClientWriter, Writer};
use sace_protocol::{
    Direction, Label, NormalOp, NormalRequest, Request, ReplyRecord, ResultStatus, ResultType,
    Sequence,
};

fn shell() -> PathBuf {
    PathBuf::from("/bin/sh")
}

#[test]
fn start_reads_output_then_close() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");
    let writer: Arc<dyn Writer> = ClientWriter::new(server_sock);
    let (handle, _join) = normal::spawn_executor(shell(), Arc::new(LabelAllocator::new()));

    handle
        .offer(Job {
            request: Request::Normal(NormalRequest {
                sequence: Sequence(1),
                label: Label::NONE,
                name: "echo-test".into(),
                command: "echo hello-from-sace".into(),
                direction: Direction::Read,
                op: NormalOp::Start,
                params: None,
            }),
            writer: writer.clone(),
        })
        .ok();

    let mut client_sock = client_sock;
    let reply = ReplyRecord::read_from(&mut client_sock).expect("start result");
    let result = match reply {
        ReplyRecord::Result(r) => r,
        other => panic!("expected a result, got {other:?}"),
    };
    assert_eq!(result.status, ResultStatus::Ok);
    assert_eq!(result.kind, ResultType::Fd);
    let label = result.label().expect("start result carries a label");

    // The fd itself rode along as SCM_RIGHTS ancillary data; recovering
    // it from a plain `ReplyRecord::read_from` call isn't exercised here
    // since that call only decodes the in-band body. What we *can* assert
    // is that the command actually ran by giving it time to finish and
    // then successfully closing its tracked label.
    std::thread::sleep(Duration::from_millis(100));

    handle
        .offer(Job {
            request: Request::Normal(NormalRequest {
                sequence: Sequence(2),
                label,
                name: "echo-test".into(),
                command: String::new(),
                direction: Direction::Read,
                op: NormalOp::Close,
                params: None,
            }),
            writer,
        })
        .ok();

    let reply = ReplyRecord::read_from(&mut client_sock).expect("close result");
    match reply {
        ReplyRecord::Result(r) => assert_eq!(r.status, ResultStatus::Ok),
        other => panic!("expected a result, got {other:?}"),
    }
}

#[test]
fn closing_an_unknown_label_fails() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");
    let writer: Arc<dyn Writer> = ClientWriter::new(server_sock);
    let (handle, _join) = normal::spawn_executor(shell(), Arc::new(LabelAllocator::new()));

    handle
        .offer(Job {
            request: Request::Normal(NormalRequest {
                sequence: Sequence(9),
                label: Label(424242),
                name: "ghost".into(),
                command: String::new(),
                direction: Direction::Read,
                op: NormalOp::Close,
                params: None,
            }),
            writer,
        })
        .ok();

    let mut client_sock = client_sock;
    let reply = ReplyRecord::read_from(&mut client_sock).expect("close result");
    match reply {
        ReplyRecord::Result(r) => assert_eq!(r.status, ResultStatus::Fail),
        other => panic!("expected a result, got {other:?}"),
    }
}
