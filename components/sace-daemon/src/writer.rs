//! The per-client sink every executor replies through: one [`WireResult`]
//! per request, plus zero or more [`Response`] notifications pushed later
//! to whichever writers are subscribed to a given label.

use std::os::unix::io::RawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags, UnixAddr};
use nix::sys::uio::IoSlice;
use parking_lot::Mutex;

use sace_protocol::{Response, WireResult};

/// Identifies a writer by the connection it rides on, not by content, so
/// the same writer instance can be deduplicated out of a subscriber list
/// (mirrors the original `ServiceInfo::add_writer`'s equality-by-writer
/// check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(pub u64);

static NEXT_WRITER_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_writer_id() -> WriterId {
    WriterId(NEXT_WRITER_ID.fetch_add(1, Ordering::Relaxed))
}

pub trait Writer: Send + Sync {
    fn id(&self) -> WriterId;
    fn send_result(&self, result: &WireResult, fd: Option<RawFd>) -> std::io::Result<()>;
    fn send_response(&self, response: &Response) -> std::io::Result<()>;
}

/// Writes results and responses back down a client's Unix stream socket.
/// `fd`, when present, rides along as `SCM_RIGHTS` ancillary data on the
/// same sendmsg call as the result record, so the client never observes
/// the descriptor without its matching result.
pub struct ClientWriter {
    id: WriterId,
    stream: Mutex<UnixStream>,
}

impl ClientWriter {
    pub fn new(stream: UnixStream) -> Arc<Self> {
        Arc::new(ClientWriter {
            id: next_writer_id(),
            stream: Mutex::new(stream),
        })
    }
}

impl Writer for ClientWriter {
    fn id(&self) -> WriterId {
        self.id
    }

    fn send_result(&self, result: &WireResult, fd: Option<RawFd>) -> std::io::Result<()> {
        let mut body = Vec::new();
        result
            .write_to(&mut body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let guard = self.stream.lock();
        let raw_fd = std::os::unix::io::AsRawFd::as_raw_fd(&*guard);
        match fd {
            Some(fd) => {
                let iov = [IoSlice::new(&body)];
                let fds = [fd];
                let cmsg = [ControlMessage::ScmRights(&fds)];
                sendmsg::<UnixAddr>(raw_fd, &iov, &cmsg, MsgFlags::empty(), None)
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                Ok(())
            }
            None => {
                use std::io::Write;
                (&*guard).write_all(&body)
            }
        }
    }

    fn send_response(&self, response: &Response) -> std::io::Result<()> {
        let mut body = Vec::new();
        response
            .write_to(&mut body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        use std::io::Write;
        let guard = self.stream.lock();
        (&*guard).write_all(&body)
    }
}

/// Adds `writer` to `subscribers` unless an equal writer (by id) is
/// already present.
pub fn add_subscriber(subscribers: &mut Vec<Arc<dyn Writer>>, writer: Arc<dyn Writer>) {
    if !subscribers.iter().any(|w| w.id() == writer.id()) {
        subscribers.push(writer);
    }
}
