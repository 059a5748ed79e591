//! Thin client over the broker's wire protocol: one blocking call per
//! request, with unsolicited [`Response`] notifications queued up for the
//! caller to drain separately.

pub mod error;
pub mod sequence;

pub use error::{ClientError, Result};

use std::collections::VecDeque;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use nix::sys::socket::{recv, recvmsg, ControlMessageOwned, MsgFlags, UnixAddr};
use nix::sys::uio::IoSliceMut;
use parking_lot::Mutex;

use sace_protocol::{
    Direction, EventFlags, EventOp, EventParams, EventRequest, InfoKey, Label, NormalOp,
    NormalRequest, Params, ReplyRecord, Request, Response, ResultStatus, Sequence, ServiceFlags,
    ServiceOp, ServiceRequest, WireResult,
};

use crate::sequence::SequenceAllocator;

/// A connection to the broker. Not `Sync`-free-for-all: every method
/// locks the underlying stream for the duration of one request/reply
/// round trip, so concurrent callers serialize rather than corrupt each
/// other's frames.
pub struct Client {
    stream: Mutex<UnixStream>,
    sequences: SequenceAllocator,
    pending_responses: Mutex<VecDeque<Response>>,
}

impl Client {
    pub fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)?;
        Ok(Client {
            stream: Mutex::new(stream),
            sequences: SequenceAllocator::new(),
            pending_responses: Mutex::new(VecDeque::new()),
        })
    }

    /// Pops the oldest termination/status notification queued up while
    /// waiting on other requests' results, if any.
    pub fn poll_response(&self) -> Option<Response> {
        self.pending_responses.lock().pop_front()
    }

    fn roundtrip(&self, request: &Request) -> Result<WireResult> {
        let mut stream = self.stream.lock();
        request.write_to(&mut *stream)?;

        loop {
            match ReplyRecord::read_from(&mut *stream)? {
                ReplyRecord::Result(result) => {
                    if result.sequence != request.sequence() {
                        return Err(ClientError::SequenceMismatch {
                            expected: request.sequence(),
                            got: result.sequence,
                        });
                    }
                    return Ok(result);
                }
                ReplyRecord::Response(response) => {
                    self.pending_responses.lock().push_back(response);
                }
            }
        }
    }

    fn roundtrip_ok(&self, request: &Request) -> Result<WireResult> {
        let result = self.roundtrip(request)?;
        if result.status != ResultStatus::Ok {
            return Err(ClientError::Failed(result.status));
        }
        Ok(result)
    }

    pub fn start_normal(&self, name: &str, command: &str, direction: Direction, params: Option<Params>) -> Result<(Label, OwnedFd)> {
        let sequence = self.sequences.allocate();
        let request = Request::Normal(NormalRequest {
            sequence,
            label: Label::NONE,
            name: name.to_string(),
            command: command.to_string(),
            direction,
            op: NormalOp::Start,
            params,
        });

        {
            let mut stream = self.stream.lock();
            request.write_to(&mut *stream)?;
        }
        let (result, fd) = self.recv_result_with_fd(sequence)?;
        if result.status != ResultStatus::Ok {
            return Err(ClientError::Failed(result.status));
        }
        let label = result.label().ok_or(ClientError::Failed(result.status))?;
        let fd = fd.ok_or(ClientError::Failed(result.status))?;
        Ok((label, fd))
    }

    pub fn close_normal(&self, label: Label, name: &str) -> Result<()> {
        let sequence = self.sequences.allocate();
        let request = Request::Normal(NormalRequest {
            sequence,
            label,
            name: name.to_string(),
            command: String::new(),
            direction: Direction::Read,
            op: NormalOp::Close,
            params: None,
        });
        self.roundtrip_ok(&request)?;
        Ok(())
    }

    pub fn start_service(&self, name: &str, command: &str, params: Option<Params>) -> Result<Label> {
        let sequence = self.sequences.allocate();
        let request = Request::Service(ServiceRequest {
            sequence,
            label: Label::NONE,
            name: name.to_string(),
            command: command.to_string(),
            flags: ServiceFlags::Plain,
            op: ServiceOp::Start,
            info_key: InfoKey::ByName,
            params,
        });
        let result = self.roundtrip_ok(&request)?;
        result.label().ok_or(ClientError::Failed(ResultStatus::Fail))
    }

    pub fn stop_service(&self, label: Label, name: &str) -> Result<()> {
        self.service_op(label, name, ServiceOp::Stop)
    }

    pub fn pause_service(&self, label: Label, name: &str) -> Result<()> {
        self.service_op(label, name, ServiceOp::Pause)
    }

    pub fn restart_service(&self, label: Label, name: &str) -> Result<()> {
        self.service_op(label, name, ServiceOp::Restart)
    }

    fn service_op(&self, label: Label, name: &str, op: ServiceOp) -> Result<()> {
        let sequence = self.sequences.allocate();
        let request = Request::Service(ServiceRequest {
            sequence,
            label,
            name: name.to_string(),
            command: String::new(),
            flags: ServiceFlags::Plain,
            op,
            info_key: InfoKey::ByLabel,
            params: None,
        });
        self.roundtrip_ok(&request)?;
        Ok(())
    }

    pub fn service_info_by_name(&self, name: &str) -> Result<WireResult> {
        let sequence = self.sequences.allocate();
        let request = Request::Service(ServiceRequest {
            sequence,
            label: Label::NONE,
            name: name.to_string(),
            command: String::new(),
            flags: ServiceFlags::Plain,
            op: ServiceOp::Info,
            info_key: InfoKey::ByName,
            params: None,
        });
        self.roundtrip_ok(&request)
    }

    pub fn add_event(&self, name: &str, command: &str, flags: EventFlags, params: Option<EventParams>) -> Result<()> {
        let sequence = self.sequences.allocate();
        let request = Request::Event(EventRequest {
            sequence,
            name: name.to_string(),
            command: command.to_string(),
            op: EventOp::Add,
            flags,
            params,
            delete_stop_flag: false,
        });
        self.roundtrip_ok(&request)?;
        Ok(())
    }

    /// Removes an event definition. If `stop` is set and the event's
    /// service is currently running, the broker stops it as part of the
    /// same request before replying.
    pub fn delete_event(&self, name: &str, stop: bool) -> Result<()> {
        let sequence = self.sequences.allocate();
        let request = Request::Event(EventRequest {
            sequence,
            name: name.to_string(),
            command: String::new(),
            op: EventOp::Delete,
            flags: EventFlags::None,
            params: None,
            delete_stop_flag: stop,
        });
        self.roundtrip_ok(&request)?;
        Ok(())
    }

    /// Reads one result record that may carry a passed fd as `SCM_RIGHTS`
    /// ancillary data, retrying the sequence check against responses the
    /// same way [`Client::roundtrip`] does.
    fn recv_result_with_fd(&self, expected: Sequence) -> Result<(WireResult, Option<OwnedFd>)> {
        let mut stream = self.stream.lock();
        loop {
            let (body, fd) = read_frame_capturing_fd(&mut stream)?;
            let mut cursor = std::io::Cursor::new(body);
            let (kind, inner) = sace_protocol::framing::read_frame(&mut cursor)?;
            let mut inner_cursor = std::io::Cursor::new(inner);
            match kind {
                0 => {
                    let result = WireResult::read_from_body(&mut inner_cursor)?;
                    if result.sequence != expected {
                        return Err(ClientError::SequenceMismatch { expected, got: result.sequence });
                    }
                    return Ok((result, fd));
                }
                1 => {
                    let response = Response::read_from_body(&mut inner_cursor)?;
                    self.pending_responses.lock().push_back(response);
                }
                other => return Err(ClientError::Protocol(sace_protocol::ProtocolError::UnknownDiscriminant { field: "frame kind", value: other })),
            }
        }
    }
}

/// Peeks the 5-byte length+kind header, then performs one `recvmsg` sized
/// to the whole frame so any `SCM_RIGHTS` ancillary data sent alongside
/// it is captured. Assumes the header arrives whole in the first peek,
/// true for the small, local, single-writer-at-a-time traffic this
/// protocol produces.
fn read_frame_capturing_fd(stream: &mut UnixStream) -> Result<(Vec<u8>, Option<OwnedFd>)> {
    let raw_fd: RawFd = stream.as_raw_fd();

    let mut header = [0u8; 5];
    let mut peeked = 0;
    while peeked < header.len() {
        let n = recv(raw_fd, &mut header[peeked..], MsgFlags::MSG_PEEK)?;
        if n == 0 {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "broker closed the connection",
            )));
        }
        peeked += n;
    }

    let declared_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let total_len = 4 + declared_len as usize;

    let mut buf = vec![0u8; total_len];
    let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);
    let mut iov = [IoSliceMut::new(&mut buf)];
    let msg = recvmsg::<UnixAddr>(raw_fd, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())?;

    let mut fd = None;
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(first) = fds.into_iter().next() {
                fd = Some(unsafe { OwnedFd::from_raw_fd(first) });
            }
        }
    }

    Ok((buf, fd))
}
