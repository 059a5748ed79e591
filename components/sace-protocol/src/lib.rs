//! Wire records exchanged between the broker daemon and its clients.
//!
//! A client writes a stream of [`Request`] frames and reads back a stream
//! that interleaves [`WireResult`] frames (one per request, in request
//! order) with [`Response`] frames (zero or more, at any time, for any
//! label the client has subscribed to). [`ReplyRecord`] is the decoded
//! union of the two, keyed off the frame kind byte.

pub mod error;
pub mod framing;
pub mod params;
pub mod request;
pub mod result;
pub mod response;
pub mod types;

pub use error::{ProtocolError, Result};
pub use params::{EventParams, IdSpec, Params, RlimitSpec, Trigger};
pub use request::{EventRequest, NormalRequest, Request, ServiceRequest};
pub use result::WireResult;
pub use response::Response;
pub use types::{
    Direction, EventFlags, EventOp, InfoKey, Label, NormalOp, RequestKind, ResponseKind,
    ResponseStatus, ResultStatus, ResultType, Sequence, ServiceFlags, ServiceOp,
};

use std::io::{Cursor, Read, Write};

/// Either half of the reply stream a client reads from the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyRecord {
    Result(WireResult),
    Response(Response),
}

impl ReplyRecord {
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let (kind, body) = framing::read_frame(r)?;
        let mut cursor = Cursor::new(body);
        match kind {
            0 => Ok(ReplyRecord::Result(decode_result_body(&mut cursor)?)),
            1 => Ok(ReplyRecord::Response(decode_response_body(&mut cursor)?)),
            other => Err(ProtocolError::UnknownDiscriminant {
                field: "frame kind",
                value: other,
            }),
        }
    }
}

fn decode_result_body<R: Read>(r: &mut R) -> Result<WireResult> {
    use framing::{read_extra, read_string, read_u32, read_u8};
    let sequence = Sequence(read_u32(r)?);
    let name = read_string(r)?;
    let status = ResultStatus::try_from_u8(read_u8(r)?)?;
    let kind = ResultType::try_from_u8(read_u8(r)?)?;
    let extra = read_extra(r)?;
    Ok(WireResult {
        sequence,
        name,
        status,
        kind,
        extra,
    })
}

fn decode_response_body<R: Read>(r: &mut R) -> Result<Response> {
    use framing::{read_extra, read_string, read_u64, read_u8};
    let label = Label(read_u64(r)?);
    let name = read_string(r)?;
    let kind = ResponseKind::try_from_u8(read_u8(r)?)?;
    let status = ResponseStatus::try_from_u8(read_u8(r)?)?;
    let extra = read_extra(r)?;
    Ok(Response {
        label,
        name,
        kind,
        status,
        extra,
    })
}

/// Writes either a result or a response using its own frame kind byte.
/// `WireResult::write_to`/`Response::write_to` already do this; this enum
/// just lets call sites that hold a `Vec<ReplyRecord>` write them back out
/// uniformly (used by the daemon-side writer and by tests).
impl ReplyRecord {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            ReplyRecord::Result(res) => res.write_to(w),
            ReplyRecord::Response(resp) => resp.write_to(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{IdSpec, Params, RlimitSpec, Trigger};
    use std::io::Cursor;

    #[test]
    fn normal_request_round_trips() {
        let req = Request::Normal(NormalRequest {
            sequence: Sequence(42),
            label: Label::NONE,
            name: "logcat".into(),
            command: "logcat -b main".into(),
            direction: Direction::Read,
            op: NormalOp::Start,
            params: Some(Params {
                uid: Some(IdSpec::Name("shell".into())),
                gid: Some(IdSpec::Numeric(2000)),
                supplementary_gids: vec![IdSpec::Numeric(1007)],
                rlimits: vec![RlimitSpec {
                    resource: "nofile".into(),
                    soft: 1024,
                    hard: 4096,
                }],
                security_label: Some("u:r:shell:s0".into()),
                capabilities: vec!["CAP_NET_ADMIN".into()],
            }),
        });

        let mut buf = Vec::new();
        req.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = Request::read_from(&mut cursor).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn service_request_without_params_round_trips() {
        let req = Request::Service(ServiceRequest {
            sequence: Sequence(7),
            label: Label(99),
            name: "radio".into(),
            command: String::new(),
            flags: ServiceFlags::Plain,
            op: ServiceOp::Stop,
            info_key: InfoKey::ByLabel,
            params: None,
        });

        let mut buf = Vec::new();
        req.write_to(&mut buf).unwrap();
        let decoded = Request::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn event_request_with_triggers_round_trips() {
        let req = Request::Event(EventRequest {
            sequence: Sequence(1),
            name: "watchdog".into(),
            command: "watchdog --once".into(),
            op: EventOp::Add,
            flags: EventFlags::RestartOnFail,
            params: Some(crate::params::EventParams {
                base: Params::default(),
                triggers: vec![
                    Trigger::Boot,
                    Trigger::Property {
                        key: "sys.boot_completed".into(),
                        value: "1".into(),
                    },
                ],
            }),
            delete_stop_flag: false,
        });

        let mut buf = Vec::new();
        req.write_to(&mut buf).unwrap();
        let decoded = Request::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn result_round_trips_as_reply_record() {
        let result = WireResult::ok_label(Sequence(3), "radio", Label(123));
        let mut buf = Vec::new();
        result.write_to(&mut buf).unwrap();

        match ReplyRecord::read_from(&mut Cursor::new(buf)).unwrap() {
            ReplyRecord::Result(decoded) => {
                assert_eq!(decoded, result);
                assert_eq!(decoded.label(), Some(Label(123)));
            }
            ReplyRecord::Response(_) => panic!("expected a result record"),
        }
    }

    #[test]
    fn response_round_trips_as_reply_record() {
        let resp = Response {
            label: Label(55),
            name: "radio".into(),
            kind: ResponseKind::Service,
            status: ResponseStatus::Signal,
            extra: vec![15],
        };
        let mut buf = Vec::new();
        resp.write_to(&mut buf).unwrap();

        match ReplyRecord::read_from(&mut Cursor::new(buf)).unwrap() {
            ReplyRecord::Response(decoded) => assert_eq!(decoded, resp),
            ReplyRecord::Result(_) => panic!("expected a response record"),
        }
    }

    #[test]
    fn extra_over_limit_is_rejected() {
        let result = WireResult {
            sequence: Sequence(1),
            name: "x".into(),
            status: ResultStatus::Ok,
            kind: ResultType::Extra,
            extra: vec![0u8; framing::MAX_EXTRA_LEN + 1],
        };
        let mut buf = Vec::new();
        assert!(result.write_to(&mut buf).is_err());
    }
}
