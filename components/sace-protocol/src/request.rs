//! The single record a client ever sends: a request for the normal,
//! service or event executor, framed with [`crate::framing::write_frame`].

use std::io::{Cursor, Read, Write};

use crate::error::Result;
use crate::framing::{
    read_bool, read_frame, read_string, read_u32, read_u64, read_u8, write_bool, write_frame,
    write_string, write_u32, write_u64, write_u8,
};
use crate::params::{EventParams, Params};
use crate::types::{
    Direction, EventFlags, EventOp, InfoKey, Label, NormalOp, RequestKind, Sequence, ServiceFlags,
    ServiceOp,
};

const FRAME_KIND_REQUEST: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalRequest {
    pub sequence: Sequence,
    /// Set only on `Close`; ignored on `Start`.
    pub label: Label,
    pub name: String,
    pub command: String,
    pub direction: Direction,
    pub op: NormalOp,
    pub params: Option<Params>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub sequence: Sequence,
    /// Set on every op but `Start`; ignored there.
    pub label: Label,
    pub name: String,
    pub command: String,
    pub flags: ServiceFlags,
    pub op: ServiceOp,
    /// Only meaningful for `Info`.
    pub info_key: InfoKey,
    pub params: Option<Params>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub sequence: Sequence,
    pub name: String,
    pub command: String,
    pub op: EventOp,
    pub flags: EventFlags,
    pub params: Option<EventParams>,
    /// Only meaningful for `Delete`: stop the event's running service (if
    /// any) as part of removing the definition.
    pub delete_stop_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Normal(NormalRequest),
    Service(ServiceRequest),
    Event(EventRequest),
}

impl Request {
    pub fn sequence(&self) -> Sequence {
        match self {
            Request::Normal(r) => r.sequence,
            Request::Service(r) => r.sequence,
            Request::Event(r) => r.sequence,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut body = Vec::new();
        match self {
            Request::Normal(r) => {
                write_u8(&mut body, RequestKind::Normal.to_u8())?;
                write_u32(&mut body, r.sequence.0)?;
                write_u64(&mut body, r.label.0)?;
                write_string(&mut body, &r.name)?;
                write_string(&mut body, &r.command)?;
                write_u8(&mut body, r.direction.to_u8())?;
                write_u8(&mut body, r.op.to_u8())?;
                write_params(&mut body, &r.params)?;
            }
            Request::Service(r) => {
                write_u8(&mut body, RequestKind::Service.to_u8())?;
                write_u32(&mut body, r.sequence.0)?;
                write_u64(&mut body, r.label.0)?;
                write_string(&mut body, &r.name)?;
                write_string(&mut body, &r.command)?;
                write_u8(&mut body, r.flags.to_u8())?;
                write_u8(&mut body, r.op.to_u8())?;
                write_u8(&mut body, r.info_key.to_u8())?;
                write_params(&mut body, &r.params)?;
            }
            Request::Event(r) => {
                write_u8(&mut body, RequestKind::Event.to_u8())?;
                write_u32(&mut body, r.sequence.0)?;
                write_string(&mut body, &r.name)?;
                write_string(&mut body, &r.command)?;
                write_u8(&mut body, r.op.to_u8())?;
                write_u8(&mut body, r.flags.to_u8())?;
                write_bool(&mut body, r.delete_stop_flag)?;
                match &r.params {
                    Some(p) => {
                        write_bool(&mut body, true)?;
                        p.encode(&mut body)?;
                    }
                    None => write_bool(&mut body, false)?,
                }
            }
        }
        write_frame(w, FRAME_KIND_REQUEST, &body)
    }

    /// Reads one complete frame (length, frame kind, body) and decodes it.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let (_frame_kind, body) = read_frame(r)?;
        Self::decode_body(&mut Cursor::new(body))
    }

    fn decode_body<R: Read>(r: &mut R) -> Result<Self> {
        let kind = RequestKind::try_from_u8(read_u8(r)?)?;
        let sequence = Sequence(read_u32(r)?);
        match kind {
            RequestKind::Normal => {
                let label = Label(read_u64(r)?);
                let name = read_string(r)?;
                let command = read_string(r)?;
                let direction = Direction::try_from_u8(read_u8(r)?)?;
                let op = NormalOp::try_from_u8(read_u8(r)?)?;
                let params = read_params(r)?;
                Ok(Request::Normal(NormalRequest {
                    sequence,
                    label,
                    name,
                    command,
                    direction,
                    op,
                    params,
                }))
            }
            RequestKind::Service => {
                let label = Label(read_u64(r)?);
                let name = read_string(r)?;
                let command = read_string(r)?;
                let flags = ServiceFlags::try_from_u8(read_u8(r)?)?;
                let op = ServiceOp::try_from_u8(read_u8(r)?)?;
                let info_key = InfoKey::try_from_u8(read_u8(r)?)?;
                let params = read_params(r)?;
                Ok(Request::Service(ServiceRequest {
                    sequence,
                    label,
                    name,
                    command,
                    flags,
                    op,
                    info_key,
                    params,
                }))
            }
            RequestKind::Event => {
                let name = read_string(r)?;
                let command = read_string(r)?;
                let op = EventOp::try_from_u8(read_u8(r)?)?;
                let flags = EventFlags::try_from_u8(read_u8(r)?)?;
                let delete_stop_flag = read_bool(r)?;
                let params = if read_bool(r)? {
                    Some(EventParams::decode(r)?)
                } else {
                    None
                };
                Ok(Request::Event(EventRequest {
                    sequence,
                    name,
                    command,
                    op,
                    flags,
                    params,
                    delete_stop_flag,
                }))
            }
        }
    }
}

fn write_params<W: Write>(w: &mut W, params: &Option<Params>) -> Result<()> {
    match params {
        Some(p) => {
            write_bool(w, true)?;
            p.encode(w)
        }
        None => write_bool(w, false),
    }
}

fn read_params<R: Read>(r: &mut R) -> Result<Option<Params>> {
    if read_bool(r)? {
        Ok(Some(Params::decode(r)?))
    } else {
        Ok(None)
    }
}
