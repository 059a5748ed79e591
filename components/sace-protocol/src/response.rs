//! Unsolicited termination/status notifications pushed to every writer
//! subscribed to a tracked child or service, plus INFO snapshots.

use std::io::{Cursor, Read, Write};

use crate::error::Result;
use crate::framing::{
    read_extra, read_frame, read_string, read_u64, read_u8, write_extra, write_frame,
    write_string, write_u64, write_u8,
};
use crate::types::{Label, ResponseKind, ResponseStatus};

const FRAME_KIND_RESPONSE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub label: Label,
    pub name: String,
    pub kind: ResponseKind,
    pub status: ResponseStatus,
    /// Exit code, signal number, or an INFO snapshot blob, depending on
    /// `status`.
    pub extra: Vec<u8>,
}

impl Response {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut body = Vec::new();
        write_u64(&mut body, self.label.0)?;
        write_string(&mut body, &self.name)?;
        write_u8(&mut body, self.kind.to_u8())?;
        write_u8(&mut body, self.status.to_u8())?;
        write_extra(&mut body, &self.extra)?;
        write_frame(w, FRAME_KIND_RESPONSE, &body)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let (_frame_kind, body) = read_frame(r)?;
        Self::read_from_body(&mut Cursor::new(body))
    }

    /// Decodes the fields making up a response's frame body; see
    /// [`WireResult::read_from_body`] for why this exists separately.
    pub fn read_from_body<R: Read>(body: &mut R) -> Result<Self> {
        let label = Label(read_u64(body)?);
        let name = read_string(body)?;
        let kind = ResponseKind::try_from_u8(read_u8(body)?)?;
        let status = ResponseStatus::try_from_u8(read_u8(body)?)?;
        let extra = read_extra(body)?;
        Ok(Response {
            label,
            name,
            kind,
            status,
            extra,
        })
    }
}
