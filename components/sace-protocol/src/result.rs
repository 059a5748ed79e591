//! The reply the daemon sends once, synchronously, for every request.

use std::io::{Cursor, Read, Write};

use crate::error::Result;
use crate::framing::{
    read_extra, read_frame, read_string, read_u32, write_extra, write_frame, write_string,
    write_u32, write_u8,
};
use crate::types::{ResultStatus, ResultType, Sequence};

const FRAME_KIND_RESULT: u8 = 0;

/// Body of a result record. `extra` is interpreted according to `kind`:
/// empty when `kind` is `None`, a label when `Label`, a `SpawnOk`-style
/// snapshot blob when `Extra`. A `Fd` result carries no in-band payload —
/// the descriptor itself travels as `SCM_RIGHTS` ancillary data alongside
/// this record, attached by the transport layer rather than encoded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResult {
    pub sequence: Sequence,
    pub name: String,
    pub status: ResultStatus,
    pub kind: ResultType,
    pub extra: Vec<u8>,
}

impl WireResult {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut body = Vec::new();
        write_u32(&mut body, self.sequence.0)?;
        write_string(&mut body, &self.name)?;
        write_u8(&mut body, self.status.to_u8())?;
        write_u8(&mut body, self.kind.to_u8())?;
        write_extra(&mut body, &self.extra)?;
        write_frame(w, FRAME_KIND_RESULT, &body)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let (_frame_kind, body) = read_frame(r)?;
        Self::read_from_body(&mut Cursor::new(body))
    }

    /// Decodes the fields making up a result's frame body, given a reader
    /// already positioned past the frame's length and kind byte. Used by
    /// callers that had to read the raw frame bytes themselves (to also
    /// capture ancillary `SCM_RIGHTS` data alongside it).
    pub fn read_from_body<R: Read>(body: &mut R) -> Result<Self> {
        let sequence = Sequence(read_u32(body)?);
        let name = read_string(body)?;
        let status = ResultStatus::try_from_u8(crate::framing::read_u8(body)?)?;
        let kind = ResultType::try_from_u8(crate::framing::read_u8(body)?)?;
        let extra = read_extra(body)?;
        Ok(WireResult {
            sequence,
            name,
            status,
            kind,
            extra,
        })
    }

    pub fn ok_none(sequence: Sequence, name: impl Into<String>) -> Self {
        WireResult {
            sequence,
            name: name.into(),
            status: ResultStatus::Ok,
            kind: ResultType::None,
            extra: Vec::new(),
        }
    }

    pub fn ok_label(sequence: Sequence, name: impl Into<String>, label: crate::types::Label) -> Self {
        WireResult {
            sequence,
            name: name.into(),
            status: ResultStatus::Ok,
            kind: ResultType::Label,
            extra: label.0.to_le_bytes().to_vec(),
        }
    }

    pub fn fail(sequence: Sequence, name: impl Into<String>, status: ResultStatus) -> Self {
        WireResult {
            sequence,
            name: name.into(),
            status,
            kind: ResultType::None,
            extra: Vec::new(),
        }
    }

    /// Decodes the label carried in `extra` for a `kind == Label` result.
    pub fn label(&self) -> Option<crate::types::Label> {
        if self.kind != ResultType::Label || self.extra.len() != 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.extra);
        Some(crate::types::Label(u64::from_le_bytes(buf)))
    }
}
