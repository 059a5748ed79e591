//! Byte-level primitives shared by every wire record.
//!
//! Every record is little-endian, begins with a `u32` length followed by a
//! `u8` kind byte, and carries its variable-length fields as `u32`-prefixed
//! blobs. These helpers do the repetitive part; `request.rs`/`result.rs`/
//! `response.rs` build records out of them.

use std::io::{Read, Write};

use crate::error::{ProtocolError, Result};

/// Hard cap on the size of the fixed "extra" payload carried by results and
/// status responses. Matches the original broker's scratch buffer.
pub const MAX_EXTRA_LEN: usize = 256;

/// Defensive cap on a whole record's declared length. Nothing legitimate
/// this protocol sends gets remotely close to this; it exists so a
/// corrupted or hostile peer can't make a reader allocate unbounded memory.
pub const MAX_RECORD_LEN: u32 = 64 * 1024;

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> Result<()> {
    write_u8(w, v as u8)
}

pub fn read_bool<R: Read>(r: &mut R) -> Result<bool> {
    Ok(read_u8(r)? != 0)
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_bytes<W: Write>(w: &mut W, v: &[u8]) -> Result<()> {
    write_u32(w, v.len() as u32)?;
    w.write_all(v)?;
    Ok(())
}

pub fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(r)?;
    if len > MAX_RECORD_LEN {
        return Err(ProtocolError::RecordTooLarge {
            declared: len,
            max: MAX_RECORD_LEN,
        });
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_string<W: Write>(w: &mut W, v: &str) -> Result<()> {
    write_bytes(w, v.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let buf = read_bytes(r)?;
    String::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Writes the fixed-size "extra" blob: a `u32` length followed by up to
/// [`MAX_EXTRA_LEN`] bytes. Callers are expected to have already validated
/// the length; this only re-checks it defensively.
pub fn write_extra<W: Write>(w: &mut W, v: &[u8]) -> Result<()> {
    if v.len() > MAX_EXTRA_LEN {
        return Err(ProtocolError::ExtraTooLarge {
            len: v.len(),
            max: MAX_EXTRA_LEN,
        });
    }
    write_bytes(w, v)
}

pub fn read_extra<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let buf = read_bytes(r)?;
    if buf.len() > MAX_EXTRA_LEN {
        return Err(ProtocolError::ExtraTooLarge {
            len: buf.len(),
            max: MAX_EXTRA_LEN,
        });
    }
    Ok(buf)
}

/// Buffers `body` behind a length prefix and writes the whole frame,
/// `kind` included, in one call.
pub fn write_frame<W: Write>(w: &mut W, kind: u8, body: &[u8]) -> Result<()> {
    let len = body.len() as u32 + 1; // +1 for the kind byte itself
    write_u32(w, len)?;
    write_u8(w, kind)?;
    w.write_all(body)?;
    Ok(())
}

/// Reads a whole frame and returns `(kind, body)`, where `body` excludes
/// the length and kind fields already consumed.
pub fn read_frame<R: Read>(r: &mut R) -> Result<(u8, Vec<u8>)> {
    let len = read_u32(r)?;
    if len == 0 || len > MAX_RECORD_LEN {
        return Err(ProtocolError::RecordTooLarge {
            declared: len,
            max: MAX_RECORD_LEN,
        });
    }
    let kind = read_u8(r)?;
    let mut body = vec![0u8; (len - 1) as usize];
    r.read_exact(&mut body)?;
    Ok((kind, body))
}
