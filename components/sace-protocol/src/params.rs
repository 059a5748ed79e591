//! The optional `Params` block: everything a request can ask the daemon to
//! apply to a freshly forked child before it execs.

use std::io::{Read, Write};

use crate::error::{ProtocolError, Result};
use crate::framing::{
    read_bool, read_string, read_u32, read_u64, read_u8, write_bool, write_string, write_u32,
    write_u64, write_u8,
};

/// A uid/gid that may be given symbolically or numerically, exactly as the
/// config file and the command line accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSpec {
    Numeric(u32),
    Name(String),
}

impl IdSpec {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            IdSpec::Numeric(id) => {
                write_u8(w, 0)?;
                write_u32(w, *id)
            }
            IdSpec::Name(name) => {
                write_u8(w, 1)?;
                write_string(w, name)
            }
        }
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        match read_u8(r)? {
            0 => Ok(IdSpec::Numeric(read_u32(r)?)),
            1 => Ok(IdSpec::Name(read_string(r)?)),
            other => Err(ProtocolError::UnknownDiscriminant {
                field: "IdSpec",
                value: other,
            }),
        }
    }
}

/// A single `setrlimit` entry, named the way the ini config and the original
/// `rlimit_map` table name them (`"nofile"`, `"nproc"`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlimitSpec {
    pub resource: String,
    pub soft: u64,
    pub hard: u64,
}

impl RlimitSpec {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_string(w, &self.resource)?;
        write_u64(w, self.soft)?;
        write_u64(w, self.hard)
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        Ok(RlimitSpec {
            resource: read_string(r)?,
            soft: read_u64(r)?,
            hard: read_u64(r)?,
        })
    }
}

/// What a child should be spawned with: credentials, capability set,
/// security label and resource limits. Absent on a request means "inherit
/// the daemon's own ambient defaults".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub uid: Option<IdSpec>,
    pub gid: Option<IdSpec>,
    pub supplementary_gids: Vec<IdSpec>,
    pub rlimits: Vec<RlimitSpec>,
    pub security_label: Option<String>,
    /// Capability names, e.g. `"CAP_NET_BIND_SERVICE"`, as they appear in
    /// the ini config's `capability` line.
    pub capabilities: Vec<String>,
}

impl Params {
    pub(crate) fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        encode_option_id(w, &self.uid)?;
        encode_option_id(w, &self.gid)?;
        write_u32(w, self.supplementary_gids.len() as u32)?;
        for gid in &self.supplementary_gids {
            gid.encode(w)?;
        }
        write_u32(w, self.rlimits.len() as u32)?;
        for rl in &self.rlimits {
            rl.encode(w)?;
        }
        match &self.security_label {
            Some(label) => {
                write_bool(w, true)?;
                write_string(w, label)?;
            }
            None => write_bool(w, false)?,
        }
        write_u32(w, self.capabilities.len() as u32)?;
        for cap in &self.capabilities {
            write_string(w, cap)?;
        }
        Ok(())
    }

    pub(crate) fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let uid = decode_option_id(r)?;
        let gid = decode_option_id(r)?;
        let supp_count = read_u32(r)?;
        let mut supplementary_gids = Vec::with_capacity(supp_count as usize);
        for _ in 0..supp_count {
            supplementary_gids.push(IdSpec::decode(r)?);
        }
        let rlimit_count = read_u32(r)?;
        let mut rlimits = Vec::with_capacity(rlimit_count as usize);
        for _ in 0..rlimit_count {
            rlimits.push(RlimitSpec::decode(r)?);
        }
        let security_label = if read_bool(r)? {
            Some(read_string(r)?)
        } else {
            None
        };
        let cap_count = read_u32(r)?;
        let mut capabilities = Vec::with_capacity(cap_count as usize);
        for _ in 0..cap_count {
            capabilities.push(read_string(r)?);
        }
        Ok(Params {
            uid,
            gid,
            supplementary_gids,
            rlimits,
            security_label,
            capabilities,
        })
    }
}

fn encode_option_id<W: Write>(w: &mut W, id: &Option<IdSpec>) -> Result<()> {
    match id {
        Some(id) => {
            write_bool(w, true)?;
            id.encode(w)
        }
        None => write_bool(w, false),
    }
}

fn decode_option_id<R: Read>(r: &mut R) -> Result<Option<IdSpec>> {
    if read_bool(r)? {
        Ok(Some(IdSpec::decode(r)?))
    } else {
        Ok(None)
    }
}

/// A single event trigger. `Property` fires on the edge from a different
/// value to the watched one; `Boot` fires once, the first time it's polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Boot,
    Property { key: String, value: String },
}

impl Trigger {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Trigger::Boot => write_u8(w, 0),
            Trigger::Property { key, value } => {
                write_u8(w, 1)?;
                write_string(w, key)?;
                write_string(w, value)
            }
        }
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        match read_u8(r)? {
            0 => Ok(Trigger::Boot),
            1 => Ok(Trigger::Property {
                key: read_string(r)?,
                value: read_string(r)?,
            }),
            other => Err(ProtocolError::UnknownDiscriminant {
                field: "Trigger",
                value: other,
            }),
        }
    }
}

/// `Params` plus the triggers that arm an event definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventParams {
    pub base: Params,
    pub triggers: Vec<Trigger>,
}

impl EventParams {
    pub(crate) fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        self.base.encode(w)?;
        write_u32(w, self.triggers.len() as u32)?;
        for trigger in &self.triggers {
            trigger.encode(w)?;
        }
        Ok(())
    }

    pub(crate) fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let base = Params::decode(r)?;
        let count = read_u32(r)?;
        let mut triggers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            triggers.push(Trigger::decode(r)?);
        }
        Ok(EventParams { base, triggers })
    }
}
