//! Resolves the symbolic-or-numeric uid/gid fields a request can carry.

use sace_protocol::IdSpec;

use crate::error::{CoreError, Result};

pub fn resolve_uid(spec: &IdSpec) -> Result<u32> {
    match spec {
        IdSpec::Numeric(uid) => Ok(*uid),
        IdSpec::Name(name) => users::get_uid_by_name(name)
            .ok_or_else(|| CoreError::UnknownUser(name.clone())),
    }
}

pub fn resolve_gid(spec: &IdSpec) -> Result<u32> {
    match spec {
        IdSpec::Numeric(gid) => Ok(*gid),
        IdSpec::Name(name) => users::get_gid_by_name(name)
            .ok_or_else(|| CoreError::UnknownGroup(name.clone())),
    }
}

pub fn resolve_gids(specs: &[IdSpec]) -> Result<Vec<u32>> {
    specs.iter().map(resolve_gid).collect()
}
