//! Maps the config file's `rlimit` resource names to `setrlimit(2)` calls,
//! the same vocabulary as the original `rlimit_map` table.

use nix::sys::resource::{setrlimit, Resource};

use crate::error::{CoreError, Result};
use sace_protocol::RlimitSpec;

fn resource_by_name(name: &str) -> Option<Resource> {
    Some(match name {
        "cpu" => Resource::RLIMIT_CPU,
        "fsize" => Resource::RLIMIT_FSIZE,
        "data" => Resource::RLIMIT_DATA,
        "stack" => Resource::RLIMIT_STACK,
        "core" => Resource::RLIMIT_CORE,
        "rss" => Resource::RLIMIT_RSS,
        "nproc" => Resource::RLIMIT_NPROC,
        "nofile" => Resource::RLIMIT_NOFILE,
        "memlock" => Resource::RLIMIT_MEMLOCK,
        "as" => Resource::RLIMIT_AS,
        "locks" => Resource::RLIMIT_LOCKS,
        "sigpending" => Resource::RLIMIT_SIGPENDING,
        "msgqueue" => Resource::RLIMIT_MSGQUEUE,
        "nice" => Resource::RLIMIT_NICE,
        "rtprio" => Resource::RLIMIT_RTPRIO,
        _ => return None,
    })
}

/// Applies every rlimit in `specs`, in order. The original broker applies
/// these before dropping any privilege, since some limits (`RLIMIT_NPROC`
/// in particular) are cheaper to raise while still root.
pub fn apply(specs: &[RlimitSpec]) -> Result<()> {
    for spec in specs {
        let resource = resource_by_name(&spec.resource)
            .ok_or_else(|| CoreError::UnknownRlimit(spec.resource.clone()))?;
        setrlimit(resource, spec.soft, spec.hard).map_err(|source| CoreError::SetRlimit {
            resource: spec.resource.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_specs_are_a_no_op() {
        assert!(apply(&[]).is_ok());
    }

    #[test]
    fn unknown_resource_name_is_rejected() {
        let specs = vec![RlimitSpec {
            resource: "not_a_real_limit".into(),
            soft: 1,
            hard: 1,
        }];
        match apply(&specs) {
            Err(CoreError::UnknownRlimit(name)) => assert_eq!(name, "not_a_real_limit"),
            other => panic!("expected UnknownRlimit, got {other:?}"),
        }
    }
}
