//! Applies a child's capability mask. Mirrors `set_proc_capability` in the
//! original broker: clear everything, then set exactly the requested bits
//! in both the permitted and effective sets.

use caps::{CapSet, Capability, CapsHashSet};

use crate::error::{CoreError, Result};

fn capability_by_name(name: &str) -> Option<Capability> {
    use Capability::*;
    Some(match name {
        "CAP_CHOWN" => CAP_CHOWN,
        "CAP_DAC_OVERRIDE" => CAP_DAC_OVERRIDE,
        "CAP_DAC_READ_SEARCH" => CAP_DAC_READ_SEARCH,
        "CAP_FOWNER" => CAP_FOWNER,
        "CAP_FSETID" => CAP_FSETID,
        "CAP_KILL" => CAP_KILL,
        "CAP_SETGID" => CAP_SETGID,
        "CAP_SETUID" => CAP_SETUID,
        "CAP_SETPCAP" => CAP_SETPCAP,
        "CAP_LINUX_IMMUTABLE" => CAP_LINUX_IMMUTABLE,
        "CAP_NET_BIND_SERVICE" => CAP_NET_BIND_SERVICE,
        "CAP_NET_BROADCAST" => CAP_NET_BROADCAST,
        "CAP_NET_ADMIN" => CAP_NET_ADMIN,
        "CAP_NET_RAW" => CAP_NET_RAW,
        "CAP_IPC_LOCK" => CAP_IPC_LOCK,
        "CAP_IPC_OWNER" => CAP_IPC_OWNER,
        "CAP_SYS_MODULE" => CAP_SYS_MODULE,
        "CAP_SYS_RAWIO" => CAP_SYS_RAWIO,
        "CAP_SYS_CHROOT" => CAP_SYS_CHROOT,
        "CAP_SYS_PTRACE" => CAP_SYS_PTRACE,
        "CAP_SYS_PACCT" => CAP_SYS_PACCT,
        "CAP_SYS_ADMIN" => CAP_SYS_ADMIN,
        "CAP_SYS_BOOT" => CAP_SYS_BOOT,
        "CAP_SYS_NICE" => CAP_SYS_NICE,
        "CAP_SYS_RESOURCE" => CAP_SYS_RESOURCE,
        "CAP_SYS_TIME" => CAP_SYS_TIME,
        "CAP_SYS_TTY_CONFIG" => CAP_SYS_TTY_CONFIG,
        "CAP_MKNOD" => CAP_MKNOD,
        "CAP_LEASE" => CAP_LEASE,
        "CAP_AUDIT_WRITE" => CAP_AUDIT_WRITE,
        "CAP_AUDIT_CONTROL" => CAP_AUDIT_CONTROL,
        "CAP_SETFCAP" => CAP_SETFCAP,
        "CAP_MAC_OVERRIDE" => CAP_MAC_OVERRIDE,
        "CAP_MAC_ADMIN" => CAP_MAC_ADMIN,
        "CAP_SYSLOG" => CAP_SYSLOG,
        "CAP_WAKE_ALARM" => CAP_WAKE_ALARM,
        "CAP_BLOCK_SUSPEND" => CAP_BLOCK_SUSPEND,
        "CAP_AUDIT_READ" => CAP_AUDIT_READ,
        _ => return None,
    })
}

/// Clears the calling thread's permitted/effective/inheritable sets and
/// installs exactly `names`. No-op when `names` is empty, matching the
/// original which skips the whole dance for ordinary commands.
pub fn apply(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    let mut set = CapsHashSet::new();
    for name in names {
        let cap = capability_by_name(name).ok_or_else(|| CoreError::UnknownCapability(name.clone()))?;
        set.insert(cap);
    }

    caps::clear(None, CapSet::Inheritable)?;
    caps::clear(None, CapSet::Permitted)?;
    caps::clear(None, CapSet::Effective)?;
    caps::set(None, CapSet::Permitted, &set)?;
    caps::set(None, CapSet::Effective, &set)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_is_a_no_op() {
        assert!(apply(&[]).is_ok());
    }

    #[test]
    fn unknown_capability_name_is_rejected() {
        match apply(&["CAP_MADE_UP".to_string()]) {
            Err(CoreError::UnknownCapability(name)) => assert_eq!(name, "CAP_MADE_UP"),
            other => panic!("expected UnknownCapability, got {other:?}"),
        }
    }

    #[test]
    fn known_names_resolve() {
        assert!(capability_by_name("CAP_NET_ADMIN").is_some());
        assert!(capability_by_name("CAP_BOGUS").is_none());
    }
}
