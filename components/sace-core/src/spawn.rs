//! Forks and execs a shell command with a child's credentials, resource
//! limits, capability set and security label applied in between.
//!
//! The apply order below is load-bearing and mirrors the original
//! broker's `handle_child_params` exactly: rlimits and capabilities are
//! set while the child is still root, then gid, then supplementary gids,
//! then uid, then the security label last of all (some label transitions
//! are only permitted from an already-unprivileged identity).

use std::ffi::CString;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::warn;
use nix::unistd::{setgid, setgroups, setuid, Gid, Uid};

use crate::error::{CoreError, Result};
use crate::{caps, ids, rlimit, seclabel};
use sace_protocol::{IdSpec, Params};

const PR_SET_PDEATHSIG: libc::c_int = 1;
const PR_SET_NAME: libc::c_int = 15;

/// Pre-resolved, async-signal-safe form of [`Params`]. Built in the parent
/// (name lookups go through NSS, which isn't signal-safe) and then moved
/// into the `pre_exec` closure that runs between `fork` and `exec`.
struct ResolvedParams {
    uid: Option<u32>,
    gid: Option<u32>,
    supplementary_gids: Vec<u32>,
    rlimits: Vec<sace_protocol::RlimitSpec>,
    capabilities: Vec<String>,
    security_label: Option<String>,
}

impl ResolvedParams {
    /// A symbolic uid/gid that fails to resolve is logged and dropped
    /// rather than failing the whole spawn; the child then inherits the
    /// daemon's own (system-equivalent) identity for that field.
    fn resolve(params: &Params) -> Self {
        let gid = params.gid.as_ref().and_then(|spec| log_lookup_failure(spec, ids::resolve_gid(spec)));
        let uid = params.uid.as_ref().and_then(|spec| log_lookup_failure(spec, ids::resolve_uid(spec)));
        let supplementary_gids = params
            .supplementary_gids
            .iter()
            .filter_map(|spec| log_lookup_failure(spec, ids::resolve_gid(spec)))
            .collect();
        ResolvedParams {
            uid,
            gid,
            supplementary_gids,
            rlimits: params.rlimits.clone(),
            capabilities: params.capabilities.clone(),
            security_label: params.security_label.clone(),
        }
    }

    fn apply_in_child(&self) -> std::io::Result<()> {
        rlimit::apply(&self.rlimits).map_err(to_io)?;
        caps::apply(&self.capabilities).map_err(to_io)?;
        if let Some(gid) = self.gid {
            setgid(Gid::from_raw(gid)).map_err(|e| to_io(CoreError::Credentials(e)))?;
        }
        if !self.supplementary_gids.is_empty() {
            let gids: Vec<Gid> = self.supplementary_gids.iter().map(|g| Gid::from_raw(*g)).collect();
            setgroups(&gids).map_err(|e| to_io(CoreError::Credentials(e)))?;
        }
        if let Some(uid) = self.uid {
            setuid(Uid::from_raw(uid)).map_err(|e| to_io(CoreError::Credentials(e)))?;
        }
        if let Some(label) = &self.security_label {
            seclabel::apply(label);
        }
        Ok(())
    }
}

fn to_io(err: CoreError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

/// Unwraps a resolved uid/gid, logging and falling back to "leave this
/// field unset" (the daemon's own ambient identity) rather than failing
/// the whole spawn over one bad name.
fn log_lookup_failure<T>(spec: &IdSpec, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("uid/gid lookup failed for {spec:?}: {err}; falling back to the default identity");
            None
        }
    }
}

/// Everything needed to fork and exec one shell command.
pub struct SpawnRequest<'a> {
    pub shell: &'a Path,
    pub command: &'a str,
    /// Name installed via `PR_SET_NAME`, truncated by the kernel to 15
    /// bytes. The original broker uses the raw command line here.
    pub process_name: &'a str,
    pub params: Option<&'a Params>,
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

/// Forks `shell -c command`, applying `params` (if any) in the child, and
/// returns the running [`Child`]. The child is placed in its own process
/// group so the whole group can be signaled together, and is armed with
/// `PR_SET_PDEATHSIG` so it's reaped by init rather than orphaned if this
/// process dies first.
pub fn spawn(req: SpawnRequest<'_>) -> Result<Child> {
    let resolved = req.params.map(ResolvedParams::resolve);

    let process_name = CString::new(req.process_name.as_bytes().to_vec())
        .unwrap_or_else(|_| CString::new("sace-child").unwrap());

    let mut cmd = Command::new(req.shell);
    cmd.arg("-c")
        .arg(req.command)
        .stdin(req.stdin)
        .stdout(req.stdout)
        .stderr(req.stderr);

    unsafe {
        cmd.pre_exec(move || {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            if let Some(resolved) = &resolved {
                resolved.apply_in_child()?;
            }
            if libc::prctl(PR_SET_PDEATHSIG, libc::SIGHUP, 0, 0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            libc::prctl(
                PR_SET_NAME,
                process_name.as_ptr() as libc::c_ulong,
                0,
                0,
                0,
            );
            Ok(())
        });
    }

    cmd.spawn().map_err(CoreError::Spawn)
}
