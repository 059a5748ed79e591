//! Best-effort security-label assignment. There is no SELinux crate in
//! common use, so this talks to the kernel the same way the shell's
//! `runcon` does: write the context to the calling thread's exec
//! attribute, which the next `execve` picks up.

use std::fs::OpenOptions;
use std::io::Write;

use log::warn;

const SELF_ATTR_EXEC: &str = "/proc/self/attr/exec";

/// Sets the label the next exec in this thread should run under. Failures
/// are logged and swallowed rather than propagated: most development and
/// CI hosts don't run SELinux, and the original broker treats a failed
/// `setexeccon` as non-fatal for the same reason.
pub fn apply(label: &str) {
    let result = OpenOptions::new()
        .write(true)
        .open(SELF_ATTR_EXEC)
        .and_then(|mut f| f.write_all(label.as_bytes()));

    if let Err(err) = result {
        warn!("failed to set security label {label:?}: {err}");
    }
}
