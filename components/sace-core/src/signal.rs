//! Delivering signals to tracked children and classifying how they died.
//!
//! Every spawned child is made its own process group leader (see
//! [`crate::spawn`]), so a negative pid reaches the whole group exactly
//! like the original broker's `pid_to_signal` helper.

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{CoreError, Result};

pub fn send(pid: i32, sig: Signal) -> Result<()> {
    signal::kill(Pid::from_raw(pid), sig).map_err(CoreError::Signal)
}

/// Signals the whole process group `pid` leads.
pub fn send_group(pid: i32, sig: Signal) -> Result<()> {
    signal::kill(Pid::from_raw(-pid), sig).map_err(CoreError::Signal)
}

/// Outcome of a non-blocking reap, matching the classification the
/// original `monitor_service_status` loop performs on `waitpid`'s status
/// word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    StillAlive,
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
    Continued,
}

/// Non-blocking reap of `pid`. Never panics on `ECHILD`; treats it as
/// "nothing more to reap" so a caller polling a pid it no longer owns
/// degrades gracefully instead of crashing the poll loop.
pub fn try_reap(pid: i32) -> Result<Termination> {
    match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(Termination::StillAlive),
        Ok(WaitStatus::Exited(_, code)) => Ok(Termination::Exited(code)),
        Ok(WaitStatus::Signaled(_, sig, _)) => Ok(Termination::Signaled(sig as i32)),
        Ok(WaitStatus::Stopped(_, sig)) => Ok(Termination::Stopped(sig as i32)),
        Ok(WaitStatus::Continued(_)) => Ok(Termination::Continued),
        Ok(_) => Ok(Termination::StillAlive),
        Err(nix::Error::ECHILD) => Ok(Termination::Exited(0)),
        Err(e) => Err(CoreError::Signal(e)),
    }
}
