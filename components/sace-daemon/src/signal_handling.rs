//! Graceful shutdown on SIGTERM/SIGINT via the classic self-pipe trick:
//! the signal handler itself only writes one byte to a pipe, and a
//! regular thread blocked reading that pipe does the actual work. Every
//! spawned child already carries `PR_SET_PDEATHSIG` (see
//! [`sace_core::spawn`]), so once this process exits the kernel delivers
//! `SIGHUP` to them without us having to walk the process table.

use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::socket::{self, Shutdown};
use nix::unistd::{close, pipe, read, unlink, write};

use crate::dispatcher::Dispatcher;

static mut SELF_PIPE_WRITE: RawFd = -1;

extern "C" fn handle_shutdown_signal(_: libc::c_int) {
    // Async-signal-safe: write(2) on an fd already known to be valid.
    unsafe {
        if SELF_PIPE_WRITE >= 0 {
            let _ = write(SELF_PIPE_WRITE, &[1u8]);
        }
    }
}

/// Everything the shutdown thread needs to unwind the daemon once a
/// signal arrives: unlink the socket, force the accept loop blocked on
/// the main thread to wake up, drain each executor and join its worker
/// thread.
pub struct ShutdownContext {
    pub socket_path: PathBuf,
    pub listener_fd: RawFd,
    pub shutting_down: Arc<AtomicBool>,
    pub dispatcher: Arc<Dispatcher>,
    pub executor_threads: Vec<JoinHandle<()>>,
}

/// Installs SIGTERM/SIGINT handlers and spawns the thread that waits for
/// them. Returns immediately; the accept loop on the main thread is what
/// actually lets the process exit, once the shutdown thread has unblocked
/// it.
pub fn install(ctx: ShutdownContext) {
    let (read_fd, write_fd) = pipe().expect("failed to create self-pipe for signal handling");

    unsafe {
        SELF_PIPE_WRITE = write_fd;
    }

    let handler = SigHandler::Handler(handle_shutdown_signal);
    unsafe {
        signal::signal(Signal::SIGTERM, handler).expect("failed to install SIGTERM handler");
        signal::signal(Signal::SIGINT, handler).expect("failed to install SIGINT handler");
    }

    std::thread::Builder::new()
        .name("sace-signal".into())
        .spawn(move || wait_for_shutdown(read_fd, ctx))
        .expect("failed to spawn signal-handling thread");
}

fn wait_for_shutdown(read_fd: RawFd, ctx: ShutdownContext) {
    let mut buf = [0u8; 1];
    loop {
        match read(read_fd, &mut buf) {
            Ok(0) => continue,
            Ok(_) => break,
            Err(nix::Error::EINTR) => continue,
            Err(_) => break,
        }
    }

    info!("received shutdown signal, cleaning up");
    ctx.shutting_down.store(true, Ordering::SeqCst);
    let _ = unlink(&ctx.socket_path);
    let _ = close(read_fd);

    // Unblocks the main thread's accept() call; accept_loop sees the
    // resulting error with `shutting_down` already set and exits its
    // loop instead of warning and retrying.
    if let Err(err) = socket::shutdown(ctx.listener_fd, Shutdown::Both) {
        info!("listener already gone: {err}");
    }

    ctx.dispatcher.shutdown();
    for thread in ctx.executor_threads {
        let _ = thread.join();
    }
    info!("executors drained, shutdown complete");
}
