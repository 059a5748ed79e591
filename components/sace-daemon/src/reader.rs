//! Accepts client connections on the broker's Unix socket and turns each
//! one into a stream of [`Job`]s for the dispatcher, mirroring the
//! original `SaceSocketReader`'s accept-then-spawn-a-reader-thread shape.

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
use nix::unistd::unlink;

use sace_protocol::Request;

use crate::dispatcher::Dispatcher;
use crate::error::{DaemonError, Result};
use crate::executor::Job;
use crate::writer::{ClientWriter, Writer};

/// Binds `path`. If a socket file is already there, first tries
/// connecting to it: a successful connect means another daemon is live
/// and holding it, so binding refuses rather than stealing the path out
/// from under it. A refused connection means the file is just left over
/// from a crashed previous run, safe to unlink and rebind.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        match UnixStream::connect(path) {
            Ok(_) => return Err(DaemonError::AlreadyRunning(path.to_path_buf())),
            Err(_) => unlink(path).map_err(|e| std::io::Error::from_raw_os_error(e as i32))?,
        }
    }
    Ok(UnixListener::bind(path)?)
}

/// Accepts connections until `listener` is closed (or an unrecoverable
/// accept error occurs), handing each one off to its own reader thread.
/// `shutting_down` distinguishes a deliberate shutdown-triggered accept
/// error (the signal-handling thread calls `shutdown(2)` on the listening
/// socket to unblock this loop) from a real accept failure worth
/// logging and retrying past.
pub fn accept_loop(listener: UnixListener, dispatcher: Arc<Dispatcher>, shutting_down: Arc<AtomicBool>) {
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || serve_client(stream, dispatcher));
            }
            Err(err) => {
                if shutting_down.load(Ordering::SeqCst) {
                    info!("listener closed for shutdown");
                    break;
                }
                warn!("accept failed: {err}");
            }
        }
    }
}

fn serve_client(stream: UnixStream, dispatcher: Arc<Dispatcher>) {
    if let Ok(cred) = getsockopt(&stream, PeerCredentials) {
        debug!("accepted client pid={} uid={} gid={}", cred.pid(), cred.uid(), cred.gid());
    }

    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(err) => {
            warn!("failed to clone client stream: {err}");
            return;
        }
    };
    let writer: Arc<dyn Writer> = ClientWriter::new(stream);

    let mut reader_stream = reader_stream;
    loop {
        match Request::read_from(&mut reader_stream) {
            Ok(request) => dispatcher.dispatch(Job { request, writer: writer.clone() }),
            Err(sace_protocol::ProtocolError::Io(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                info!("client disconnected");
                break;
            }
            Err(err) => {
                warn!("malformed request, dropping client: {err}");
                break;
            }
        }
    }
}
