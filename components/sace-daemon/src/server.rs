//! Wires the three executors, the dispatcher and the socket reader
//! together into a running broker.

use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::executor::{event, normal, service};
use crate::label::LabelAllocator;
use crate::reader;
use crate::signal_handling::{self, ShutdownContext};

pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub shell_path: PathBuf,
    pub event_config_path: Option<PathBuf>,
    pub property_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            socket_path: PathBuf::from("/run/sace/sace.sock"),
            shell_path: PathBuf::from("/bin/sh"),
            event_config_path: Some(PathBuf::from("/etc/sace/events.conf")),
            property_path: Some(PathBuf::from("/run/sace/properties")),
        }
    }
}

/// Binds the socket, starts the three executor threads and the signal
/// handler, then accepts client connections until told to shut down.
/// Never returns under normal operation.
pub fn run(config: DaemonConfig) -> Result<()> {
    let listener = reader::bind(&config.socket_path)?;
    info!("listening on {:?}", config.socket_path);
    let listener_fd = listener.as_raw_fd();

    // Shared across the normal and service executors so a command and a
    // service can never be handed the same label concurrently.
    let labels = Arc::new(LabelAllocator::new());

    let (service_handle, service_join) =
        service::spawn_executor(config.shell_path.clone(), labels.clone());
    let (normal_handle, normal_join) =
        normal::spawn_executor(config.shell_path.clone(), labels.clone());
    let (event_handle, event_join) = event::spawn_executor(
        service_handle.clone(),
        config.event_config_path.clone(),
        config.property_path.clone(),
    );

    let dispatcher = Arc::new(Dispatcher::new(service_handle, normal_handle, event_handle));
    let shutting_down = Arc::new(AtomicBool::new(false));

    signal_handling::install(ShutdownContext {
        socket_path: config.socket_path.clone(),
        listener_fd,
        shutting_down: shutting_down.clone(),
        dispatcher: dispatcher.clone(),
        executor_threads: vec![service_join, normal_join, event_join],
    });

    reader::accept_loop(listener, dispatcher, shutting_down);
    Ok(())
}
