//! The broker daemon: a socket reader feeding a dispatcher that routes
//! requests to the normal, service and event executors.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod label;
pub mod reader;
pub mod server;
pub mod signal_handling;
pub mod writer;

pub use error::{DaemonError, Result};
pub use server::{run, DaemonConfig};
