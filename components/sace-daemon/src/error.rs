use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] sace_protocol::ProtocolError),

    #[error("spawn/credential error: {0}")]
    Core(#[from] sace_core::CoreError),

    #[error("event config error at line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("socket path {0:?} already in use by a live daemon")]
    AlreadyRunning(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
