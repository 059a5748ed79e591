use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error talking to the broker: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] sace_protocol::ProtocolError),

    #[error("broker replied with sequence {got:?}, expected {expected:?}")]
    SequenceMismatch {
        expected: sace_protocol::Sequence,
        got: sace_protocol::Sequence,
    },

    #[error("request failed with status {0:?}")]
    Failed(sace_protocol::ResultStatus),

    #[error("socket call failed: {0}")]
    Socket(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
