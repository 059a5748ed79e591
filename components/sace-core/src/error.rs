use std::io;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("unknown group {0:?}")]
    UnknownGroup(String),

    #[error("unknown rlimit resource {0:?}")]
    UnknownRlimit(String),

    #[error("unknown capability {0:?}")]
    UnknownCapability(String),

    #[error("setrlimit failed for {resource}: {source}")]
    SetRlimit {
        resource: String,
        #[source]
        source: nix::Error,
    },

    #[error("capability call failed: {0}")]
    Capability(#[from] caps::errors::CapsError),

    #[error("setgid/setuid/setgroups failed: {0}")]
    Credentials(#[source] nix::Error),

    #[error("spawn failed: {0}")]
    Spawn(#[from] io::Error),

    #[error("signal delivery failed: {0}")]
    Signal(#[source] nix::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
