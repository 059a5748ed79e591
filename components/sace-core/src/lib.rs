//! Privilege-dropping and process-lifecycle primitives shared by the
//! broker's three executors: resolving uid/gid, applying rlimits and
//! capabilities, setting a security label, spawning, signaling and
//! reaping children.

pub mod caps;
pub mod error;
pub mod ids;
pub mod rlimit;
pub mod seclabel;
pub mod signal;
pub mod spawn;

pub use error::{CoreError, Result};
pub use signal::Termination;
pub use spawn::{spawn, SpawnRequest};
