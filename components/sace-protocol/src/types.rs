//! Small fixed-vocabulary fields shared by requests, results and responses.
//!
//! Each type here is a one-byte discriminant on the wire. `try_from_u8`
//! rejects anything it doesn't recognize rather than guessing.

use crate::error::ProtocolError;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn to_u8(self) -> u8 {
                self as u8
            }

            pub fn try_from_u8(v: u8) -> Result<Self, ProtocolError> {
                match v {
                    $($value => Ok(Self::$variant),)+
                    other => Err(ProtocolError::UnknownDiscriminant {
                        field: stringify!($name),
                        value: other,
                    }),
                }
            }
        }
    };
}

wire_enum!(
    /// Which of the three executors a request is destined for.
    RequestKind { Normal = 0, Service = 1, Event = 2 }
);

wire_enum!(
    /// Direction of the pipe end handed back for a normal command.
    Direction { Write = 0, Read = 1 }
);

wire_enum!(
    NormalOp { Start = 0, Close = 1 }
);

wire_enum!(
    ServiceOp { Start = 0, Stop = 1, Pause = 2, Restart = 3, Info = 4 }
);

wire_enum!(
    /// Whether a service INFO lookup is keyed by name or by label.
    InfoKey { ByName = 0, ByLabel = 1 }
);

wire_enum!(
    /// Marks a service as having been started on behalf of an event rather
    /// than a direct client request, mirroring the original flag that kept
    /// event-spawned services out of ordinary client bookkeeping.
    ServiceFlags { Plain = 0, FromEvent = 1 }
);

wire_enum!(
    EventOp { Add = 0, Delete = 1, Info = 2 }
);

wire_enum!(
    EventFlags { None = 0, RestartOnFail = 1 }
);

wire_enum!(
    ResultStatus { Ok = 0, Fail = 1, Timeout = 2, Secure = 3, Exists = 4 }
);

wire_enum!(
    /// What, if anything, accompanies a result beyond its status.
    ResultType { None = 0, Fd = 1, Label = 2, Extra = 3 }
);

wire_enum!(
    ResponseKind { Normal = 0, Service = 1 }
);

wire_enum!(
    /// How a tracked child or service ended, echoed in a termination
    /// response.
    ResponseStatus { Exit = 0, Signal = 1, FinishedByUser = 2, Unknown = 3 }
);

/// Opaque, non-reusable identifier for a live child or running event,
/// handed out on START and referenced by every later command that targets
/// it. `NONE` is never issued to a real child and doubles as "not present"
/// on the wire instead of a separate presence byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u64);

impl Label {
    pub const NONE: Label = Label(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Client-stamped correlation id, echoed back on the matching result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(pub u32);
