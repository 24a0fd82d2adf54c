//! Wire DTOs shared by the orchestrator and the WS fan-out server: the
//! tagged command/event-kind pair, the realm registration snapshot, and the
//! recoverable error taxonomy.

mod command;
mod error;
mod event;
mod registration;

pub use command::Command;
pub use error::{ErrorKind, ProtocolError};
pub use event::{EventEnvelope, EventKind, UnstampedEnvelope};
pub use registration::{
    ControlTickRecord, Registration, RegistrationPhase, RegistrationStats, UniverseState,
};
