//! Error taxonomy for the bridge.
//!
//! Callers on the script side see two stable error identifiers:
//! [`EVENTNAME_ERROR`] for a null/empty event name and [`JSON_ERROR`] for a
//! payload that is not a flat record. Everything else in the bridge degrades
//! to a logged skip rather than a surfaced failure.

use thiserror::Error;

use crate::core::bus::ListenerId;

/// Stable identifier reported for a null or empty event name.
pub const EVENTNAME_ERROR: &str = "EVENTNAME_ERROR";
/// Stable identifier reported for a malformed structured payload.
pub const JSON_ERROR: &str = "JSON_ERROR";
/// Identifier reported when the native bus collaborator itself fails.
pub const BUS_ERROR: &str = "BUS_ERROR";

/// Caller-visible validation failures for a single bridge command.
///
/// None of these are fatal to the bridge; each one terminates exactly the
/// invocation that produced it.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Event name was null, empty, or not a string.
    #[error("event name is null or empty")]
    EventName,

    /// Payload was not a flat record (top-level object of scalars).
    #[error("payload is not a valid flat record: {0}")]
    Format(String),

    /// The native bus rejected a register/unregister call.
    #[error(transparent)]
    Bus(#[from] NativeBusError),
}

impl BridgeError {
    /// The stable identifier reported to the script side for this error.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::EventName => EVENTNAME_ERROR,
            BridgeError::Format(_) => JSON_ERROR,
            BridgeError::Bus(_) => BUS_ERROR,
        }
    }
}

/// Failures crossing the [`NativeBus`](crate::core::bus::NativeBus) boundary.
#[derive(Debug, Error)]
pub enum NativeBusError {
    /// An unregister named a listener the bus does not hold.
    #[error("listener {id} is not registered for event '{event}'")]
    UnknownListener { event: String, id: ListenerId },

    /// The underlying platform mechanism is gone or refused the call.
    #[error("native bus unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_codes() {
        assert_eq!(BridgeError::EventName.code(), "EVENTNAME_ERROR");
        assert_eq!(BridgeError::Format("nope".into()).code(), "JSON_ERROR");
        let bus = BridgeError::Bus(NativeBusError::Unavailable("down".into()));
        assert_eq!(bus.code(), "BUS_ERROR");
    }
}
