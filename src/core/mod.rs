pub mod bus;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod registry;
pub mod script;

pub use bus::{ListenerId, LocalBus, NativeBus, NativeListener};
pub use dispatch::{BridgeConfig, BridgeDispatcher, Command, DispatchOutcome};
pub use error::{BridgeError, NativeBusError, BUS_ERROR, EVENTNAME_ERROR, JSON_ERROR};
pub use payload::{
    decode_envelope, encode_payload, encode_value, NativeEnvelope, NativeValue, Payload, Scalar,
};
pub use registry::EventRegistry;
pub use script::{HostCapability, ScriptCall, ScriptChannel, ScriptHost, FIRE_EVENT_METHOD};
