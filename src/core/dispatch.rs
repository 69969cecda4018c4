//! Command dispatch: the inbound surface of the bridge.
//!
//! Commands arrive as a string action name plus positional JSON arguments,
//! the shape script↔native invocation layers deliver. The dispatcher
//! validates, then drives the registry (subscribe/unsubscribe) or schedules
//! a native broadcast on a background task (publish). Every invocation ends
//! in exactly one of: ack, a caller-visible error, or unhandled.

use std::sync::Arc;

use serde_json::Value;

use crate::core::bus::NativeBus;
use crate::core::error::BridgeError;
use crate::core::payload;
use crate::core::registry::EventRegistry;
use crate::core::script::{ScriptChannel, ScriptHost};

pub const ACTION_PUBLISH: &str = "publish";
pub const ACTION_SUBSCRIBE: &str = "subscribe";
pub const ACTION_UNSUBSCRIBE: &str = "unsubscribe";

/// Tuning knobs for a bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Outbound script queue depth; calls beyond it are dropped with a
    /// warning rather than blocking a delivery thread.
    pub script_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            script_queue_capacity: 1024,
        }
    }
}

/// A parsed bridge command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Publish { event: String, payload: Value },
    Subscribe { event: String },
    Unsubscribe { event: String },
}

impl Command {
    /// Parse an action name and positional arguments. `None` means the
    /// action is not one of ours and the dispatcher reports it unhandled.
    ///
    /// A missing or non-string name argument parses as the empty name so
    /// validation reports it uniformly.
    pub fn parse(action: &str, args: &[Value]) -> Option<Command> {
        let event = || str_arg(args, 0);
        match action {
            ACTION_PUBLISH => Some(Command::Publish {
                event: event(),
                payload: args.get(1).cloned().unwrap_or(Value::Null),
            }),
            ACTION_SUBSCRIBE => Some(Command::Subscribe { event: event() }),
            ACTION_UNSUBSCRIBE => Some(Command::Unsubscribe { event: event() }),
            _ => None,
        }
    }
}

fn str_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Terminal outcome of one dispatched invocation.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Command accepted. For publish this means scheduled, not completed.
    Ack,
    Error(BridgeError),
    /// Action name the bridge does not implement.
    Unhandled,
}

impl DispatchOutcome {
    pub fn is_ack(&self) -> bool {
        matches!(self, DispatchOutcome::Ack)
    }

    /// Stable error identifier, when the outcome is an error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            DispatchOutcome::Error(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Entry point of the bridge: owns the registry, the script channel, and
/// the handle to the native bus.
///
/// Must be constructed within a Tokio runtime; publish sends and script
/// deliveries run on spawned tasks.
pub struct BridgeDispatcher {
    bus: Arc<dyn NativeBus>,
    registry: Arc<EventRegistry>,
    channel: ScriptChannel,
}

impl BridgeDispatcher {
    pub fn new(bus: Arc<dyn NativeBus>, host: Arc<dyn ScriptHost>) -> Self {
        Self::with_config(bus, host, BridgeConfig::default())
    }

    pub fn with_config(
        bus: Arc<dyn NativeBus>,
        host: Arc<dyn ScriptHost>,
        config: BridgeConfig,
    ) -> Self {
        let channel = ScriptChannel::spawn(host, config.script_queue_capacity);
        let registry = Arc::new(EventRegistry::new(Arc::clone(&bus), channel.clone()));
        Self {
            bus,
            registry,
            channel,
        }
    }

    /// Dispatch one inbound command.
    pub fn dispatch(&self, action: &str, args: &[Value]) -> DispatchOutcome {
        match Command::parse(action, args) {
            Some(command) => self.run(command),
            None => {
                log::debug!("unhandled action '{}'", action);
                DispatchOutcome::Unhandled
            }
        }
    }

    fn run(&self, command: Command) -> DispatchOutcome {
        match command {
            Command::Publish { event, payload } => self.publish(event, &payload),
            Command::Subscribe { event } => {
                if event.is_empty() {
                    return DispatchOutcome::Error(BridgeError::EventName);
                }
                match self.registry.register(&event) {
                    Ok(()) => DispatchOutcome::Ack,
                    Err(err) => DispatchOutcome::Error(err.into()),
                }
            }
            Command::Unsubscribe { event } => {
                if event.is_empty() {
                    return DispatchOutcome::Error(BridgeError::EventName);
                }
                // Absence of a subscription is not an error.
                match self.registry.unregister(&event) {
                    Ok(()) => DispatchOutcome::Ack,
                    Err(err) => DispatchOutcome::Error(err.into()),
                }
            }
        }
    }

    /// Publish path: validate up front, then hand the native send to a
    /// background task. A validation failure suppresses the send entirely.
    /// The ack means scheduled; completion is never awaited or reported.
    fn publish(&self, event: String, payload: &Value) -> DispatchOutcome {
        if event.is_empty() {
            return DispatchOutcome::Error(BridgeError::EventName);
        }
        let envelope = match payload::encode_value(payload) {
            Ok(envelope) => envelope,
            Err(err) => return DispatchOutcome::Error(err),
        };
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Err(err) = bus.send(&event, envelope) {
                log::warn!("native broadcast '{}' failed: {}", event, err);
            }
        });
        DispatchOutcome::Ack
    }

    /// Host-side entry: forward a native-originated message straight to the
    /// script listeners. Returns false when the payload is not a flat
    /// record; never panics.
    pub fn fire_script_event(&self, event: &str, payload: Option<&Value>) -> bool {
        match self.channel.publish(event, payload) {
            Ok(()) => true,
            Err(err) => {
                log::error!("payload for event '{}' rejected: {}", event, err);
                false
            }
        }
    }

    /// Teardown hook: unregister every outstanding subscription. Individual
    /// failures are logged; completion is guaranteed.
    pub fn shutdown(&self) {
        self.registry.teardown_all();
        log::debug!("bridge teardown complete");
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }
}

impl Drop for BridgeDispatcher {
    fn drop(&mut self) {
        // Mirror of the host destroy callback: no subscription outlives the
        // bridge even without an explicit shutdown.
        self.registry.teardown_all();
    }
}
