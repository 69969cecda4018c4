//! Delivery of events into the embedded script execution context.
//!
//! Every outbound call funnels through one [`ScriptChannel`] worker task, so
//! host invocations are serialized no matter which thread asked for them.
//! Callers never block on the script side and never learn whether the script
//! side handled the call.
//!
//! The call itself is a structured [`ScriptCall`] — method identifier plus
//! encoded arguments — rather than templated script text, so event names and
//! payload content cannot break out of the invocation. Hosts stuck on a
//! legacy capability level get the textual form via [`ScriptCall::to_snippet`],
//! which JSON-serializes both arguments.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::core::error::BridgeError;

/// Well-known script-side entry point for bridge events.
pub const FIRE_EVENT_METHOD: &str = "broadcaster.fireEvent";

/// One structured invocation of the script-side entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    /// Method identifier, always [`FIRE_EVENT_METHOD`] today.
    pub method: &'static str,
    pub event: String,
    /// Flat record argument; `{}` when the event carried no payload.
    pub payload: Value,
}

impl ScriptCall {
    pub fn fire_event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            method: FIRE_EVENT_METHOD,
            event: event.into(),
            payload,
        }
    }

    /// Textual form for hosts that can only evaluate script source.
    ///
    /// Both arguments are rendered through JSON serialization, so a quote or
    /// brace in the event name or payload stays inside its literal.
    pub fn to_snippet(&self) -> String {
        format!(
            "window.{}({}, {});",
            self.method,
            Value::String(self.event.clone()),
            self.payload
        )
    }
}

/// Delivery mechanism a [`ScriptHost`] supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCapability {
    /// Direct script evaluation is available.
    Eval,
    /// Legacy hosts: injection through a `javascript:` URL load.
    LoadUrl,
}

/// The embedded script execution context, as seen from the bridge.
///
/// Implementations marshal onto whatever thread their engine requires; the
/// bridge guarantees only that calls arrive one at a time.
pub trait ScriptHost: Send + Sync + 'static {
    /// Checked once per delivery on the channel worker, not per caller.
    fn capability(&self) -> HostCapability {
        HostCapability::Eval
    }

    /// Evaluate a structured call on the script context.
    fn eval(&self, call: ScriptCall);

    /// Legacy injection path. Hosts reporting [`HostCapability::LoadUrl`]
    /// must override this; the default drops the call with a warning.
    fn load_url(&self, url: String) {
        log::warn!("script host reported LoadUrl capability but ignores url loads: {}", url);
    }
}

/// Handle for scheduling calls onto the script context from any thread.
#[derive(Clone)]
pub struct ScriptChannel {
    tx: mpsc::Sender<ScriptCall>,
}

impl ScriptChannel {
    /// Spawn the single worker task that owns the host handoff.
    ///
    /// Must be called within a Tokio runtime. The worker exits once every
    /// clone of the returned channel has been dropped.
    pub fn spawn(host: Arc<dyn ScriptHost>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ScriptCall>(capacity);
        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                match host.capability() {
                    HostCapability::Eval => host.eval(call),
                    HostCapability::LoadUrl => {
                        host.load_url(format!("javascript:{}", call.to_snippet()));
                    }
                }
            }
            log::debug!("script channel worker stopped");
        });
        Self { tx }
    }

    /// Schedule `broadcaster.fireEvent(event, payload)` on the script
    /// context.
    ///
    /// A missing or null payload defaults to the empty record. A payload
    /// that is not a flat record surfaces a format error to the invoking
    /// path instead of reaching the host. Always asynchronous: success means
    /// scheduled, not delivered.
    pub fn publish(&self, event: &str, payload: Option<&Value>) -> Result<(), BridgeError> {
        let record = match payload {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value @ Value::Object(_)) => value.clone(),
            Some(other) => {
                return Err(BridgeError::Format(format!(
                    "cannot fire '{}' with a non-record payload: {}",
                    event, other
                )));
            }
        };
        let call = ScriptCall::fire_event(event, record);
        // Queue overflow and post-teardown sends are lossy on purpose; the
        // caller was never promised delivery.
        if let Err(err) = self.tx.try_send(call) {
            log::warn!("dropping script event '{}': {}", event, err);
        }
        Ok(())
    }
}
