//! # bridgecast
//!
//! Bidirectional event bridge between a host platform's broadcast bus and a
//! scripting environment embedded in an application view. Native and script
//! code exchange named events with flat key-value payloads without ever
//! seeing each other's APIs.
//!
//! ## Architecture
//! ```text
//!   script commands                     native broadcasts
//!        │                                     │
//!        ▼                                     ▼
//!  BridgeDispatcher ──register/unregister─► EventRegistry
//!        │                                     │ forwarding listener
//!        │ publish (spawned task)              ▼
//!        ▼                               PayloadCodec
//!    NativeBus ◄── envelope                    │
//!                                              ▼
//!                                       ScriptChannel ──► ScriptHost
//!                                       (single worker,   (eval / url
//!                                        serialized)       injection)
//! ```
//!
//! Three commands cross the inbound surface — `publish`, `subscribe`,
//! `unsubscribe` — each acked or rejected with a stable error identifier.
//! Outbound, every event lands on the well-known script entry point
//! `broadcaster.fireEvent(eventName, payload)`.
//!
//! The two collaborator seams are traits: [`NativeBus`] is the platform's
//! publish/subscribe mechanism ([`LocalBus`] ships as the in-process
//! implementation), and [`ScriptHost`] is the embedded script context.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use bridgecast::{BridgeDispatcher, LocalBus, ScriptCall, ScriptHost};
//! use serde_json::json;
//!
//! struct WebViewHost;
//!
//! impl ScriptHost for WebViewHost {
//!     fn eval(&self, call: ScriptCall) {
//!         // hand the structured call (or its textual form) to the view
//!         let _snippet = call.to_snippet();
//!     }
//! }
//!
//! # async fn run() {
//! let bus = Arc::new(LocalBus::new());
//! let bridge = BridgeDispatcher::new(bus, Arc::new(WebViewHost));
//!
//! bridge.dispatch("subscribe", &[json!("device.ready")]);
//! bridge.dispatch("publish", &[json!("app.start"), json!({"cold": true})]);
//! bridge.shutdown();
//! # }
//! ```

pub mod core;

pub use crate::core::bus::{ListenerId, LocalBus, NativeBus, NativeListener};
pub use crate::core::dispatch::{BridgeConfig, BridgeDispatcher, Command, DispatchOutcome};
pub use crate::core::error::{BridgeError, NativeBusError, BUS_ERROR, EVENTNAME_ERROR, JSON_ERROR};
pub use crate::core::payload::{NativeEnvelope, NativeValue, Payload, Scalar};
pub use crate::core::registry::EventRegistry;
pub use crate::core::script::{
    HostCapability, ScriptCall, ScriptChannel, ScriptHost, FIRE_EVENT_METHOD,
};
