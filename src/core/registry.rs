//! Subscription lifecycle: the only shared mutable state in the bridge.
//!
//! Maps each event name to at most one live bus registration. Registration
//! is idempotent, removal of an absent entry is a no-op success, and
//! teardown always runs to completion. Entry locking in the underlying map
//! makes operations on the same name mutually exclusive while leaving
//! different names independent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::bus::{ListenerId, NativeBus, NativeListener};
use crate::core::error::NativeBusError;
use crate::core::payload::{self, NativeEnvelope};
use crate::core::script::ScriptChannel;

/// One live binding between an event name and its forwarding listener.
struct Subscription {
    id: ListenerId,
    /// Cleared on unregister. A delivery already past the registry check
    /// when its name is unregistered sees the flag and drops silently.
    live: Arc<AtomicBool>,
}

/// Concurrency-safe map from event name to its active subscription.
pub struct EventRegistry {
    bus: Arc<dyn NativeBus>,
    channel: ScriptChannel,
    entries: DashMap<String, Subscription>,
}

impl EventRegistry {
    pub fn new(bus: Arc<dyn NativeBus>, channel: ScriptChannel) -> Self {
        Self {
            bus,
            channel,
            entries: DashMap::new(),
        }
    }

    /// Create and store a subscription for `event` iff none exists.
    /// Re-registering an already subscribed name is a success and attaches
    /// nothing new to the bus.
    pub fn register(&self, event: &str) -> Result<(), NativeBusError> {
        match self.entries.entry(event.to_string()) {
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                let live = Arc::new(AtomicBool::new(true));
                let listener = forwarding_listener(self.channel.clone(), Arc::clone(&live));
                let id = self.bus.register(event, listener)?;
                slot.insert(Subscription { id, live });
                log::debug!("registered native listener for '{}'", event);
                Ok(())
            }
        }
    }

    /// Tear down and remove the subscription for `event`. Absence is a
    /// success: unsubscribing twice must ack both times.
    pub fn unregister(&self, event: &str) -> Result<(), NativeBusError> {
        if let Some((name, subscription)) = self.entries.remove(event) {
            subscription.live.store(false, Ordering::Release);
            self.bus.unregister(&name, subscription.id)?;
            log::debug!("unregistered native listener for '{}'", name);
        }
        Ok(())
    }

    /// Unregister every entry. Individual failures are logged and teardown
    /// continues; when this returns the registry is empty.
    pub fn teardown_all(&self) {
        let names: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            if let Err(err) = self.unregister(&name) {
                log::warn!("teardown: failed to unregister '{}': {}", name, err);
            }
        }
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.entries.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The forwarding boundary: runs on a platform delivery thread, decodes the
/// envelope, and hands the event to the script channel. Never calls into the
/// script context directly.
fn forwarding_listener(channel: ScriptChannel, live: Arc<AtomicBool>) -> NativeListener {
    Arc::new(move |event: &str, envelope: &NativeEnvelope| {
        if !live.load(Ordering::Acquire) {
            // Unregister raced this delivery; accepted, not a fault.
            log::debug!("dropping delivery for '{}' after unregister", event);
            return;
        }
        let record = payload::decode_envelope(envelope).to_json();
        if let Err(err) = channel.publish(event, Some(&record)) {
            log::warn!("dropping native event '{}': {}", event, err);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::LocalBus;
    use crate::core::payload::{NativeEnvelope, NativeValue};
    use crate::core::script::{ScriptCall, ScriptHost};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<ScriptCall>>,
    }

    impl RecordingHost {
        fn calls(&self) -> Vec<ScriptCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ScriptHost for RecordingHost {
        fn eval(&self, call: ScriptCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn registry_over(
        bus: Arc<LocalBus>,
    ) -> (Arc<RecordingHost>, EventRegistry) {
        let host = Arc::new(RecordingHost::default());
        let channel = ScriptChannel::spawn(host.clone(), 64);
        (host, EventRegistry::new(bus, channel))
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn register_is_idempotent_on_the_bus() {
        let bus = Arc::new(LocalBus::new());
        let (_host, registry) = registry_over(bus.clone());
        registry.register("status").unwrap();
        registry.register("status").unwrap();
        assert_eq!(bus.listener_count("status"), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn delivery_flows_to_the_script_host() {
        let bus = Arc::new(LocalBus::new());
        let (host, registry) = registry_over(bus.clone());
        registry.register("status").unwrap();

        let mut envelope = NativeEnvelope::new();
        envelope.insert("ok".into(), NativeValue::Bool(true));
        bus.send("status", envelope).unwrap();

        wait_until(|| !host.calls().is_empty()).await;
        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].event, "status");
        assert_eq!(calls[0].payload, json!({"ok": true}));
    }

    #[tokio::test]
    async fn unregister_absent_is_a_no_op_success() {
        let bus = Arc::new(LocalBus::new());
        let (_host, registry) = registry_over(bus);
        assert!(registry.unregister("never-subscribed").is_ok());
    }

    #[tokio::test]
    async fn unregister_stops_future_deliveries() {
        let bus = Arc::new(LocalBus::new());
        let (host, registry) = registry_over(bus.clone());
        registry.register("tick").unwrap();
        registry.unregister("tick").unwrap();
        assert!(!registry.is_subscribed("tick"));

        bus.send("tick", NativeEnvelope::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn teardown_unregisters_each_name_exactly_once() {
        let bus = Arc::new(LocalBus::new());
        let (_host, registry) = registry_over(bus.clone());
        for name in ["a", "b", "c"] {
            registry.register(name).unwrap();
        }
        registry.teardown_all();
        assert!(registry.is_empty());
        for name in ["a", "b", "c"] {
            assert_eq!(bus.listener_count(name), 0);
        }
        // A second teardown has nothing left to do.
        registry.teardown_all();
        assert!(registry.is_empty());
    }
}
