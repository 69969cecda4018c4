//! The native broadcast collaborator boundary.
//!
//! The bridge never talks to the platform's publish/subscribe mechanism
//! directly; it goes through [`NativeBus`]. Hosts plug in whatever their
//! platform provides. [`LocalBus`] is the in-process implementation used by
//! the test suite and by embedders that have no system bus.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::core::error::NativeBusError;
use crate::core::payload::NativeEnvelope;

/// Opaque handle for one live bus registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Callback the bus invokes on delivery. Runs on whatever thread the
/// platform delivers on, so it must be `Send + Sync`.
pub type NativeListener = Arc<dyn Fn(&str, &NativeEnvelope) + Send + Sync>;

/// System-wide publish/subscribe mechanism the bridge sits on top of.
pub trait NativeBus: Send + Sync + 'static {
    /// Broadcast an envelope to every current listener of `event`.
    /// Fire-and-forget: having no listeners is not an error.
    fn send(&self, event: &str, envelope: NativeEnvelope) -> Result<(), NativeBusError>;

    /// Attach a listener to `event`; the returned handle is required to
    /// detach it again.
    fn register(&self, event: &str, listener: NativeListener)
        -> Result<ListenerId, NativeBusError>;

    /// Detach a previously registered listener.
    fn unregister(&self, event: &str, id: ListenerId) -> Result<(), NativeBusError>;
}

/// In-process bus: listeners are invoked synchronously on the sender's
/// thread, which stands in for the platform's delivery threads.
#[derive(Default)]
pub struct LocalBus {
    listeners: DashMap<String, Vec<(ListenerId, NativeListener)>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live listeners for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|entry| entry.len()).unwrap_or(0)
    }
}

impl NativeBus for LocalBus {
    fn send(&self, event: &str, envelope: NativeEnvelope) -> Result<(), NativeBusError> {
        // Snapshot the listener list first so delivery never runs under the
        // map lock (a listener may re-enter the bus).
        let listeners: Vec<NativeListener> = match self.listeners.get(event) {
            Some(entry) => entry.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return Ok(()),
        };
        for listener in listeners {
            listener(event, &envelope);
        }
        Ok(())
    }

    fn register(
        &self,
        event: &str,
        listener: NativeListener,
    ) -> Result<ListenerId, NativeBusError> {
        let id = ListenerId::new();
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        Ok(id)
    }

    fn unregister(&self, event: &str, id: ListenerId) -> Result<(), NativeBusError> {
        let mut removed = false;
        if let Some(mut entry) = self.listeners.get_mut(event) {
            let before = entry.len();
            entry.retain(|(lid, _)| *lid != id);
            removed = entry.len() != before;
        }
        self.listeners.remove_if(event, |_, list| list.is_empty());
        if removed {
            Ok(())
        } else {
            Err(NativeBusError::UnknownListener {
                event: event.to_string(),
                id,
            })
        }
    }
}
