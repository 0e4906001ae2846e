//! Notification bus for observing store mutations and team switches.
//!
//! Listeners register per store name and receive an event for every
//! committed mutation of that store, plus a broadcast event whenever the
//! active team changes. Delivery is synchronous and per-listener isolated:
//! a panicking listener is trapped and logged, and never prevents the
//! remaining listeners from being notified.

use crate::types::TeamId;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// What happened to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// One record was written (insert or replace).
    Save,
    /// The store's entire contents were replaced.
    SaveAll,
    /// One record was removed.
    Delete,
    /// The store was emptied.
    Clear,
    /// The active team changed.
    TeamChange,
}

impl ChangeAction {
    /// Returns the action's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::SaveAll => "saveAll",
            Self::Delete => "delete",
            Self::Clear => "clear",
            Self::TeamChange => "teamChange",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Store the event is about.
    pub store_name: String,
    /// What happened.
    pub action: ChangeAction,
    /// Action payload: the saved record, the full list for a replace-all,
    /// `{"id": ...}` for a delete, `{"oldTeamId", "newTeamId"}` for a team
    /// change, absent for a clear.
    pub data: Option<Value>,
    /// Team that was active when the event fired.
    pub team_id: TeamId,
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, Callback)>>,
}

/// Registry of per-store listeners with synchronous fan-out.
#[derive(Default)]
pub struct NotificationBus {
    state: Arc<Mutex<BusState>>,
}

impl NotificationBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for one store.
    ///
    /// The returned [`Subscription`] is the listener's handle; dropping it
    /// does nothing, the registration lives until [`Subscription::cancel`].
    pub fn subscribe<F>(&self, store: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .listeners
            .entry(store.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        debug!(store, id, "listener subscribed");
        Subscription {
            state: Arc::downgrade(&self.state),
            store: store.to_string(),
            id,
        }
    }

    /// Delivers an event to every listener of its store.
    pub fn emit(&self, event: &ChangeEvent) {
        let callbacks: Vec<Callback> = {
            let state = self.state.lock();
            match state.listeners.get(&event.store_name) {
                Some(listeners) => listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };
        Self::deliver(&callbacks, event);
    }

    /// Delivers one event per subscribed store, built by `make`.
    ///
    /// Used for team changes, where every listener hears about the switch
    /// under its own store name.
    pub fn broadcast<F>(&self, make: F)
    where
        F: Fn(&str) -> ChangeEvent,
    {
        let per_store: Vec<(String, Vec<Callback>)> = {
            let state = self.state.lock();
            state
                .listeners
                .iter()
                .filter(|(_, listeners)| !listeners.is_empty())
                .map(|(store, listeners)| {
                    (
                        store.clone(),
                        listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                    )
                })
                .collect()
        };

        for (store, callbacks) in per_store {
            let event = make(&store);
            Self::deliver(&callbacks, &event);
        }
    }

    /// Returns the number of listeners registered for a store.
    #[must_use]
    pub fn listener_count(&self, store: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(store)
            .map_or(0, Vec::len)
    }

    // Listeners run outside the bus lock so a callback may subscribe or
    // cancel without deadlocking. Each callback is trapped individually.
    fn deliver(callbacks: &[Callback], event: &ChangeEvent) {
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(
                    store = %event.store_name,
                    action = %event.action,
                    "listener panicked during notification"
                );
            }
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NotificationBus")
            .field("stores", &state.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Handle to one listener registration.
///
/// The handle is the only way to release the registration; it is detached
/// from the bus's lifetime, so cancelling after the bus is gone is a no-op.
#[derive(Debug)]
pub struct Subscription {
    state: Weak<Mutex<BusState>>,
    store: String,
    id: u64,
}

impl Subscription {
    /// Returns the store this subscription listens to.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store
    }

    /// Removes the listener from the bus.
    pub fn cancel(self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock();
            if let Some(listeners) = state.listeners.get_mut(&self.store) {
                listeners.retain(|(id, _)| *id != self.id);
            }
            debug!(store = %self.store, id = self.id, "listener unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(store: &str) -> ChangeEvent {
        ChangeEvent {
            store_name: store.to_string(),
            action: ChangeAction::Save,
            data: Some(json!({"id": 1})),
            team_id: TeamId::new(0),
        }
    }

    #[test]
    fn emit_reaches_listeners_of_that_store_only() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_a = Arc::clone(&hits);
        let _sub_a = bus.subscribe("a", move |_| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let _sub_b = bus.subscribe("b", |_| panic!("wrong store"));

        bus.emit(&event("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_stops_delivery() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = Arc::clone(&hits);
        let sub = bus.subscribe("a", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event("a"));
        sub.cancel();
        bus.emit(&event("a"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("a"), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = bus.subscribe("a", |_| panic!("listener failure"));
        let hits2 = Arc::clone(&hits);
        let _good = bus.subscribe("a", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broadcast_hits_every_subscribed_store() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for store in ["a", "b"] {
            let seen2 = Arc::clone(&seen);
            let _sub = bus.subscribe(store, move |e| {
                seen2.lock().push(e.store_name.clone());
            });
        }

        bus.broadcast(|store| ChangeEvent {
            store_name: store.to_string(),
            action: ChangeAction::TeamChange,
            data: Some(json!({"oldTeamId": 0, "newTeamId": 1})),
            team_id: TeamId::new(1),
        });

        let mut stores = seen.lock().clone();
        stores.sort();
        assert_eq!(stores, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn multiple_listeners_all_receive() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let subs: Vec<_> = (0..3)
            .map(|_| {
                let hits2 = Arc::clone(&hits);
                bus.subscribe("a", move |_| {
                    hits2.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        bus.emit(&event("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        for sub in subs {
            sub.cancel();
        }
        assert_eq!(bus.listener_count("a"), 0);
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(ChangeAction::Save.as_str(), "save");
        assert_eq!(ChangeAction::SaveAll.as_str(), "saveAll");
        assert_eq!(ChangeAction::Delete.as_str(), "delete");
        assert_eq!(ChangeAction::Clear.as_str(), "clear");
        assert_eq!(ChangeAction::TeamChange.as_str(), "teamChange");
    }
}
