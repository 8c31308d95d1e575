//! One-shot event components and their dispatch pass.
//!
//! An event is an ordinary component carrying the [`EVENT_ROLE`]. It sits in
//! the store until a dispatch pass runs, at which point it notifies every
//! live component carrying its listener role, runs its completion hooks, and
//! is destroyed. Events therefore live for at most one dispatch pass after
//! insertion.

use tracing::{trace, warn};

use crate::component::{Component, Role};
use crate::entity::ComponentId;
use crate::store::ComponentStore;

/// Role under which every pending event is indexed.
pub const EVENT_ROLE: Role = "event";

/// Capability of one-shot event components.
///
/// Implementors expose themselves through [`Component::as_event`] and carry
/// [`EVENT_ROLE`] in their role list.
pub trait Event: Component {
    /// Role whose carriers receive this event's notifications.
    fn listener_role(&self) -> Role;

    /// Deliver the event to one listener. The event itself has already been
    /// detached from the store, so `store` holds every component except it.
    fn notify(&self, store: &mut ComponentStore, listener: ComponentId);

    /// Hook run once after every listener has been notified.
    fn after_notify(&self, _store: &mut ComponentStore) {}

    /// Hook run just before the event is destroyed, after `after_notify`.
    fn after_remove(&self, _store: &mut ComponentStore) {}
}

/// Run one dispatch pass: deliver and destroy every event pending at the
/// start of the pass. Returns the number of notifications delivered.
///
/// Events inserted during the pass (by a notify or hook) stay pending for
/// the next pass. The listener set is captured per event before its first
/// notification, and listeners destroyed mid-pass are skipped rather than
/// notified dangling.
pub fn dispatch_events(store: &mut ComponentStore) -> usize {
    let pending = store.ids_with_role(EVENT_ROLE);
    let mut delivered = 0;

    for event_id in pending {
        // A prior event in this pass may have destroyed this one.
        let Ok(component) = store.lookup_by_id(event_id) else {
            continue;
        };
        if component.as_event().is_none() {
            warn!(
                component_id = %event_id,
                type_name = component.type_name(),
                "component carries the event role without the event capability, skipping"
            );
            continue;
        }

        // Detach so listeners can mutate the store while the event is read.
        let Ok(event) = store.detach(event_id) else {
            continue;
        };
        let Some(handle) = event.as_event() else {
            continue;
        };

        let listeners = store.ids_with_role(handle.listener_role());
        trace!(
            event_id = %event_id,
            type_name = event.type_name(),
            listeners = listeners.len(),
            "dispatch event"
        );
        for listener_id in listeners {
            if !store.contains(listener_id) {
                continue;
            }
            handle.notify(store, listener_id);
            delivered += 1;
        }
        handle.after_notify(store);
        handle.after_remove(store);
        // The detached box drops here; the event id is never reused.
    }

    delivered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
