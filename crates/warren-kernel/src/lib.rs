//! warren-kernel: the simulation kernel for discrete-turn games.
//!
//! State lives in a [`store::ComponentStore`] of trait-object components
//! indexed by id, capability role, and owning entity, with a [`stash::Stash`]
//! as secondary storage for components temporarily out of play. On top of the
//! store sit three kernel mechanisms:
//!
//! - discrete-turn scheduling ([`schedule`]): actors carry a
//!   [`schedule::Schedule`] and act when their tick arrives;
//! - the per-entity behavior stack ([`behavior`]): swap in a replacement
//!   decision component and back out to the one it replaced;
//! - one-shot events ([`event`]): event components notify every carrier of
//!   their listener role during a dispatch pass, then disappear.
//!
//! Full state is saveable through [`snapshot::KernelSnapshot`]; component
//! types register with the store's [`component::ComponentRegistry`] so load
//! can reconstruct concrete types by name.
//!
//! ```
//! use warren_kernel::prelude::*;
//!
//! #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
//! struct Hunger {
//!     meta: ComponentMeta,
//!     fullness: u32,
//! }
//! warren_kernel::impl_component!(Hunger, "hunger", []);
//!
//! let mut store = ComponentStore::new();
//! store.register_component::<Hunger>();
//! let rabbit = store.allocate_entity();
//! let id = store
//!     .insert(Hunger { meta: ComponentMeta::new(rabbit), fullness: 100 })
//!     .unwrap();
//! assert_eq!(store.get::<Hunger>(id).unwrap().fullness, 100);
//! ```

pub mod behavior;
pub mod component;
pub mod entity;
pub mod event;
pub mod schedule;
pub mod snapshot;
pub mod stash;
pub mod store;

use thiserror::Error;

use crate::entity::{ComponentId, EntityId};

/// Errors from kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A component referenced the invalid-entity sentinel.
    #[error("component references the invalid entity sentinel")]
    InvalidEntity,

    /// No live component with this id.
    #[error("no live component with id {id}")]
    UnknownComponent { id: ComponentId },

    /// A typed access named a different concrete type than the component's.
    #[error("component {id} is not a '{expected}'")]
    ComponentTypeMismatch {
        id: ComponentId,
        expected: &'static str,
    },

    /// No stashed component with this id.
    #[error("no stashed component with id {id}")]
    NotStashed { id: ComponentId },

    /// No stashed entity unit for this entity.
    #[error("entity {entity} is not stashed")]
    EntityNotStashed { entity: EntityId },

    /// The entity owns no live components to stash.
    #[error("entity {entity} has no live components to stash")]
    NothingToStash { entity: EntityId },

    /// A stashed unit for this entity already exists.
    #[error("entity {entity} is already stashed")]
    EntityAlreadyStashed { entity: EntityId },

    /// Behavior swap on an entity with no active behavior.
    #[error("entity {entity} has no active behavior")]
    NoActiveBehavior { entity: EntityId },

    /// The component does not expose the behavior capability.
    #[error("component type '{name}' is not a behavior")]
    NotABehavior { name: &'static str },

    /// Back-out from a behavior that was not installed by a swap.
    #[error("behavior {id} has no previous behavior to back out to")]
    NoPreviousBehavior { id: ComponentId },

    /// A snapshot names a component type missing from the registry.
    #[error("unknown component type '{name}' in snapshot (registered: {registered})")]
    UnknownComponentType { name: String, registered: String },

    /// A component's fields failed to (de)serialize.
    #[error("component type '{name}' failed to (de)serialize: {details}")]
    ComponentDeserialization { name: String, details: String },

    /// A snapshot document failed to parse or render.
    #[error("malformed snapshot: {details}")]
    SnapshotFormat { details: String },
}

/// Convenient glob import for kernel users.
pub mod prelude {
    pub use crate::behavior::{active_behavior, back_out, swap, Behavior, BEHAVIOR_ROLE};
    pub use crate::component::{
        Component, ComponentKind, ComponentMeta, ComponentRegistry, Role,
    };
    pub use crate::entity::{ComponentId, EntityId, IdAllocator, IdAllocatorState};
    pub use crate::event::{dispatch_events, Event, EVENT_ROLE};
    pub use crate::schedule::{
        ready_actors, Actor, Schedule, Tick, ACTOR_ROLE, DEFAULT_ENERGY_COST,
    };
    pub use crate::snapshot::KernelSnapshot;
    pub use crate::stash::Stash;
    pub use crate::store::ComponentStore;
    pub use crate::KernelError;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    //! Cross-module scenarios; per-mechanism cases live with their modules.

    use crate::prelude::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Creature {
        meta: ComponentMeta,
        schedule: Schedule,
    }

    crate::impl_component!(Creature, "creature", [ACTOR_ROLE], {
        fn as_actor(&self) -> Option<&dyn crate::schedule::Actor> {
            Some(self)
        }

        fn as_actor_mut(&mut self) -> Option<&mut dyn crate::schedule::Actor> {
            Some(self)
        }
    });

    impl Actor for Creature {
        fn schedule(&self) -> &Schedule {
            &self.schedule
        }

        fn schedule_mut(&mut self) -> &mut Schedule {
            &mut self.schedule
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Wander {
        meta: ComponentMeta,
        previous: Option<ComponentId>,
    }

    crate::impl_component!(Wander, "wander", [BEHAVIOR_ROLE], {
        fn as_behavior(&self) -> Option<&dyn crate::behavior::Behavior> {
            Some(self)
        }

        fn as_behavior_mut(&mut self) -> Option<&mut dyn crate::behavior::Behavior> {
            Some(self)
        }
    });

    impl Behavior for Wander {
        fn previous_behavior_id(&self) -> Option<ComponentId> {
            self.previous
        }

        fn set_previous_behavior_id(&mut self, id: Option<ComponentId>) {
            self.previous = id;
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Flee {
        meta: ComponentMeta,
        previous: Option<ComponentId>,
        from: EntityId,
    }

    crate::impl_component!(Flee, "flee", [BEHAVIOR_ROLE], {
        fn as_behavior(&self) -> Option<&dyn crate::behavior::Behavior> {
            Some(self)
        }

        fn as_behavior_mut(&mut self) -> Option<&mut dyn crate::behavior::Behavior> {
            Some(self)
        }
    });

    impl Behavior for Flee {
        fn previous_behavior_id(&self) -> Option<ComponentId> {
            self.previous
        }

        fn set_previous_behavior_id(&mut self, id: Option<ComponentId>) {
            self.previous = id;
        }
    }

    const HEARS_NOISE: Role = "hears-noise";

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Ear {
        meta: ComponentMeta,
        heard: u32,
    }

    crate::impl_component!(Ear, "ear", [HEARS_NOISE]);

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct NoiseEvent {
        meta: ComponentMeta,
        loudness: u32,
    }

    crate::impl_component!(NoiseEvent, "noise-event", [EVENT_ROLE], {
        fn as_event(&self) -> Option<&dyn crate::event::Event> {
            Some(self)
        }
    });

    impl Event for NoiseEvent {
        fn listener_role(&self) -> Role {
            HEARS_NOISE
        }

        fn notify(&self, store: &mut ComponentStore, listener: ComponentId) {
            if let Ok(ear) = store.get_mut::<Ear>(listener) {
                ear.heard += self.loudness;
            }
        }
    }

    fn kernel() -> (ComponentStore, Stash) {
        let mut store = ComponentStore::new();
        store.register_component::<Creature>();
        store.register_component::<Wander>();
        store.register_component::<Flee>();
        store.register_component::<Ear>();
        store.register_component::<NoiseEvent>();
        (store, Stash::new())
    }

    fn spawn_rabbit(store: &mut ComponentStore) -> (EntityId, ComponentId, ComponentId) {
        let rabbit = store.allocate_entity();
        let actor = store
            .insert(Creature {
                meta: ComponentMeta::new(rabbit),
                schedule: Schedule::default(),
            })
            .unwrap();
        let behavior = store
            .insert(Wander {
                meta: ComponentMeta::new(rabbit),
                previous: None,
            })
            .unwrap();
        (rabbit, actor, behavior)
    }

    #[test]
    fn stashed_actor_sits_out_scheduling() {
        let (mut store, mut stash) = kernel();
        let (rabbit, actor, _) = spawn_rabbit(&mut store);
        assert_eq!(ready_actors(&store, 0), vec![actor]);

        stash.stash_entity(&mut store, rabbit).unwrap();
        assert!(ready_actors(&store, 0).is_empty());

        stash.unstash_entity(&mut store, rabbit).unwrap();
        assert_eq!(ready_actors(&store, 0), vec![actor]);
    }

    #[test]
    fn event_triggers_behavior_swap_which_unwinds() {
        let (mut store, mut stash) = kernel();
        let (rabbit, _, wander_id) = spawn_rabbit(&mut store);
        let fox = store.allocate_entity();

        // A noise sends the rabbit into flee mode.
        store
            .insert(Ear {
                meta: ComponentMeta::new(rabbit),
                heard: 0,
            })
            .unwrap();
        store
            .insert(NoiseEvent {
                meta: ComponentMeta::new(fox),
                loudness: 9,
            })
            .unwrap();
        assert_eq!(dispatch_events(&mut store), 1);

        let flee_id = swap(
            &mut store,
            &mut stash,
            rabbit,
            Flee {
                meta: ComponentMeta::new(rabbit),
                previous: None,
                from: fox,
            },
        )
        .unwrap();
        assert_eq!(active_behavior(&store, rabbit), Some(flee_id));
        assert_eq!(store.get::<Flee>(flee_id).unwrap().from, fox);

        // Danger passes, the rabbit goes back to wandering.
        let restored = back_out(&mut store, &mut stash, flee_id).unwrap();
        assert_eq!(restored, wander_id);
        assert_eq!(active_behavior(&store, rabbit), Some(wander_id));
    }

    #[test]
    fn snapshot_round_trips_a_mid_swap_behavior_stack() {
        let (mut store, mut stash) = kernel();
        let (rabbit, _, wander_id) = spawn_rabbit(&mut store);
        let fox = store.allocate_entity();
        let flee_id = swap(
            &mut store,
            &mut stash,
            rabbit,
            Flee {
                meta: ComponentMeta::new(rabbit),
                previous: None,
                from: fox,
            },
        )
        .unwrap();

        let json = KernelSnapshot::capture(&store, &stash).to_json().unwrap();

        let (mut store2, mut stash2) = kernel();
        KernelSnapshot::from_json(&json)
            .unwrap()
            .restore_into(&mut store2, &mut stash2)
            .unwrap();

        // The stack unwinds in the restored kernel exactly as it would have.
        assert_eq!(active_behavior(&store2, rabbit), Some(flee_id));
        let restored = back_out(&mut store2, &mut stash2, flee_id).unwrap();
        assert_eq!(restored, wander_id);
    }

    #[test]
    fn pending_event_survives_save_load_and_then_fires() {
        let (mut store, mut stash) = kernel();
        let (rabbit, _, _) = spawn_rabbit(&mut store);
        let ear = store
            .insert(Ear {
                meta: ComponentMeta::new(rabbit),
                heard: 0,
            })
            .unwrap();
        store
            .insert(NoiseEvent {
                meta: ComponentMeta::new(rabbit),
                loudness: 3,
            })
            .unwrap();

        let snapshot = KernelSnapshot::capture(&store, &stash);
        let (mut store2, mut stash2) = kernel();
        snapshot.restore_into(&mut store2, &mut stash2).unwrap();

        assert_eq!(dispatch_events(&mut store2), 1);
        assert_eq!(store2.get::<Ear>(ear).unwrap().heard, 3);
    }

    #[test]
    fn loaded_kernel_keeps_minting_fresh_ids() {
        let (mut store, mut stash) = kernel();
        let (_, _, behavior_id) = spawn_rabbit(&mut store);

        let snapshot = KernelSnapshot::capture(&store, &stash);
        let (mut store2, mut stash2) = kernel();
        snapshot.restore_into(&mut store2, &mut stash2).unwrap();

        let squirrel = store2.allocate_entity();
        let fresh = store2
            .insert(Wander {
                meta: ComponentMeta::new(squirrel),
                previous: None,
            })
            .unwrap();
        assert!(fresh.to_raw() > behavior_id.to_raw());
        assert!(squirrel.to_raw() > 1);
    }
}
