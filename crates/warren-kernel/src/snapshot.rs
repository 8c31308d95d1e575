//! Full-state save and load.
//!
//! A [`KernelSnapshot`] captures every live and stashed component as a typed
//! JSON record plus the allocator watermarks, so a restored kernel continues
//! minting fresh ids and every stashed unit restores under its original ids.
//! Capture is deterministic: records are sorted by component id and entity
//! units keyed through a `BTreeMap`, so equal states produce byte-equal
//! JSON.
//!
//! Restore validates every type name against the registry before touching
//! existing state; an unknown name fails the whole load and leaves the
//! kernel as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::component::Component;
use crate::entity::{ComponentId, EntityId, IdAllocatorState};
use crate::stash::Stash;
use crate::store::ComponentStore;
use crate::KernelError;

/// One serialized component: identity, registered type name, and the type's
/// own fields as a JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub entity: EntityId,
    pub type_name: String,
    pub data: serde_json::Value,
}

impl ComponentRecord {
    fn capture(store: &ComponentStore, component: &dyn Component) -> Option<Self> {
        let Some(info) = store.registry().lookup(component.type_name()) else {
            warn!(
                component_id = %component.id(),
                type_name = component.type_name(),
                "component type not registered, omitting from snapshot"
            );
            return None;
        };
        match info.to_value(component) {
            Ok(data) => Some(Self {
                id: component.id(),
                entity: component.entity(),
                type_name: component.type_name().to_owned(),
                data,
            }),
            Err(err) => {
                warn!(
                    component_id = %component.id(),
                    type_name = component.type_name(),
                    error = %err,
                    "component failed to serialize, omitting from snapshot"
                );
                None
            }
        }
    }
}

/// Complete kernel state: live components, stashed components, stashed
/// entity units, and the id allocator watermarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSnapshot {
    pub ids: IdAllocatorState,
    pub live: Vec<ComponentRecord>,
    pub stashed: Vec<ComponentRecord>,
    pub stashed_entities: BTreeMap<EntityId, Vec<ComponentId>>,
}

impl KernelSnapshot {
    /// Capture the full state of a store and its stash.
    pub fn capture(store: &ComponentStore, stash: &Stash) -> Self {
        let mut live: Vec<ComponentRecord> = store
            .iter()
            .filter_map(|c| ComponentRecord::capture(store, c))
            .collect();
        live.sort_by_key(|r| r.id);

        let mut stashed: Vec<ComponentRecord> = stash
            .iter()
            .filter_map(|c| ComponentRecord::capture(store, c))
            .collect();
        stashed.sort_by_key(|r| r.id);

        let stashed_entities = stash
            .entity_units()
            .iter()
            .map(|(entity, unit)| (*entity, unit.clone()))
            .collect();

        Self {
            ids: store.ids().export(),
            live,
            stashed,
            stashed_entities,
        }
    }

    /// Replace the store and stash contents with this snapshot's state.
    ///
    /// Every type name is resolved against the registry first; an unknown
    /// name is fatal and existing state stays untouched. Individual records
    /// that fail to deserialize after that are logged and skipped, with one
    /// summary warning on any count mismatch.
    ///
    /// # Errors
    ///
    /// `UnknownComponentType` if any record names an unregistered type.
    pub fn restore_into(
        &self,
        store: &mut ComponentStore,
        stash: &mut Stash,
    ) -> Result<(), KernelError> {
        for record in self.live.iter().chain(self.stashed.iter()) {
            if store.registry().lookup(&record.type_name).is_none() {
                return Err(KernelError::UnknownComponentType {
                    name: record.type_name.clone(),
                    registered: store.registry().registered_names().join(", "),
                });
            }
        }

        store.clear();
        stash.clear();
        store.import_ids(self.ids.clone());

        let mut live_restored = 0usize;
        for record in &self.live {
            if let Some(component) = Self::rebuild(store, record) {
                store.reinsert(component);
                live_restored += 1;
            }
        }

        let mut stash_restored = 0usize;
        for record in &self.stashed {
            if let Some(component) = Self::rebuild(store, record) {
                stash.insert_raw(component);
                stash_restored += 1;
            }
        }
        for (entity, unit) in &self.stashed_entities {
            stash.set_entity_unit(*entity, unit.clone());
        }

        if live_restored != self.live.len() || stash_restored != self.stashed.len() {
            warn!(
                live_expected = self.live.len(),
                live_restored,
                stash_expected = self.stashed.len(),
                stash_restored,
                "snapshot restored with missing components"
            );
        }
        info!(
            live = live_restored,
            stashed = stash_restored,
            entities = store.entity_count(),
            "snapshot restored"
        );
        Ok(())
    }

    fn rebuild(store: &ComponentStore, record: &ComponentRecord) -> Option<Box<dyn Component>> {
        // Presence was validated up front.
        let info = store.registry().lookup(&record.type_name)?;
        match info.from_value(&record.data) {
            Ok(component) => Some(component),
            Err(err) => {
                warn!(
                    component_id = %record.id,
                    type_name = %record.type_name,
                    error = %err,
                    "component record failed to deserialize, skipping"
                );
                None
            }
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, KernelError> {
        serde_json::to_string_pretty(self).map_err(|e| KernelError::SnapshotFormat {
            details: e.to_string(),
        })
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        serde_json::from_str(json).map_err(|e| KernelError::SnapshotFormat {
            details: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
