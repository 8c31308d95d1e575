//! The [`Stash`] -- secondary storage for components temporarily detached
//! from the store.
//!
//! A live component is reachable from exactly one place: the store's indexes
//! or the stash, never both and never neither. Single components stash by id;
//! a whole entity stashes as a named unit (the entity id plus the exact set
//! of component ids moved together) and restores only as that unit.
//!
//! Stashed components keep their ids. A stashed unit whose entity is later
//! deleted live-side simply dangles by id -- restoring it brings the
//! components back, and dropping it deletes them through the store's normal
//! deletion path.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::component::Component;
use crate::entity::{ComponentId, EntityId};
use crate::store::ComponentStore;
use crate::KernelError;

/// Secondary storage for detached components, restorable by id.
pub struct Stash {
    components: HashMap<ComponentId, Box<dyn Component>>,
    /// Entity units: the exact component id set moved together.
    entities: HashMap<EntityId, Vec<ComponentId>>,
}

impl Stash {
    /// Create an empty stash.
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    // -- single components --------------------------------------------------

    /// Move one live component out of the store into the stash.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if `id` is not live (already stashed ids are not
    /// live either).
    pub fn stash_component(
        &mut self,
        store: &mut ComponentStore,
        id: ComponentId,
    ) -> Result<(), KernelError> {
        let component = store.detach(id)?;
        trace!(component_id = %id, "stash component");
        self.components.insert(id, component);
        Ok(())
    }

    /// Restore a stashed component into the store, keeping its id.
    ///
    /// # Errors
    ///
    /// `NotStashed` if `id` has no stashed component.
    pub fn unstash_component(
        &mut self,
        store: &mut ComponentStore,
        id: ComponentId,
    ) -> Result<ComponentId, KernelError> {
        let component = self
            .components
            .remove(&id)
            .ok_or(KernelError::NotStashed { id })?;
        trace!(component_id = %id, "unstash component");
        Ok(store.reinsert(component))
    }

    // -- entity units -------------------------------------------------------

    /// Move every live component owned by `entity` into the stash as one
    /// named unit. Returns the unit's component ids in store insertion order.
    ///
    /// # Errors
    ///
    /// `NothingToStash` if the entity owns no live components,
    /// `EntityAlreadyStashed` if a unit for it already exists.
    pub fn stash_entity(
        &mut self,
        store: &mut ComponentStore,
        entity: EntityId,
    ) -> Result<Vec<ComponentId>, KernelError> {
        if self.entities.contains_key(&entity) {
            return Err(KernelError::EntityAlreadyStashed { entity });
        }
        let unit = store.entity_components(entity);
        if unit.is_empty() {
            return Err(KernelError::NothingToStash { entity });
        }
        for id in &unit {
            // Every id was live when the unit was materialized.
            let component = store.detach(*id)?;
            self.components.insert(*id, component);
        }
        trace!(entity = %entity, components = unit.len(), "stash entity");
        self.entities.insert(entity, unit.clone());
        Ok(unit)
    }

    /// Restore a stashed entity unit: every component recorded at stash time,
    /// and only those. Partial restore is unsupported.
    ///
    /// # Errors
    ///
    /// `EntityNotStashed` if no unit exists for `entity`.
    pub fn unstash_entity(
        &mut self,
        store: &mut ComponentStore,
        entity: EntityId,
    ) -> Result<Vec<ComponentId>, KernelError> {
        let unit = self
            .entities
            .remove(&entity)
            .ok_or(KernelError::EntityNotStashed { entity })?;
        for id in &unit {
            if let Some(component) = self.components.remove(id) {
                store.reinsert(component);
            } else {
                // A recorded id with no stashed box means the unit was
                // corrupted externally; surface loudly rather than mask it.
                return Err(KernelError::NotStashed { id: *id });
            }
        }
        trace!(entity = %entity, components = unit.len(), "unstash entity");
        Ok(unit)
    }

    /// Drop a stashed entity: unstash, then delete each component through the
    /// store's normal deletion path, so per-component cleanup runs exactly
    /// once whether the entity was live or stashed.
    pub fn drop_entity(
        &mut self,
        store: &mut ComponentStore,
        entity: EntityId,
    ) -> Result<(), KernelError> {
        let unit = self.unstash_entity(store, entity)?;
        for id in unit {
            store.delete_component(id)?;
        }
        Ok(())
    }

    // -- inspection ---------------------------------------------------------

    /// Whether `id` is currently stashed.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Peek at a stashed component without restoring it.
    pub fn component(&self, id: ComponentId) -> Option<&dyn Component> {
        self.components.get(&id).map(|c| c.as_ref())
    }

    /// The component ids of a stashed entity unit, if one exists.
    pub fn stashed_entity(&self, entity: EntityId) -> Option<&[ComponentId]> {
        self.entities.get(&entity).map(|ids| ids.as_slice())
    }

    /// Number of stashed components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of stashed entity units.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether the stash holds nothing.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.entities.is_empty()
    }

    // -- load-path internals ------------------------------------------------

    /// Unordered iteration over every stashed component (snapshot capture).
    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.values().map(|c| c.as_ref())
    }

    /// The entity-unit map (snapshot capture).
    pub(crate) fn entity_units(&self) -> &HashMap<EntityId, Vec<ComponentId>> {
        &self.entities
    }

    /// Place a reconstructed component directly into the stash (load path).
    pub(crate) fn insert_raw(&mut self, component: Box<dyn Component>) {
        self.components.insert(component.id(), component);
    }

    /// Record a reconstructed entity unit (load path).
    pub(crate) fn set_entity_unit(&mut self, entity: EntityId, unit: Vec<ComponentId>) {
        self.entities.insert(entity, unit);
    }

    /// Drop everything (load path).
    pub(crate) fn clear(&mut self) {
        self.components.clear();
        self.entities.clear();
    }
}

impl Default for Stash {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stash")
            .field("component_count", &self.components.len())
            .field("entity_count", &self.entities.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentMeta;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Hunger {
        meta: ComponentMeta,
        fullness: u32,
    }

    crate::impl_component!(Hunger, "hunger", []);

    fn hunger(entity: u64, fullness: u32) -> Hunger {
        Hunger {
            meta: ComponentMeta::new(EntityId::new(entity)),
            fullness,
        }
    }

    #[test]
    fn stash_round_trip_preserves_id_and_fields() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        let id = store.insert(hunger(5, 42)).unwrap();

        stash.stash_component(&mut store, id).unwrap();
        // Unreachable from live queries while stashed.
        assert!(store.lookup_by_id(id).is_err());
        assert!(store.query_one::<Hunger>(EntityId::new(5)).is_none());
        assert!(stash.contains(id));

        let restored = stash.unstash_component(&mut store, id).unwrap();
        assert_eq!(restored, id);
        assert_eq!(store.get::<Hunger>(id).unwrap().fullness, 42);
        assert!(!stash.contains(id));
    }

    #[test]
    fn stash_twice_is_an_error() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        let id = store.insert(hunger(5, 1)).unwrap();
        stash.stash_component(&mut store, id).unwrap();
        assert!(matches!(
            stash.stash_component(&mut store, id),
            Err(KernelError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn unstash_never_stashed_is_an_error() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        assert!(matches!(
            stash.unstash_component(&mut store, ComponentId::from_raw(7)),
            Err(KernelError::NotStashed { .. })
        ));
    }

    #[test]
    fn entity_unit_round_trip_restores_exact_set() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        let c1 = store.insert(hunger(9, 1)).unwrap();
        let c2 = store.insert(hunger(9, 2)).unwrap();
        let bystander = store.insert(hunger(4, 3)).unwrap();

        let unit = stash.stash_entity(&mut store, EntityId::new(9)).unwrap();
        assert_eq!(unit, vec![c1, c2]);
        assert!(store.lookup_by_id(c1).is_err());
        assert!(store.lookup_by_id(c2).is_err());
        assert!(store.contains(bystander));
        assert_eq!(stash.stashed_entity(EntityId::new(9)), Some(&unit[..]));

        let restored = stash.unstash_entity(&mut store, EntityId::new(9)).unwrap();
        assert_eq!(restored, vec![c1, c2]);
        assert_eq!(store.get::<Hunger>(c1).unwrap().fullness, 1);
        assert_eq!(store.get::<Hunger>(c2).unwrap().fullness, 2);
        assert!(stash.is_empty());
    }

    #[test]
    fn stash_entity_with_nothing_live_is_an_error() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        assert!(matches!(
            stash.stash_entity(&mut store, EntityId::new(1)),
            Err(KernelError::NothingToStash { .. })
        ));
    }

    #[test]
    fn stash_entity_twice_is_an_error() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        store.insert(hunger(9, 1)).unwrap();
        stash.stash_entity(&mut store, EntityId::new(9)).unwrap();

        // New component for the same entity, then a second unit attempt.
        store.insert(hunger(9, 2)).unwrap();
        assert!(matches!(
            stash.stash_entity(&mut store, EntityId::new(9)),
            Err(KernelError::EntityAlreadyStashed { .. })
        ));
    }

    #[test]
    fn drop_entity_deletes_without_resurrecting() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        let c1 = store.insert(hunger(9, 1)).unwrap();
        stash.stash_entity(&mut store, EntityId::new(9)).unwrap();

        stash.drop_entity(&mut store, EntityId::new(9)).unwrap();
        assert!(store.lookup_by_id(c1).is_err());
        assert!(stash.is_empty());
        assert!(!store.contains_entity(EntityId::new(9)));
    }

    #[test]
    fn live_entity_delete_leaves_stashed_components_alone() {
        let mut store = ComponentStore::new();
        let mut stash = Stash::new();
        let kept = store.insert(hunger(9, 1)).unwrap();
        let doomed = store.insert(hunger(9, 2)).unwrap();

        stash.stash_component(&mut store, kept).unwrap();
        store.delete_entity(EntityId::new(9));

        assert!(store.lookup_by_id(doomed).is_err());
        assert!(stash.contains(kept));

        // Restoring afterwards works; the id was never reused.
        stash.unstash_component(&mut store, kept).unwrap();
        assert_eq!(store.get::<Hunger>(kept).unwrap().fullness, 1);
    }
}
