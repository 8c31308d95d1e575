//! The [`ComponentStore`] -- live, multi-indexed storage for every component.
//!
//! The store maintains three index axes over one set of boxed components:
//!
//! - a flat id map for O(1) `lookup_by_id`,
//! - an insertion-ordered slice per role (the concrete type name counts as a
//!   role) for `query_by_type` and role enumeration,
//! - a per-entity slice, per role and overall, for `query_one`/`query_all`
//!   and cascade deletion.
//!
//! Deleting a component removes it from every slice it was registered under,
//! including every declared role, so broader-role queries never accumulate
//! dangling entries. Iteration order within a slice is insertion order, which
//! callers rely on for deterministic passes.
//!
//! The store is strictly single-threaded and turn-synchronous. The one
//! load-bearing rule is snapshot-before-mutate: any pass that may delete from
//! an index it is iterating must iterate a materialized copy (`ids_with_role`
//! and friends), never the live slice.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::component::{Component, ComponentKind, ComponentRegistry, Role};
use crate::entity::{ComponentId, EntityId, IdAllocator, IdAllocatorState};
use crate::KernelError;

/// Live, multi-indexed collection of active components.
pub struct ComponentStore {
    ids: IdAllocator,
    registry: ComponentRegistry,
    /// Flat id map. Owns every live component.
    components: HashMap<ComponentId, Box<dyn Component>>,
    /// Insertion-ordered ids per role (concrete type name included).
    by_role: HashMap<Role, Vec<ComponentId>>,
    /// Insertion-ordered ids per (entity, role).
    by_entity_role: HashMap<(EntityId, Role), Vec<ComponentId>>,
    /// Every live component owned by an entity, in insertion order.
    by_entity: HashMap<EntityId, Vec<ComponentId>>,
}

impl ComponentStore {
    /// Create an empty store with a fresh identity allocator.
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            registry: ComponentRegistry::new(),
            components: HashMap::new(),
            by_role: HashMap::new(),
            by_entity_role: HashMap::new(),
            by_entity: HashMap::new(),
        }
    }

    // -- registry / identity ------------------------------------------------

    /// Register a component type for save/load reconstruction.
    pub fn register_component<T>(&mut self)
    where
        T: ComponentKind + Clone + Serialize + DeserializeOwned,
    {
        self.registry.register::<T>();
    }

    /// Read-only access to the type registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Read-only access to the identity allocator.
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Mint a fresh entity id.
    pub fn allocate_entity(&mut self) -> EntityId {
        self.ids.allocate_entity()
    }

    /// Replace the allocator counters (load path).
    pub fn import_ids(&mut self, state: IdAllocatorState) {
        self.ids.import(state);
    }

    /// Drop every live component and index entry. Leaves the registry and
    /// the allocator untouched; the load path imports allocator state
    /// separately.
    pub fn clear(&mut self) {
        self.components.clear();
        self.by_role.clear();
        self.by_entity_role.clear();
        self.by_entity.clear();
    }

    // -- insertion ----------------------------------------------------------

    /// Insert a component, assigning it a fresh id and registering it under
    /// its concrete type, every declared role, and its owning entity.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the component references [`EntityId::INVALID`] --
    /// a caller error.
    pub fn insert(&mut self, component: impl Component) -> Result<ComponentId, KernelError> {
        self.insert_boxed(Box::new(component))
    }

    /// Boxed form of [`insert`](Self::insert).
    pub fn insert_boxed(
        &mut self,
        mut component: Box<dyn Component>,
    ) -> Result<ComponentId, KernelError> {
        if !component.entity().is_valid() {
            return Err(KernelError::InvalidEntity);
        }
        let id = self.ids.allocate_component();
        component.meta_mut().id = id;
        trace!(component_id = %id, entity = %component.entity(), type_name = component.type_name(), "insert");
        self.attach(id, component);
        Ok(id)
    }

    /// Re-register a previously detached component under its existing id.
    /// Used by the stash and the load path; never assigns a new id.
    pub(crate) fn reinsert(&mut self, component: Box<dyn Component>) -> ComponentId {
        let id = component.id();
        debug_assert_ne!(id, ComponentId::UNASSIGNED);
        debug_assert!(!self.components.contains_key(&id));
        self.attach(id, component);
        id
    }

    fn attach(&mut self, id: ComponentId, component: Box<dyn Component>) {
        let entity = component.entity();
        for role in index_roles(component.as_ref()) {
            self.by_role.entry(role).or_default().push(id);
            self.by_entity_role.entry((entity, role)).or_default().push(id);
        }
        self.by_entity.entry(entity).or_default().push(id);
        self.components.insert(id, component);
    }

    // -- deletion -----------------------------------------------------------

    /// Remove a component from every index slice and hand the box back to the
    /// caller (stash moves, event consumption).
    pub(crate) fn detach(&mut self, id: ComponentId) -> Result<Box<dyn Component>, KernelError> {
        let component = self
            .components
            .remove(&id)
            .ok_or(KernelError::UnknownComponent { id })?;
        let entity = component.entity();
        for role in index_roles(component.as_ref()) {
            if let Some(slice) = self.by_role.get_mut(role) {
                slice.retain(|c| *c != id);
                if slice.is_empty() {
                    self.by_role.remove(role);
                }
            }
            if let Some(slice) = self.by_entity_role.get_mut(&(entity, role)) {
                slice.retain(|c| *c != id);
                if slice.is_empty() {
                    self.by_entity_role.remove(&(entity, role));
                }
            }
        }
        if let Some(slice) = self.by_entity.get_mut(&entity) {
            slice.retain(|c| *c != id);
            if slice.is_empty() {
                self.by_entity.remove(&entity);
            }
        }
        Ok(component)
    }

    /// Delete a component by id.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if the id is not live (deleted, stashed, or never
    /// inserted).
    pub fn delete_component(&mut self, id: ComponentId) -> Result<(), KernelError> {
        self.detach(id).map(|component| {
            trace!(component_id = %id, type_name = component.type_name(), "delete");
        })
    }

    /// Delete every live component owned by `entity`. Idempotent: repeat
    /// calls are no-ops. Components already in the stash are unaffected.
    pub fn delete_entity(&mut self, entity: EntityId) {
        let Some(owned) = self.by_entity.get(&entity).cloned() else {
            return;
        };
        for id in owned {
            // Every id was live when the copy was taken.
            let _ = self.detach(id);
        }
    }

    // -- typed queries ------------------------------------------------------

    /// All live components of concrete type `T`, in insertion order.
    /// Predicate and projection compose as ordinary iterator adapters.
    pub fn query_by_type<T: ComponentKind>(&self) -> impl Iterator<Item = &T> + '_ {
        self.by_role
            .get(T::TYPE_NAME)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.components
                    .get(id)
                    .and_then(|c| c.as_any().downcast_ref::<T>())
            })
    }

    /// First live `T` owned by `entity`, if any. Use
    /// [`query_all`](Self::query_all) when multiplicity is possible.
    pub fn query_one<T: ComponentKind>(&self, entity: EntityId) -> Option<&T> {
        self.by_entity_role
            .get(&(entity, T::TYPE_NAME))
            .and_then(|ids| ids.first())
            .and_then(|id| self.components.get(id))
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Mutable form of [`query_one`](Self::query_one).
    pub fn query_one_mut<T: ComponentKind>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = *self
            .by_entity_role
            .get(&(entity, T::TYPE_NAME))?
            .first()?;
        self.components
            .get_mut(&id)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Every live `T` owned by `entity`, in insertion order.
    pub fn query_all<T: ComponentKind>(&self, entity: EntityId) -> Vec<&T> {
        self.by_entity_role
            .get(&(entity, T::TYPE_NAME))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        self.components
                            .get(id)
                            .and_then(|c| c.as_any().downcast_ref::<T>())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- id queries ---------------------------------------------------------

    /// Look up a live component by id.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` for stashed, deleted, or never-inserted ids.
    pub fn lookup_by_id(&self, id: ComponentId) -> Result<&dyn Component, KernelError> {
        self.components
            .get(&id)
            .map(|c| c.as_ref())
            .ok_or(KernelError::UnknownComponent { id })
    }

    /// Mutable form of [`lookup_by_id`](Self::lookup_by_id).
    pub fn lookup_by_id_mut(&mut self, id: ComponentId) -> Result<&mut dyn Component, KernelError> {
        self.components
            .get_mut(&id)
            .map(|c| c.as_mut())
            .ok_or(KernelError::UnknownComponent { id })
    }

    /// Typed lookup by id.
    pub fn get<T: ComponentKind>(&self, id: ComponentId) -> Result<&T, KernelError> {
        self.lookup_by_id(id)?
            .as_any()
            .downcast_ref::<T>()
            .ok_or(KernelError::ComponentTypeMismatch {
                id,
                expected: T::TYPE_NAME,
            })
    }

    /// Typed mutable lookup by id.
    pub fn get_mut<T: ComponentKind>(&mut self, id: ComponentId) -> Result<&mut T, KernelError> {
        self.lookup_by_id_mut(id)?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(KernelError::ComponentTypeMismatch {
                id,
                expected: T::TYPE_NAME,
            })
    }

    /// Whether `id` is live in the store.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    // -- role queries -------------------------------------------------------

    /// Live components registered under `role`, in insertion order. Borrows
    /// the live index; take [`ids_with_role`](Self::ids_with_role) instead
    /// when the pass may mutate the store.
    pub fn components_with_role(&self, role: Role) -> impl Iterator<Item = &dyn Component> + '_ {
        self.by_role
            .get(role)
            .into_iter()
            .flatten()
            .filter_map(|id| self.components.get(id).map(|c| c.as_ref()))
    }

    /// Materialized copy of the ids registered under `role`, in insertion
    /// order. This is the snapshot-before-mutate primitive.
    pub fn ids_with_role(&self, role: Role) -> Vec<ComponentId> {
        self.by_role.get(role).cloned().unwrap_or_default()
    }

    /// Materialized copy of the ids registered under `role` for one entity.
    pub fn ids_with_role_for_entity(&self, role: Role, entity: EntityId) -> Vec<ComponentId> {
        self.by_entity_role
            .get(&(entity, role))
            .cloned()
            .unwrap_or_default()
    }

    // -- entity queries -----------------------------------------------------

    /// Materialized copy of every live component id owned by `entity`, in
    /// insertion order.
    pub fn entity_components(&self, entity: EntityId) -> Vec<ComponentId> {
        self.by_entity.get(&entity).cloned().unwrap_or_default()
    }

    /// Whether `entity` currently owns any live component.
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.by_entity.contains_key(&entity)
    }

    /// Every entity owning at least one live component, sorted.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities: Vec<EntityId> = self.by_entity.keys().copied().collect();
        entities.sort_unstable();
        entities
    }

    /// Number of entities owning at least one live component.
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    /// Number of live components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Whether the store holds no live components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Unordered iteration over every live component (snapshot capture).
    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.values().map(|c| c.as_ref())
    }
}

/// The index slices a component belongs to: its concrete type name plus every
/// declared role, deduplicated.
fn index_roles(component: &dyn Component) -> Vec<Role> {
    let type_name = component.type_name();
    let mut roles = vec![type_name];
    for role in component.roles() {
        if *role != type_name && !roles.contains(role) {
            roles.push(role);
        }
    }
    roles
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("component_count", &self.components.len())
            .field("entity_count", &self.by_entity.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
