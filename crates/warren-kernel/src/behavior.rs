//! Per-entity behavior stack.
//!
//! An entity's decision logic lives in a behavior component. Swapping pushes
//! the active behavior into the stash and installs a replacement that
//! remembers its predecessor's id; backing out discards the active behavior
//! and restores the predecessor. Because stashed components keep their ids,
//! the chain of `previous_behavior_id` links forms a stack of arbitrary
//! depth at no extra bookkeeping.

use tracing::debug;

use crate::component::{Component, Role};
use crate::entity::{ComponentId, EntityId};
use crate::stash::Stash;
use crate::store::ComponentStore;
use crate::KernelError;

/// Role under which every behavior component is indexed.
pub const BEHAVIOR_ROLE: Role = "behavior";

/// Capability of components that drive an entity's decisions.
///
/// Implementors expose themselves through [`Component::as_behavior`] and
/// carry [`BEHAVIOR_ROLE`] in their role list.
pub trait Behavior: Component {
    /// Id of the behavior this one replaced, if it was installed by a swap.
    fn previous_behavior_id(&self) -> Option<ComponentId>;

    fn set_previous_behavior_id(&mut self, id: Option<ComponentId>);

    /// Hook run while backing out, after this behavior has been detached and
    /// before its predecessor is restored. The behavior is dropped when the
    /// hook returns.
    fn on_back_out(&self, _store: &mut ComponentStore) {}
}

/// Id of the entity's active behavior, if it has one.
pub fn active_behavior(store: &ComponentStore, entity: EntityId) -> Option<ComponentId> {
    store
        .ids_with_role_for_entity(BEHAVIOR_ROLE, entity)
        .first()
        .copied()
}

/// Replace the entity's active behavior with `new_behavior`, stashing the
/// current one. Returns the id of the installed behavior.
///
/// # Errors
///
/// `NoActiveBehavior` if the entity has no behavior to replace,
/// `NotABehavior` if `new_behavior` does not expose the behavior capability.
pub fn swap<B: Component>(
    store: &mut ComponentStore,
    stash: &mut Stash,
    entity: EntityId,
    new_behavior: B,
) -> Result<ComponentId, KernelError> {
    let current_id =
        active_behavior(store, entity).ok_or(KernelError::NoActiveBehavior { entity })?;

    let mut boxed: Box<dyn Component> = Box::new(new_behavior);
    match boxed.as_behavior_mut() {
        Some(b) => b.set_previous_behavior_id(Some(current_id)),
        None => {
            return Err(KernelError::NotABehavior {
                name: boxed.type_name(),
            })
        }
    }

    stash.stash_component(store, current_id)?;
    let new_id = store.insert_boxed(boxed)?;
    debug!(entity = %entity, from = %current_id, to = %new_id, "behavior swap");
    Ok(new_id)
}

/// Discard the behavior `current_id` and restore the one it replaced.
/// Returns the id of the restored behavior.
///
/// The discarded behavior's [`Behavior::on_back_out`] hook runs after it has
/// been detached, so the hook sees a store in which it is no longer live.
///
/// # Errors
///
/// `UnknownComponent` if `current_id` is not live, `NotABehavior` if it does
/// not expose the behavior capability, `NoPreviousBehavior` if it was not
/// installed by a swap, `NotStashed` if its predecessor has since left the
/// stash (the current behavior stays installed in that case).
pub fn back_out(
    store: &mut ComponentStore,
    stash: &mut Stash,
    current_id: ComponentId,
) -> Result<ComponentId, KernelError> {
    // Validate before detaching so failures leave the store untouched.
    let current = store.lookup_by_id(current_id)?;
    let previous_id = match current.as_behavior() {
        Some(b) => b
            .previous_behavior_id()
            .ok_or(KernelError::NoPreviousBehavior { id: current_id })?,
        None => {
            return Err(KernelError::NotABehavior {
                name: current.type_name(),
            })
        }
    };

    let current = store.detach(current_id)?;
    if let Some(b) = current.as_behavior() {
        b.on_back_out(store);
    }

    match stash.unstash_component(store, previous_id) {
        Ok(restored) => {
            debug!(from = %current_id, to = %restored, "behavior back out");
            Ok(restored)
        }
        Err(err) => {
            // Predecessor gone; keep the current behavior installed rather
            // than leave the entity with none.
            store.reinsert(current);
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
