//! Discrete-turn scheduling.
//!
//! Time is a monotonically increasing tick counter. Each actor carries a
//! [`Schedule`] naming the next tick it may act and the energy cost of an
//! action; acting pushes the schedule forward by that cost. There is no
//! real-time clock anywhere in the kernel.

use serde::{Deserialize, Serialize};

use crate::component::{Component, Role};
use crate::entity::ComponentId;
use crate::store::ComponentStore;

/// The discrete turn counter type.
pub type Tick = u64;

/// Role under which every actor component is indexed.
pub const ACTOR_ROLE: Role = "actor";

/// Energy cost of a standard action.
pub const DEFAULT_ENERGY_COST: u64 = 100;

/// Per-actor turn schedule.
///
/// `is_recharging` gates participation: a paused or suspended actor keeps
/// its schedule but is skipped by [`ready_actors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub next_turn_to_act: Tick,
    pub energy_cost: u64,
    pub is_recharging: bool,
}

impl Schedule {
    /// A schedule ready to act immediately at the given cost.
    pub fn with_cost(energy_cost: u64) -> Self {
        Self {
            next_turn_to_act: 0,
            energy_cost,
            is_recharging: true,
        }
    }

    /// Whether the actor's turn has arrived at `tick`.
    pub fn can_act(&self, tick: Tick) -> bool {
        tick >= self.next_turn_to_act
    }

    /// Consume the current turn: schedule the next action `energy_cost`
    /// ticks after `tick`.
    pub fn pass_turn(&mut self, tick: Tick) {
        self.next_turn_to_act = tick.saturating_add(self.energy_cost);
    }

    /// Consume the current turn with an explicit delay, for actions cheaper
    /// or dearer than the actor's standard cost.
    pub fn pass_turn_with_delay(&mut self, tick: Tick, delay: u64) {
        self.next_turn_to_act = tick.saturating_add(delay);
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::with_cost(DEFAULT_ENERGY_COST)
    }
}

/// Capability of components that take turns.
///
/// Implementors expose themselves through [`Component::as_actor`] and carry
/// [`ACTOR_ROLE`] in their role list so the store indexes them for
/// [`ready_actors`].
pub trait Actor: Component {
    fn schedule(&self) -> &Schedule;
    fn schedule_mut(&mut self) -> &mut Schedule;
}

/// Ids of every live actor whose turn has arrived at `tick` and which is
/// participating, in actor insertion order.
///
/// Components indexed under [`ACTOR_ROLE`] that do not expose the actor
/// capability are skipped silently.
pub fn ready_actors(store: &ComponentStore, tick: Tick) -> Vec<ComponentId> {
    store
        .components_with_role(ACTOR_ROLE)
        .filter(|c| {
            c.as_actor()
                .map_or(false, |a| a.schedule().is_recharging && a.schedule().can_act(tick))
        })
        .map(|c| c.id())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
