//! The turn loop: rule systems driving scheduled actors tick by tick.
//!
//! Each tick collects the actors whose turn has arrived, runs the rule
//! system registered for each actor's component type, then dispatches
//! pending events and advances the clock. There is no real-time pacing;
//! ticks run as fast as the systems do.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use tracing::{debug, trace, warn};

use warren_kernel::event::{dispatch_events, EVENT_ROLE};
use warren_kernel::prelude::*;

/// How the loop orders actors that are ready on the same tick.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Seed for the tie-break shuffle. Same seed, same run.
    pub seed: u64,
    /// Shuffle same-tick actors before the cost sort instead of keeping
    /// store insertion order.
    pub shuffle_simultaneous: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            shuffle_simultaneous: false,
        }
    }
}

/// What a rule system sees while its actor takes a turn.
pub struct TurnContext<'a> {
    pub store: &'a mut ComponentStore,
    pub stash: &'a mut Stash,
    pub tick: Tick,
}

type SystemFn = Box<dyn FnMut(&mut TurnContext<'_>, ComponentId)>;

struct RuleSystem {
    name: &'static str,
    actor_type: &'static str,
    run: SystemFn,
}

/// Counters for one executed tick (or an accumulated run of ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnReport {
    /// The tick after execution.
    pub tick: Tick,
    pub actors_run: usize,
    pub events_delivered: usize,
}

/// Owns the kernel state and drives it through discrete turns.
pub struct TurnLoop {
    pub(crate) store: ComponentStore,
    pub(crate) stash: Stash,
    pub(crate) tick: Tick,
    systems: Vec<RuleSystem>,
    rng: Pcg32,
    config: TurnConfig,
}

impl TurnLoop {
    pub fn new(store: ComponentStore, config: TurnConfig) -> Self {
        Self {
            store,
            stash: Stash::new(),
            tick: 0,
            systems: Vec::new(),
            rng: Pcg32::seed_from_u64(config.seed),
            config,
        }
    }

    /// Register the rule system that takes turns for actors of one component
    /// type. One system per type; a later registration replaces the earlier.
    pub fn add_system(
        &mut self,
        name: &'static str,
        actor_type: &'static str,
        run: impl FnMut(&mut TurnContext<'_>, ComponentId) + 'static,
    ) {
        if let Some(existing) = self
            .systems
            .iter_mut()
            .find(|s| s.actor_type == actor_type)
        {
            warn!(
                system = name,
                replaces = existing.name,
                actor_type,
                "replacing rule system"
            );
            existing.name = name;
            existing.run = Box::new(run);
        } else {
            debug!(system = name, actor_type, "rule system registered");
            self.systems.push(RuleSystem {
                name,
                actor_type,
                run: Box::new(run),
            });
        }
    }

    /// Execute one tick: run every ready actor's system, dispatch events,
    /// advance the clock.
    pub fn tick(&mut self) -> TurnReport {
        let mut ready = ready_actors(&self.store, self.tick);
        if self.config.shuffle_simultaneous {
            ready.shuffle(&mut self.rng);
        }
        // Stable sort, so the shuffle (or insertion order) breaks ties
        // between equal-cost actors.
        let costs: Vec<u64> = ready.iter().map(|id| self.energy_cost(*id)).collect();
        let mut order: Vec<usize> = (0..ready.len()).collect();
        order.sort_by_key(|i| costs[*i]);
        let ready: Vec<ComponentId> = order.into_iter().map(|i| ready[i]).collect();

        trace!(tick = self.tick, ready = ready.len(), "tick start");
        let mut actors_run = 0;
        for actor_id in ready {
            // An earlier actor this tick may have removed or stashed it.
            if !self.store.contains(actor_id) {
                continue;
            }
            let Some(system_idx) = self.system_for(actor_id) else {
                continue;
            };

            let TurnLoop {
                ref mut store,
                ref mut stash,
                ref mut systems,
                tick,
                ..
            } = *self;
            let mut ctx = TurnContext { store, stash, tick };
            (systems[system_idx].run)(&mut ctx, actor_id);
            actors_run += 1;

            // Charge the turn unless the system already rescheduled the
            // actor (or removed it).
            if let Ok(component) = self.store.lookup_by_id_mut(actor_id) {
                if let Some(actor) = component.as_actor_mut() {
                    let schedule = actor.schedule_mut();
                    if schedule.can_act(self.tick) {
                        schedule.pass_turn(self.tick);
                    }
                }
            }
        }

        let events_delivered = dispatch_events(&mut self.store);
        self.tick = self.tick.saturating_add(1);
        TurnReport {
            tick: self.tick,
            actors_run,
            events_delivered,
        }
    }

    /// Execute `count` ticks, accumulating the counters.
    pub fn run_ticks(&mut self, count: u64) -> TurnReport {
        let mut total = TurnReport::default();
        for _ in 0..count {
            let report = self.tick();
            total.tick = report.tick;
            total.actors_run += report.actors_run;
            total.events_delivered += report.events_delivered;
        }
        total
    }

    /// Dispatch until no events are pending, including cascades started by
    /// the dispatches themselves. Pass count is capped; a cascade still
    /// running at the cap is abandoned with a warning.
    pub fn flush_events(&mut self) -> usize {
        const MAX_PASSES: u32 = 64;
        let mut delivered = 0;
        for _ in 0..MAX_PASSES {
            delivered += dispatch_events(&mut self.store);
            if self.store.ids_with_role(EVENT_ROLE).is_empty() {
                return delivered;
            }
        }
        warn!(
            passes = MAX_PASSES,
            "event cascade still pending after flush cap"
        );
        delivered
    }

    /// The current tick (the next one to execute).
    pub fn tick_count(&self) -> Tick {
        self.tick
    }

    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    pub fn stash_mut(&mut self) -> &mut Stash {
        &mut self.stash
    }

    fn system_for(&self, actor_id: ComponentId) -> Option<usize> {
        let type_name = self.store.lookup_by_id(actor_id).ok()?.type_name();
        let found = self.systems.iter().position(|s| s.actor_type == type_name);
        if found.is_none() {
            trace!(actor_id = %actor_id, type_name, "no rule system for actor");
        }
        found
    }

    fn energy_cost(&self, actor_id: ComponentId) -> u64 {
        self.store
            .lookup_by_id(actor_id)
            .ok()
            .and_then(|c| c.as_actor())
            .map_or(u64::MAX, |a| a.schedule().energy_cost)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
