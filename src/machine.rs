//! Table-driven state machine runtime for unit behavior.
//!
//! Each role declares a static transition table `(state, event) -> {next,
//! effect}`. Events are pure descriptors derived from the world each tick;
//! effects are small records applied to the machine context (and visible to
//! the caller so controllers can release queue entries). The per-unit
//! `{state, context}` pair round-trips through `serialize`/`restore` into
//! `unit_memory.state_machine`; the live unit handle is re-injected each tick
//! and never persisted.

use log::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Upper bound on transitions a single machine may take in one tick.
pub const MAX_STATE_TRANSITIONS: u32 = 20;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Harvest,
    Deliver,
    Upgrade,
    Recharge,
    Gather,
    Build,
    Maintain,
    Repair,
    Pickup,
    Travel,
    Work,
    Return,
    Claim,
    Engage,
    Support,
    Survey,
}

impl UnitState {
    pub fn name(self) -> &'static str {
        match self {
            UnitState::Harvest => "harvest",
            UnitState::Deliver => "deliver",
            UnitState::Upgrade => "upgrade",
            UnitState::Recharge => "recharge",
            UnitState::Gather => "gather",
            UnitState::Build => "build",
            UnitState::Maintain => "maintain",
            UnitState::Repair => "repair",
            UnitState::Pickup => "pickup",
            UnitState::Travel => "travel",
            UnitState::Work => "work",
            UnitState::Return => "return",
            UnitState::Claim => "claim",
            UnitState::Engage => "engage",
            UnitState::Support => "support",
            UnitState::Survey => "survey",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnitEvent {
    EnergyFull,
    EnergyEmpty,
    CargoFull,
    TargetGone,
    NoSites,
    SitesAvailable,
    NoDeliveryTargets,
    ArrivedTarget,
    ArrivedHome,
    RoomVisited,
}

/// Pure effect record consumed when a transition fires.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    ClearTarget,
    ClearTask,
    ClearTargetRoom,
    ResetContext,
}

/// Role-specific persisted context. Holds ids only, never live handles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineContext {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl MachineContext {
    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::ClearTarget => self.target_id = None,
            Effect::ClearTask => {
                self.task_id = None;
                self.target_id = None;
            }
            Effect::ClearTargetRoom => {}
            Effect::ResetContext => *self = MachineContext::default(),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Transition {
    next: UnitState,
    effect: Option<Effect>,
}

/// Static transition table for one role.
pub struct StateTable {
    initial: UnitState,
    states: HashSet<UnitState>,
    transitions: HashMap<(UnitState, UnitEvent), Transition>,
}

impl StateTable {
    pub fn new(initial: UnitState) -> StateTable {
        let mut states = HashSet::new();
        states.insert(initial);

        StateTable {
            initial,
            states,
            transitions: HashMap::new(),
        }
    }

    pub fn on(mut self, state: UnitState, event: UnitEvent, next: UnitState) -> StateTable {
        self.states.insert(state);
        self.states.insert(next);
        self.transitions.insert((state, event), Transition { next, effect: None });
        self
    }

    pub fn on_with(mut self, state: UnitState, event: UnitEvent, next: UnitState, effect: Effect) -> StateTable {
        self.states.insert(state);
        self.states.insert(next);
        self.transitions.insert(
            (state, event),
            Transition {
                next,
                effect: Some(effect),
            },
        );
        self
    }

    pub fn initial(&self) -> UnitState {
        self.initial
    }

    pub fn contains(&self, state: UnitState) -> bool {
        self.states.contains(&state)
    }
}

/// Serialized machine record stored in unit memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedMachine {
    pub state: UnitState,
    #[serde(default)]
    pub context: MachineContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateMachine {
    state: UnitState,
    pub context: MachineContext,
}

impl StateMachine {
    pub fn new(table: &StateTable) -> StateMachine {
        StateMachine {
            state: table.initial(),
            context: MachineContext::default(),
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Force the machine into a state without consulting the table. Reserved
    /// for controller pre-emption rules that override the current state.
    pub fn force(&mut self, state: UnitState) {
        self.state = state;
    }

    /// Apply one event. Unknown `(state, event)` pairs leave the machine
    /// unchanged; a fired transition's effect mutates the context and is
    /// returned for the caller to consume.
    pub fn step(&mut self, table: &StateTable, event: UnitEvent) -> Option<Effect> {
        let transition = table.transitions.get(&(self.state, event))?;

        self.state = transition.next;

        if let Some(effect) = transition.effect {
            self.context.apply(effect);
        }

        transition.effect
    }

    /// Drive the machine until `event_fn` stops producing events, with a
    /// transition cap to break accidental cycles. Fired effects are collected
    /// for the caller.
    pub fn run<F>(&mut self, table: &StateTable, label: &str, mut event_fn: F) -> Vec<Effect>
    where
        F: FnMut(&StateMachine) -> Option<UnitEvent>,
    {
        let mut effects = Vec::new();
        let mut transitions = 0u32;

        while let Some(event) = event_fn(self) {
            let before = self.state;

            if let Some(effect) = self.step(table, event) {
                effects.push(effect);
            }

            if self.state == before {
                break;
            }

            transitions += 1;
            if transitions >= MAX_STATE_TRANSITIONS {
                error!(
                    "state machine '{}' exceeded {} transitions in a single tick, breaking to prevent infinite loop",
                    label, MAX_STATE_TRANSITIONS
                );
                break;
            }
        }

        effects
    }

    pub fn serialize(&self) -> PersistedMachine {
        PersistedMachine {
            state: self.state,
            context: self.context.clone(),
        }
    }

    /// Rebuild from a persisted record. A state foreign to the table (stale
    /// schema) falls back to the table's initial state with a fresh context.
    pub fn restore(table: &StateTable, persisted: &PersistedMachine) -> StateMachine {
        if table.contains(persisted.state) {
            StateMachine {
                state: persisted.state,
                context: persisted.context.clone(),
            }
        } else {
            StateMachine::new(table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harvester_table() -> StateTable {
        StateTable::new(UnitState::Harvest)
            .on(UnitState::Harvest, UnitEvent::EnergyFull, UnitState::Deliver)
            .on(UnitState::Deliver, UnitEvent::EnergyEmpty, UnitState::Harvest)
            .on(UnitState::Deliver, UnitEvent::NoDeliveryTargets, UnitState::Upgrade)
            .on_with(UnitState::Upgrade, UnitEvent::EnergyEmpty, UnitState::Harvest, Effect::ClearTarget)
    }

    #[test]
    fn deterministic_transitions() {
        let table = harvester_table();
        let mut machine = StateMachine::new(&table);

        assert_eq!(machine.state(), UnitState::Harvest);

        machine.step(&table, UnitEvent::EnergyFull);
        assert_eq!(machine.state(), UnitState::Deliver);

        machine.step(&table, UnitEvent::NoDeliveryTargets);
        assert_eq!(machine.state(), UnitState::Upgrade);
    }

    #[test]
    fn unknown_event_is_a_no_op() {
        let table = harvester_table();
        let mut machine = StateMachine::new(&table);

        assert_eq!(machine.step(&table, UnitEvent::TargetGone), None);
        assert_eq!(machine.state(), UnitState::Harvest);
    }

    #[test]
    fn effect_mutates_context() {
        let table = harvester_table();
        let mut machine = StateMachine::new(&table);
        machine.force(UnitState::Upgrade);
        machine.context.target_id = Some("controller-1".to_string());

        let effect = machine.step(&table, UnitEvent::EnergyEmpty);

        assert_eq!(effect, Some(Effect::ClearTarget));
        assert_eq!(machine.context.target_id, None);
        assert_eq!(machine.state(), UnitState::Harvest);
    }

    #[test]
    fn round_trip_serialization() {
        let table = harvester_table();
        let mut machine = StateMachine::new(&table);
        machine.step(&table, UnitEvent::EnergyFull);
        machine.context.task_id = Some("W1N1-deliver-spawn-1".to_string());

        let restored = StateMachine::restore(&table, &machine.serialize());

        assert_eq!(restored, machine);
    }

    #[test]
    fn restore_of_foreign_state_resets_to_initial() {
        let table = harvester_table();
        let persisted = PersistedMachine {
            state: UnitState::Claim,
            context: MachineContext::default(),
        };

        let restored = StateMachine::restore(&table, &persisted);

        assert_eq!(restored.state(), UnitState::Harvest);
        assert_eq!(restored.context, MachineContext::default());
    }

    #[test]
    fn run_caps_transition_cycles() {
        let table = StateTable::new(UnitState::Harvest)
            .on(UnitState::Harvest, UnitEvent::EnergyFull, UnitState::Deliver)
            .on(UnitState::Deliver, UnitEvent::EnergyEmpty, UnitState::Harvest);

        let mut machine = StateMachine::new(&table);

        // Event function that never settles; the cap must break the loop.
        machine.run(&table, "test", |m| match m.state() {
            UnitState::Harvest => Some(UnitEvent::EnergyFull),
            _ => Some(UnitEvent::EnergyEmpty),
        });
    }
}
