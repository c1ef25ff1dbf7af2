//! Intent buffer shared between the snapshot views and the host.
//!
//! Action verbs on the views validate locally against snapshot data and, on
//! success, append a record here. The host drains the buffer after
//! `TickKernel::run` and applies the intents at end of tick.

use super::position::Position;
use crate::blackboard::UnitMemory;
use crate::constants::Part;
use std::cell::RefCell;
use std::rc::Rc;

pub type IntentHandle = Rc<RefCell<IntentBuffer>>;

/// A single action requested by a unit this tick.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitIntent {
    Harvest { target_id: String },
    Transfer { target_id: String, amount: u32 },
    Withdraw { target_id: String, amount: u32 },
    Pickup { target_id: String },
    Build { site_id: String },
    Repair { target_id: String },
    Upgrade { controller_id: String },
    Drop { amount: u32 },
    Attack { target_id: String },
    RangedAttack { target_id: String },
    Heal { target_id: String },
    RangedHeal { target_id: String },
    Dismantle { target_id: String },
    Claim { controller_id: String },
    /// Single-step move resolved by the movement manager.
    Move { to: Position },
    /// Goal-directed move for hosts with a native pathfinder.
    MoveTo { goal: Position, range: u32 },
}

#[derive(Clone, Debug)]
pub struct UnitIntentRecord {
    pub unit: String,
    pub intent: UnitIntent,
}

#[derive(Clone, Debug)]
pub struct SpawnIntent {
    pub spawn: String,
    pub body: Vec<Part>,
    pub unit_name: String,
    pub memory: UnitMemory,
}

/// Construction placement request relayed from the construction manager.
#[derive(Clone, Debug)]
pub struct ConstructionIntent {
    pub room_name: String,
    pub position: Position,
    pub structure_type: crate::constants::StructureKind,
}

#[derive(Default, Debug)]
pub struct IntentBuffer {
    pub unit_intents: Vec<UnitIntentRecord>,
    pub spawn_intents: Vec<SpawnIntent>,
    pub construction_intents: Vec<ConstructionIntent>,
}

impl IntentBuffer {
    pub fn new_handle() -> IntentHandle {
        Rc::new(RefCell::new(IntentBuffer::default()))
    }

    pub fn push_unit(&mut self, unit: &str, intent: UnitIntent) {
        self.unit_intents.push(UnitIntentRecord {
            unit: unit.to_string(),
            intent,
        });
    }

    /// Intents recorded for one unit, in submission order.
    pub fn intents_for<'a>(&'a self, unit: &'a str) -> impl Iterator<Item = &'a UnitIntent> {
        self.unit_intents.iter().filter(move |r| r.unit == unit).map(|r| &r.intent)
    }

    pub fn clear(&mut self) {
        self.unit_intents.clear();
        self.spawn_intents.clear();
        self.construction_intents.clear();
    }
}

/// Validation failure for a unit action verb. Transient; the controller
/// logs at DEBUG and the unit retries next tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    NotInRange,
    NotEnoughResources,
    Full,
    InvalidTarget,
    NoBodyPart,
    Busy,
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ActionError::NotInRange => "not in range",
            ActionError::NotEnoughResources => "not enough resources",
            ActionError::Full => "target full",
            ActionError::InvalidTarget => "invalid target",
            ActionError::NoBodyPart => "missing body part",
            ActionError::Busy => "busy",
        };

        f.write_str(text)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpawnError {
    Busy,
    NotEnoughEnergy,
    InvalidBody,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SpawnError::Busy => "spawn busy",
            SpawnError::NotEnoughEnergy => "not enough energy",
            SpawnError::InvalidBody => "invalid body",
        };

        f.write_str(text)
    }
}
