//! Per-tick execution context handed to role controllers.
//!
//! A service-locator record built by the kernel at the start of the
//! execution phase and dropped at its end; controllers must not retain
//! references across ticks.

use super::Role;
use crate::blackboard::{ColonyState, CombatState, DefenseState, Posture, ScoutState};
use crate::pathing::MovementRequests;
use crate::tasks::queue::TaskQueues;
use crate::world::{RoomView, UnitView, WorldSnapshot};
use std::collections::HashMap;

/// Cross-unit facts a controller may consult about its peers without
/// touching their memory.
#[derive(Clone, Debug)]
pub struct UnitBrief {
    pub role: Role,
    pub squad_id: Option<String>,
    pub target_room: Option<String>,
}

pub struct ExecutionContext<'a> {
    pub snapshot: &'a WorldSnapshot,
    pub queues: &'a mut TaskQueues,
    pub movement: &'a mut MovementRequests,
    pub defense: &'a DefenseState,
    pub colony: &'a ColonyState,
    pub combat: &'a CombatState,
    pub scout: &'a mut ScoutState,
    pub units_brief: &'a HashMap<String, UnitBrief>,
    pub tower_min_capacity: u32,
    pub tick: u64,
}

impl<'a> ExecutionContext<'a> {
    pub fn room_of(&self, unit: &UnitView) -> Option<&'a RoomView> {
        self.snapshot.room(unit.room_name())
    }

    pub fn posture(&self, room: &str) -> Posture {
        self.defense.posture_of(room)
    }

    /// The unit's home room view, falling back to its current room.
    pub fn home_room_of(&self, unit: &UnitView, home: Option<&str>) -> Option<&'a RoomView> {
        home.and_then(|name| self.snapshot.room(name)).or_else(|| self.room_of(unit))
    }

    /// Names of live units whose brief matches the predicate.
    pub fn units_where<F>(&self, mut predicate: F) -> Vec<&'a str>
    where
        F: FnMut(&UnitBrief) -> bool,
    {
        let mut names: Vec<&'a str> = self
            .units_brief
            .iter()
            .filter(|(_, brief)| predicate(brief))
            .map(|(name, _)| name.as_str())
            .collect();

        names.sort();
        names
    }
}
