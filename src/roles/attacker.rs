//! Attacker: melee combat unit. Clears hostiles from its own rooms and
//! prosecutes queued attack flags.

use super::context::ExecutionContext;
use super::utility::travel_to_room;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::{QueueStatus, UnitMemory};
use crate::constants::{Part, StructureKind};
use crate::findnearest::{FindNearest, PathHelpers};
use crate::machine::{StateTable, UnitEvent, UnitState};
use crate::tasks::Priority;
use crate::world::{ActionError, RoomView, UnitView};
use log::*;

pub struct AttackerController {
    config: RoleConfig,
    table: StateTable,
}

impl AttackerController {
    pub fn new() -> AttackerController {
        AttackerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Tough, Part::Attack, Part::Move, Part::Move],
                growth_pattern: vec![Part::Attack, Part::Move],
                max_repeats: 5,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Travel)
                .on(UnitState::Travel, UnitEvent::ArrivedTarget, UnitState::Engage),
        }
    }

    /// Target order: hostile units, hostile spawns, hostile towers, then any
    /// other hostile structure.
    fn engage(&self, unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if let Some(hostile) = room.hostiles.iter().find_nearest(&unit.pos, PathHelpers::same_room) {
            self.strike(unit, &hostile.id, &hostile.pos, ctx);
            return "attack";
        }

        let structure_target = room
            .structures
            .iter()
            .filter(|s| !s.my && s.kind == StructureKind::Spawn)
            .find_nearest(&unit.pos, PathHelpers::same_room)
            .or_else(|| {
                room.structures
                    .iter()
                    .filter(|s| !s.my && s.kind == StructureKind::Tower)
                    .find_nearest(&unit.pos, PathHelpers::same_room)
            })
            .or_else(|| {
                room.structures
                    .iter()
                    .filter(|s| !s.my && !matches!(s.kind, StructureKind::Controller))
                    .find_nearest(&unit.pos, PathHelpers::same_room)
            });

        match structure_target {
            Some(structure) => {
                self.strike(unit, &structure.id, &structure.pos, ctx);
                "attack"
            }
            None => "hold",
        }
    }

    fn strike(&self, unit: &UnitView, target_id: &str, target_pos: &crate::world::Position, ctx: &mut ExecutionContext<'_>) {
        match unit.attack(target_id, target_pos) {
            Ok(()) => {}
            Err(ActionError::NotInRange) => {
                ctx.movement.request(&unit.name, target_pos.clone(), 1, Priority::Critical);
            }
            Err(err) => debug!("{}: attack on {} failed: {}", unit.name, target_id, err),
        }
    }

    fn pick_target_room(&self, memory: &mut UnitMemory, ctx: &ExecutionContext<'_>) -> Option<String> {
        if let Some(target_room) = memory.target_room.clone() {
            return Some(target_room);
        }

        let flagged = ctx
            .combat
            .attack_queue
            .iter()
            .find(|e| matches!(e.status, QueueStatus::Pending | QueueStatus::Active))
            .map(|e| e.target_room.clone());

        if let Some(room) = flagged {
            memory.target_room = Some(room.clone());
            return Some(room);
        }

        memory.home_room.clone()
    }
}

impl RoleController for AttackerController {
    fn role(&self) -> Role {
        Role::Attacker
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        // Hostiles in the current room always take precedence over travel.
        if let Some(room) = ctx.room_of(unit) {
            if !room.hostiles.is_empty() {
                let task_name = self.engage(unit, room, ctx);
                memory.task = task_name.to_string();
                return Ok(task_name);
            }
        }

        let target_room = match self.pick_target_room(memory, ctx) {
            Some(target_room) => target_room,
            None => {
                memory.task = "hold".to_string();
                return Ok("hold");
            }
        };

        let mut machine = self.load_machine(memory);

        machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Travel => {
                if unit.room_name() == target_room {
                    Some(UnitEvent::ArrivedTarget)
                } else {
                    None
                }
            }
            _ => None,
        });

        let task_name = match machine.state() {
            UnitState::Travel => {
                travel_to_room(unit, &target_room, ctx, Priority::High);
                "travel"
            }
            UnitState::Engage => match ctx.room_of(unit) {
                Some(room) => self.engage(unit, room, ctx),
                None => "hold",
            },
            _ => "hold",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
