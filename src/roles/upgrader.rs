//! Upgrader: keeps the room controller fed. Hunkers near storage or spawn
//! during defensive postures instead of standing exposed at the controller.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::{Part, StructureKind};
use crate::findnearest::{FindNearest, PathHelpers};
use crate::machine::{StateTable, UnitEvent, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::Priority;
use crate::world::{RoomView, UnitView};

pub struct UpgraderController {
    config: RoleConfig,
    table: StateTable,
}

impl UpgraderController {
    pub fn new() -> UpgraderController {
        UpgraderController {
            config: RoleConfig {
                minimum: 3,
                base_body: vec![Part::Work, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Work, Part::Carry, Part::Move],
                max_repeats: 4,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Recharge)
                .on(UnitState::Recharge, UnitEvent::EnergyFull, UnitState::Upgrade)
                .on(UnitState::Upgrade, UnitEvent::EnergyEmpty, UnitState::Recharge),
        }
    }

    fn hunker(&self, unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> &'static str {
        let shelter = room
            .my_structures()
            .filter(|s| matches!(s.kind, StructureKind::Storage | StructureKind::Spawn))
            .find_nearest(&unit.pos, PathHelpers::same_room);

        if let Some(shelter) = shelter {
            if !unit.pos.is_near(&shelter.pos) {
                ctx.movement.request(&unit.name, shelter.pos.clone(), 1, Priority::High);
            }
        }

        "hold"
    }
}

impl RoleController for UpgraderController {
    fn role(&self) -> Role {
        Role::Upgrader
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        let room = ctx.room_of(unit).ok_or_else(|| format!("{} is in an invisible room", unit.name))?;

        if let Some(task) = spawn_refill_preemption(unit, room, ctx) {
            memory.task = task.to_string();
            return Ok(task);
        }

        let mut machine = self.load_machine(memory);

        machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Recharge => {
                if unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::EnergyFull)
                } else {
                    None
                }
            }
            UnitState::Upgrade => {
                if unit.store.is_empty() {
                    Some(UnitEvent::EnergyEmpty)
                } else {
                    None
                }
            }
            _ => None,
        });

        // Room under threat: stay in the current state but do no controller
        // work; shelter near storage or spawn instead.
        if ctx.posture(&room.name).is_combat() {
            let task_name = self.hunker(unit, room, ctx);
            memory.state_machine = Some(machine.serialize());
            memory.task = task_name.to_string();
            return Ok(task_name);
        }

        let task_name = match machine.state() {
            UnitState::Recharge => acquire_energy(unit, room, ctx, true),
            UnitState::Upgrade => {
                if machine.context.task_id.is_none() {
                    if let Some(entry) = ctx.queues.assign_task(Role::Upgrader, &unit.name, ctx.tick) {
                        machine.context.task_id = Some(entry.task_id);
                        machine.context.target_id = Some(entry.target_id);
                    }
                }

                match room.controller.as_ref().filter(|c| c.my) {
                    Some(controller) => {
                        upgrade_or_approach(unit, controller, ctx, Priority::Normal);
                        "upgrade"
                    }
                    None => "idle",
                }
            }
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
