//! Harvester: bootstrap economy unit. Harvests energy, delivers to spawn
//! infrastructure, and falls back to controller upgrading when nothing
//! needs energy.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::{Part, StructureKind};
use crate::findnearest::{FindNearest, PathHelpers};
use crate::machine::{Effect, StateMachine, StateTable, UnitEvent, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::Priority;
use crate::world::{RoomView, UnitView};

pub struct HarvesterController {
    config: RoleConfig,
    table: StateTable,
}

impl HarvesterController {
    pub fn new() -> HarvesterController {
        HarvesterController {
            config: RoleConfig {
                minimum: 2,
                base_body: vec![Part::Work, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Work, Part::Carry, Part::Move],
                max_repeats: 4,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Harvest)
                .on_with(UnitState::Harvest, UnitEvent::EnergyFull, UnitState::Deliver, Effect::ClearTask)
                .on(UnitState::Deliver, UnitEvent::EnergyEmpty, UnitState::Harvest)
                .on(UnitState::Deliver, UnitEvent::NoDeliveryTargets, UnitState::Upgrade)
                .on(UnitState::Upgrade, UnitEvent::EnergyEmpty, UnitState::Harvest),
        }
    }

    fn run_harvest(&self, unit: &UnitView, room: &RoomView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if machine.context.task_id.is_none() {
            if let Some(entry) = ctx.queues.assign_task(Role::Harvester, &unit.name, ctx.tick) {
                machine.context.task_id = Some(entry.task_id);
                machine.context.target_id = Some(entry.target_id);
            }
        }

        if let Some(target_id) = machine.context.target_id.clone() {
            match room.find_source(&target_id) {
                Some(source) => {
                    harvest_or_approach(unit, source, ctx, Priority::High);
                    return "harvest";
                }
                None => {
                    // Target no longer resolves; drop the assignment and
                    // retry next tick from the initial state.
                    if let Some(task_id) = machine.context.task_id.take() {
                        ctx.queues.release_task(Role::Harvester, &task_id, &unit.name);
                    }
                    machine.context.target_id = None;
                    return "harvest";
                }
            }
        }

        // Queue exhausted; share the closest active source rather than idle.
        if let Some(source) = room
            .sources
            .iter()
            .filter(|s| s.energy > 0)
            .find_nearest(&unit.pos, PathHelpers::same_room)
        {
            harvest_or_approach(unit, source, ctx, Priority::High);
            return "harvest";
        }

        "idle"
    }

    fn run_deliver(&self, unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> &'static str {
        let spawn_like = room
            .my_structures()
            .filter(|s| matches!(s.kind, StructureKind::Spawn | StructureKind::Extension))
            .filter(|s| s.store().free_capacity() > 0)
            .find_nearest(&unit.pos, PathHelpers::same_room);

        if let Some(target) = spawn_like {
            transfer_or_approach(unit, target, ctx, Priority::High);
            return "deliver";
        }

        let container = room
            .structures
            .iter()
            .filter(|s| matches!(s.kind, StructureKind::Container | StructureKind::Storage))
            .filter(|s| s.store().free_capacity() > 0)
            .find_nearest(&unit.pos, PathHelpers::same_room);

        if let Some(target) = container {
            transfer_or_approach(unit, target, ctx, Priority::Normal);
            return "deliver";
        }

        "deliver"
    }

    fn run_upgrade(&self, unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if let Some(controller) = room.controller.as_ref().filter(|c| c.my) {
            upgrade_or_approach(unit, controller, ctx, Priority::Normal);
            return "upgrade";
        }

        "idle"
    }
}

fn has_delivery_target(room: &RoomView) -> bool {
    room.structures.iter().any(|s| {
        let wants_energy = match s.kind {
            StructureKind::Spawn | StructureKind::Extension => s.my,
            StructureKind::Container | StructureKind::Storage => true,
            _ => false,
        };

        wants_energy && s.store().free_capacity() > 0
    })
}

impl RoleController for HarvesterController {
    fn role(&self) -> Role {
        Role::Harvester
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
        let held_task = machine.context.task_id.clone();

        let effects = machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Harvest => {
                if unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::EnergyFull)
                } else {
                    None
                }
            }
            UnitState::Deliver => {
                if unit.store.is_empty() {
                    Some(UnitEvent::EnergyEmpty)
                } else if !has_delivery_target(room) {
                    Some(UnitEvent::NoDeliveryTargets)
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

        if effects.iter().any(|e| matches!(e, Effect::ClearTask | Effect::ResetContext)) {
            if let Some(task_id) = held_task {
                ctx.queues.release_task(Role::Harvester, &task_id, &unit.name);
            }
        }

        let task_name = match machine.state() {
            UnitState::Harvest => self.run_harvest(unit, room, &mut machine, ctx),
            UnitState::Deliver => self.run_deliver(unit, room, ctx),
            UnitState::Upgrade => self.run_upgrade(unit, room, ctx),
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
