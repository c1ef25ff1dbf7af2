//! Repairer: dedicated maintenance unit working the repair queue.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::Part;
use crate::machine::{Effect, StateMachine, StateTable, UnitEvent, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::Priority;
use crate::world::UnitView;

pub struct RepairerController {
    config: RoleConfig,
    table: StateTable,
}

impl RepairerController {
    pub fn new() -> RepairerController {
        RepairerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Work, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Work, Part::Carry, Part::Move],
                max_repeats: 3,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Gather)
                .on(UnitState::Gather, UnitEvent::EnergyFull, UnitState::Repair)
                .on_with(UnitState::Repair, UnitEvent::EnergyEmpty, UnitState::Gather, Effect::ClearTask),
        }
    }

    fn run_repair(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if machine.context.task_id.is_none() {
            if let Some(entry) = ctx.queues.assign_task(Role::Repairer, &unit.name, ctx.tick) {
                machine.context.task_id = Some(entry.task_id);
                machine.context.target_id = Some(entry.target_id);
            } else {
                return "idle";
            }
        }

        let entry = machine
            .context
            .task_id
            .as_ref()
            .and_then(|task_id| ctx.queues.get(Role::Repairer, task_id).cloned());

        let structure = entry
            .as_ref()
            .and_then(|e| ctx.snapshot.room(&e.room_name).and_then(|r| r.find_structure(&e.target_id)))
            .cloned();

        match structure {
            Some(structure) if structure.is_damaged() => {
                repair_or_approach(unit, &structure, ctx, Priority::Normal);
                "repair"
            }
            _ => {
                // Either fully repaired or gone; release and retry.
                if let Some(task_id) = machine.context.task_id.take() {
                    ctx.queues.release_task(Role::Repairer, &task_id, &unit.name);
                }
                machine.context.target_id = None;
                "repair"
            }
        }
    }
}

impl RoleController for RepairerController {
    fn role(&self) -> Role {
        Role::Repairer
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        let room = ctx.room_of(unit).ok_or_else(|| format!("{} is in an invisible room", unit.name))?;

        let mut machine = self.load_machine(memory);
        let held_task = machine.context.task_id.clone();

        let effects = machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Gather => {
                if unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::EnergyFull)
                } else {
                    None
                }
            }
            UnitState::Repair => {
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
                ctx.queues.release_task(Role::Repairer, &task_id, &unit.name);
            }
        }

        let task_name = match machine.state() {
            UnitState::Gather => acquire_energy(unit, room, ctx, true),
            UnitState::Repair => self.run_repair(unit, &mut machine, ctx),
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
