//! Builder: works the construction queue; with no sites it falls through to
//! maintenance repairs from the repairer queue.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::Part;
use crate::machine::{Effect, StateMachine, StateTable, UnitEvent, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::Priority;
use crate::world::{RoomView, UnitView};

pub struct BuilderController {
    config: RoleConfig,
    table: StateTable,
}

impl BuilderController {
    pub fn new() -> BuilderController {
        BuilderController {
            config: RoleConfig {
                minimum: 1,
                base_body: vec![Part::Work, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Work, Part::Carry, Part::Move],
                max_repeats: 4,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Gather)
                .on(UnitState::Gather, UnitEvent::EnergyFull, UnitState::Build)
                .on_with(UnitState::Build, UnitEvent::EnergyEmpty, UnitState::Gather, Effect::ClearTask)
                .on_with(UnitState::Build, UnitEvent::NoSites, UnitState::Maintain, Effect::ClearTask)
                .on_with(UnitState::Maintain, UnitEvent::SitesAvailable, UnitState::Build, Effect::ClearTask)
                .on_with(UnitState::Maintain, UnitEvent::EnergyEmpty, UnitState::Gather, Effect::ClearTask),
        }
    }

    fn run_build(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if machine.context.task_id.is_none() {
            if let Some(entry) = ctx.queues.assign_task(Role::Builder, &unit.name, ctx.tick) {
                machine.context.task_id = Some(entry.task_id);
                machine.context.target_id = Some(entry.target_id);
            } else {
                // Every site is taken by another builder; pitch in on
                // maintenance instead of idling.
                return self.run_maintain(unit, machine, ctx);
            }
        }

        let entry = machine
            .context
            .task_id
            .as_ref()
            .and_then(|task_id| ctx.queues.get(Role::Builder, task_id).cloned());

        let site = entry
            .as_ref()
            .and_then(|e| ctx.snapshot.room(&e.room_name).and_then(|r| r.find_site(&e.target_id)));

        match site {
            Some(site) => {
                let site = site.clone();
                build_or_approach(unit, &site, ctx, Priority::Normal);
                "build"
            }
            None => {
                release_held(machine, unit, ctx);
                "build"
            }
        }
    }

    fn run_maintain(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
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
            .and_then(|e| ctx.snapshot.room(&e.room_name).and_then(|r| r.find_structure(&e.target_id)));

        match structure {
            Some(structure) if structure.is_damaged() => {
                let structure = structure.clone();
                repair_or_approach(unit, &structure, ctx, Priority::Normal);
                "repair"
            }
            _ => {
                release_held(machine, unit, ctx);
                "repair"
            }
        }
    }
}

/// Release whichever queue holds the machine's task; builders carry build
/// and repair assignments interchangeably.
fn release_held(machine: &mut StateMachine, unit: &UnitView, ctx: &mut ExecutionContext<'_>) {
    if let Some(task_id) = machine.context.task_id.take() {
        if !ctx.queues.release_task(Role::Builder, &task_id, &unit.name) {
            ctx.queues.release_task(Role::Repairer, &task_id, &unit.name);
        }
    }
    machine.context.target_id = None;
}

impl RoleController for BuilderController {
    fn role(&self) -> Role {
        Role::Builder
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
        let sites_exist = !room.construction_sites.is_empty();

        let effects = machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Gather => {
                if unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::EnergyFull)
                } else {
                    None
                }
            }
            UnitState::Build => {
                if unit.store.is_empty() {
                    Some(UnitEvent::EnergyEmpty)
                } else if !sites_exist {
                    Some(UnitEvent::NoSites)
                } else {
                    None
                }
            }
            UnitState::Maintain => {
                if unit.store.is_empty() {
                    Some(UnitEvent::EnergyEmpty)
                } else if sites_exist {
                    Some(UnitEvent::SitesAvailable)
                } else {
                    None
                }
            }
            _ => None,
        });

        if effects.iter().any(|e| matches!(e, Effect::ClearTask | Effect::ResetContext)) {
            if let Some(task_id) = held_task {
                if !ctx.queues.release_task(Role::Builder, &task_id, &unit.name) {
                    ctx.queues.release_task(Role::Repairer, &task_id, &unit.name);
                }
            }
        }

        let task_name = match machine.state() {
            UnitState::Gather => acquire_energy(unit, room, ctx, true),
            UnitState::Build => self.run_build(unit, &mut machine, ctx),
            UnitState::Maintain => self.run_maintain(unit, &mut machine, ctx),
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
