//! Hauler: logistics unit. Picks up dropped energy and drains containers,
//! then delivers along the refill order; towers below the minimum-capacity
//! threshold are topped up before routine tower refills.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::Part;
use crate::machine::{Effect, StateMachine, StateTable, UnitEvent, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::{Priority, TaskEntry, TaskKind};
use crate::world::UnitView;

pub struct HaulerController {
    config: RoleConfig,
    table: StateTable,
}

impl HaulerController {
    pub fn new() -> HaulerController {
        HaulerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Carry, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Carry, Part::Carry, Part::Move],
                max_repeats: 7,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Pickup)
                .on_with(UnitState::Pickup, UnitEvent::EnergyFull, UnitState::Deliver, Effect::ClearTask)
                .on_with(UnitState::Deliver, UnitEvent::EnergyEmpty, UnitState::Pickup, Effect::ClearTask),
        }
    }

    fn claim_matching<F>(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>, filter: F) -> bool
    where
        F: FnMut(&TaskEntry) -> bool,
    {
        let picked = ctx
            .queues
            .peek_available(Role::Hauler, ctx.tick, filter)
            .map(|e| e.task_id.clone());

        if let Some(task_id) = picked {
            if let Some(entry) = ctx
                .queues
                .queue_mut(Role::Hauler)
                .assign_specific(&task_id, &unit.name, ctx.tick)
            {
                machine.context.task_id = Some(entry.task_id.clone());
                machine.context.target_id = Some(entry.target_id.clone());
                return true;
            }
        }

        false
    }

    fn run_pickup(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if machine.context.task_id.is_none()
            && !self.claim_matching(unit, machine, ctx, |e| {
                matches!(e.kind, TaskKind::Pickup | TaskKind::WithdrawContainer)
            })
        {
            return "idle";
        }

        let entry = machine
            .context
            .task_id
            .as_ref()
            .and_then(|task_id| ctx.queues.get(Role::Hauler, task_id))
            .cloned();

        let entry = match entry {
            Some(entry) => entry,
            None => {
                machine.context.task_id = None;
                machine.context.target_id = None;
                return "pickup";
            }
        };

        let room = match ctx.snapshot.room(&entry.room_name) {
            Some(room) => room,
            None => return "pickup",
        };

        match entry.kind {
            TaskKind::Pickup => match room.find_dropped(&entry.target_id) {
                Some(dropped) => {
                    let dropped = dropped.clone();
                    pickup_or_approach(unit, &dropped, ctx, Priority::High);
                    "pickup"
                }
                None => {
                    self.abandon(machine, unit, ctx);
                    "pickup"
                }
            },
            TaskKind::WithdrawContainer => match room.find_structure(&entry.target_id) {
                Some(container) if !container.store().is_empty() => {
                    let container = container.clone();
                    withdraw_or_approach(unit, &container, ctx, Priority::Normal);
                    "pickup"
                }
                _ => {
                    self.abandon(machine, unit, ctx);
                    "pickup"
                }
            },
            _ => {
                self.abandon(machine, unit, ctx);
                "pickup"
            }
        }
    }

    fn run_deliver(&self, unit: &UnitView, machine: &mut StateMachine, ctx: &mut ExecutionContext<'_>) -> &'static str {
        if machine.context.task_id.is_none() {
            let threshold = ctx.tower_min_capacity;
            let snapshot = ctx.snapshot;

            // Critical pass: spawn refills and towers under the minimum
            // threshold; then any remaining delivery work.
            let urgent_tower = move |e: &TaskEntry| -> bool {
                e.kind == TaskKind::RefillTower
                    && snapshot
                        .room(&e.room_name)
                        .and_then(|r| r.find_structure(&e.target_id))
                        .map(|t| t.store().used < threshold)
                        .unwrap_or(false)
            };

            let claimed = self.claim_matching(unit, machine, ctx, |e| e.kind == TaskKind::RefillSpawn || urgent_tower(e))
                || self.claim_matching(unit, machine, ctx, |e| {
                    matches!(e.kind, TaskKind::RefillSpawn | TaskKind::RefillTower | TaskKind::StoreEnergy)
                });

            if !claimed {
                // No queued consumer; fall back to the standard deposit
                // order so cargo is never stranded.
                let room = match ctx.room_of(unit) {
                    Some(room) => room,
                    None => return "idle",
                };

                return if deposit_cargo(unit, room, ctx) { "deliver" } else { "idle" };
            }
        }

        let entry = machine
            .context
            .task_id
            .as_ref()
            .and_then(|task_id| ctx.queues.get(Role::Hauler, task_id))
            .cloned();

        let entry = match entry {
            Some(entry) => entry,
            None => {
                machine.context.task_id = None;
                machine.context.target_id = None;
                return "deliver";
            }
        };

        let structure = ctx
            .snapshot
            .room(&entry.room_name)
            .and_then(|r| r.find_structure(&entry.target_id))
            .cloned();

        match structure {
            Some(structure) if structure.store().free_capacity() > 0 => {
                transfer_or_approach(unit, &structure, ctx, Priority::High);
                "deliver"
            }
            _ => {
                self.abandon(machine, unit, ctx);
                "deliver"
            }
        }
    }

    fn abandon(&self, machine: &mut StateMachine, unit: &UnitView, ctx: &mut ExecutionContext<'_>) {
        if let Some(task_id) = machine.context.task_id.take() {
            ctx.queues.release_task(Role::Hauler, &task_id, &unit.name);
        }
        machine.context.target_id = None;
    }
}

impl RoleController for HaulerController {
    fn role(&self) -> Role {
        Role::Hauler
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        let mut machine = self.load_machine(memory);
        let held_task = machine.context.task_id.clone();

        let effects = machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Pickup => {
                if unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::EnergyFull)
                } else {
                    None
                }
            }
            UnitState::Deliver => {
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
                ctx.queues.release_task(Role::Hauler, &task_id, &unit.name);
            }
        }

        let task_name = match machine.state() {
            UnitState::Pickup => self.run_pickup(unit, &mut machine, ctx),
            UnitState::Deliver => self.run_deliver(unit, &mut machine, ctx),
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
