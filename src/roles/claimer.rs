//! Claimer: walks to a queued expansion room and claims its controller.

use super::context::ExecutionContext;
use super::utility::travel_to_room;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::{QueueStatus, UnitMemory};
use crate::constants::Part;
use crate::machine::{StateTable, UnitEvent, UnitState};
use crate::tasks::Priority;
use crate::world::{ActionError, UnitView};
use log::*;

pub struct ClaimerController {
    config: RoleConfig,
    table: StateTable,
}

impl ClaimerController {
    pub fn new() -> ClaimerController {
        ClaimerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Claim, Part::Move],
                growth_pattern: Vec::new(),
                max_repeats: 0,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Travel)
                .on(UnitState::Travel, UnitEvent::ArrivedTarget, UnitState::Claim),
        }
    }

    /// Bind to the first pending expansion room no other claimer covers.
    fn assign_target_room(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &ExecutionContext<'_>) {
        if memory.target_room.is_some() {
            return;
        }

        for entry in ctx
            .colony
            .expansion_queue
            .iter()
            .filter(|e| e.status == QueueStatus::Pending)
        {
            let covered = ctx.units_brief.iter().any(|(name, brief)| {
                name.as_str() != unit.name
                    && brief.role == Role::Claimer
                    && brief.target_room.as_deref() == Some(entry.target_room.as_str())
            });

            if !covered {
                memory.target_room = Some(entry.target_room.clone());
                return;
            }
        }
    }
}

impl RoleController for ClaimerController {
    fn role(&self) -> Role {
        Role::Claimer
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        self.assign_target_room(unit, memory, ctx);

        let target_room = match memory.target_room.clone() {
            Some(target_room) => target_room,
            None => {
                memory.task = "idle".to_string();
                return Ok("idle");
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
                travel_to_room(unit, &target_room, ctx, Priority::Normal);
                "travel"
            }
            UnitState::Claim => {
                let controller = ctx
                    .snapshot
                    .room(&target_room)
                    .and_then(|room| room.controller.clone());

                match controller {
                    Some(controller) if !controller.owned => {
                        match unit.claim(&controller) {
                            Ok(()) => {}
                            Err(ActionError::NotInRange) => {
                                ctx.movement.request(&unit.name, controller.pos.clone(), 1, Priority::Normal);
                            }
                            Err(err) => debug!("{}: claim of {} failed: {}", unit.name, controller.id, err),
                        }
                        "claim"
                    }
                    Some(_) => {
                        // Already claimed (by us or someone else); the
                        // expansion manager updates the queue, we just stop.
                        "hold"
                    }
                    None => "hold",
                }
            }
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
