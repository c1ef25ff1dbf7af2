//! Dismantler: tears down fortifications ahead of an assault. Ramparts
//! first, then walls, towers, and anything else hostile.

use super::context::ExecutionContext;
use super::utility::travel_to_room;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::{QueueStatus, UnitMemory};
use crate::constants::{Part, StructureKind};
use crate::findnearest::{FindNearest, PathHelpers};
use crate::machine::{StateTable, UnitEvent, UnitState};
use crate::tasks::Priority;
use crate::world::{ActionError, RoomView, StructureView, UnitView};
use log::*;

pub struct DismantlerController {
    config: RoleConfig,
    table: StateTable,
}

impl DismantlerController {
    pub fn new() -> DismantlerController {
        DismantlerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Work, Part::Work, Part::Move, Part::Move],
                growth_pattern: vec![Part::Work, Part::Move],
                max_repeats: 4,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Travel)
                .on(UnitState::Travel, UnitEvent::ArrivedTarget, UnitState::Engage),
        }
    }

    fn pick_target<'a>(&self, unit: &UnitView, room: &'a RoomView) -> Option<&'a StructureView> {
        let by_kind = |kind: StructureKind| {
            room.structures
                .iter()
                .filter(move |s| !s.my && s.kind == kind)
                .find_nearest(&unit.pos, PathHelpers::same_room)
        };

        by_kind(StructureKind::Rampart)
            .or_else(|| by_kind(StructureKind::Wall))
            .or_else(|| by_kind(StructureKind::Tower))
            .or_else(|| {
                room.structures
                    .iter()
                    .filter(|s| !s.my && !matches!(s.kind, StructureKind::Controller))
                    .find_nearest(&unit.pos, PathHelpers::same_room)
            })
    }
}

impl RoleController for DismantlerController {
    fn role(&self) -> Role {
        Role::Dismantler
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        if memory.target_room.is_none() {
            memory.target_room = ctx
                .combat
                .attack_queue
                .iter()
                .find(|e| matches!(e.status, QueueStatus::Pending | QueueStatus::Active))
                .map(|e| e.target_room.clone());
        }

        let target_room = match memory.target_room.clone().or_else(|| memory.home_room.clone()) {
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
            UnitState::Engage => {
                let target = ctx.room_of(unit).and_then(|room| self.pick_target(unit, room)).cloned();

                match target {
                    Some(target) => {
                        match unit.dismantle(&target) {
                            Ok(()) => {}
                            Err(ActionError::NotInRange) => {
                                ctx.movement.request(&unit.name, target.pos.clone(), 1, Priority::High);
                            }
                            Err(err) => debug!("{}: dismantle of {} failed: {}", unit.name, target.id, err),
                        }
                        "dismantle"
                    }
                    None => "hold",
                }
            }
            _ => "hold",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
