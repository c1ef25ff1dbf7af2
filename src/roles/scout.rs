//! Scout: walks queued unvisited rooms and records visibility.

use super::context::ExecutionContext;
use super::utility::travel_to_room;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::UnitMemory;
use crate::constants::Part;
use crate::machine::{Effect, StateTable, UnitEvent, UnitState};
use crate::tasks::Priority;
use crate::world::UnitView;

/// A room re-enters the scouting rotation after this many ticks without a
/// visit.
const VISIT_STALE_AFTER: u64 = 1000;

pub struct ScoutController {
    config: RoleConfig,
    table: StateTable,
}

impl ScoutController {
    pub fn new() -> ScoutController {
        ScoutController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Move],
                growth_pattern: Vec::new(),
                max_repeats: 0,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Travel)
                .on(UnitState::Travel, UnitEvent::ArrivedTarget, UnitState::Survey)
                .on_with(UnitState::Survey, UnitEvent::RoomVisited, UnitState::Travel, Effect::ClearTargetRoom),
        }
    }

    fn pick_target_room(&self, memory: &mut UnitMemory, ctx: &ExecutionContext<'_>) {
        if memory.target_room.is_some() {
            return;
        }

        memory.target_room = ctx
            .colony
            .expansion_queue
            .iter()
            .map(|e| e.target_room.as_str())
            .find(|room| {
                ctx.scout
                    .visited
                    .get(*room)
                    .map(|seen| ctx.tick.saturating_sub(*seen) > VISIT_STALE_AFTER)
                    .unwrap_or(true)
            })
            .map(|room| room.to_string());
    }
}

impl RoleController for ScoutController {
    fn role(&self) -> Role {
        Role::Scout
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        self.pick_target_room(memory, ctx);

        let target_room = match memory.target_room.clone() {
            Some(target_room) => target_room,
            None => {
                memory.task = "idle".to_string();
                return Ok("idle");
            }
        };

        let mut machine = self.load_machine(memory);
        let mut surveyed = false;

        let effects = machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Travel => {
                if !surveyed && unit.room_name() == target_room {
                    Some(UnitEvent::ArrivedTarget)
                } else {
                    None
                }
            }
            UnitState::Survey => {
                if surveyed {
                    None
                } else {
                    surveyed = true;
                    Some(UnitEvent::RoomVisited)
                }
            }
            _ => None,
        });

        if effects.contains(&Effect::ClearTargetRoom) {
            // Arrived: record visibility and move on next tick.
            ctx.scout.visited.insert(target_room.clone(), ctx.tick);
            memory.target_room = None;
        }

        let task_name = match machine.state() {
            UnitState::Travel if memory.target_room.is_some() => {
                travel_to_room(unit, &target_room, ctx, Priority::Low);
                "travel"
            }
            _ => "survey",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
