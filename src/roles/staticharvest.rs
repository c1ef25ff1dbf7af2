//! Stationary harvester: pinned to one source with an adjacent container.
//! Parks next to the source, mines continuously, and keeps its container in
//! shape.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::constants::{Part, StructureKind};
use crate::machine::{StateTable, UnitState};
use crate::blackboard::UnitMemory;
use crate::tasks::discovery::CONTAINER_SEARCH_RANGE;
use crate::tasks::{Priority, TaskKind};
use crate::world::{RoomView, UnitView};
use log::*;

/// Hits fraction below which the harvester patches its own container.
const CONTAINER_REPAIR_FRACTION: f64 = 0.8;

pub struct StationaryHarvesterController {
    config: RoleConfig,
    table: StateTable,
}

impl StationaryHarvesterController {
    pub fn new() -> StationaryHarvesterController {
        StationaryHarvesterController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Work, Part::Work, Part::Carry, Part::Move],
                growth_pattern: vec![Part::Work],
                max_repeats: 3,
                memory_schema_version: 1,
            },
            // Single-state machine; the pin in unit memory carries all the
            // context this role needs.
            table: StateTable::new(UnitState::Harvest),
        }
    }

    fn pin_source(&self, unit: &UnitView, memory: &mut UnitMemory, room: &RoomView, ctx: &mut ExecutionContext<'_>) {
        if memory.source_id.is_some() {
            return;
        }

        let picked = ctx
            .queues
            .peek_available(Role::StationaryHarvester, ctx.tick, |e| e.kind == TaskKind::StaticHarvest)
            .map(|e| e.task_id.clone());

        if let Some(task_id) = picked {
            let assigned = ctx
                .queues
                .queue_mut(Role::StationaryHarvester)
                .assign_specific(&task_id, &unit.name, ctx.tick);

            if let Some(entry) = assigned {
                memory.source_id = Some(entry.target_id.clone());
            }
        }

        if let Some(source_id) = memory.source_id.clone() {
            let container = room
                .find_source(&source_id)
                .and_then(|source| {
                    room.structures_of(StructureKind::Container)
                        .find(|c| c.pos.in_range_to(&source.pos, CONTAINER_SEARCH_RANGE))
                });

            memory.container_id = container.map(|c| c.id.clone());
        }
    }
}

impl RoleController for StationaryHarvesterController {
    fn role(&self) -> Role {
        Role::StationaryHarvester
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        let room = ctx.room_of(unit).ok_or_else(|| format!("{} is in an invisible room", unit.name))?;

        self.pin_source(unit, memory, room, ctx);

        let source = memory.source_id.as_ref().and_then(|id| room.find_source(id)).cloned();

        let source = match source {
            Some(source) => source,
            None => {
                // Pin is stale (source invisible or memory reset); drop it
                // and retry assignment next tick.
                memory.source_id = None;
                memory.container_id = None;
                memory.task = "harvest".to_string();
                return Ok("harvest");
            }
        };

        if !unit.pos.is_near(&source.pos) {
            ctx.movement.request(&unit.name, source.pos.clone(), 1, Priority::High);
            memory.task = "harvest".to_string();
            return Ok("harvest");
        }

        let container = memory.container_id.as_ref().and_then(|id| room.find_structure(id)).cloned();

        // Keep the drop container patched while standing next to it.
        if let Some(container) = container.as_ref() {
            let worn = container.hits_max > 0
                && (container.hits as f64 / container.hits_max as f64) < CONTAINER_REPAIR_FRACTION;

            if worn && !unit.store.is_empty() && unit.pos.is_near(&container.pos) {
                repair_or_approach(unit, container, ctx, Priority::Normal);
                memory.task = "repair".to_string();
                return Ok("repair");
            }
        }

        if unit.store.capacity > 0 && unit.store.is_full() {
            match container.as_ref().filter(|c| unit.pos.is_near(&c.pos) && !c.store().is_full()) {
                Some(container) => transfer_or_approach(unit, container, ctx, Priority::Normal),
                None => {
                    if let Err(err) = unit.drop_resource(None) {
                        debug!("{}: drop failed: {}", unit.name, err);
                    }
                }
            }

            memory.task = "deliver".to_string();
            return Ok("deliver");
        }

        harvest_or_approach(unit, &source, ctx, Priority::High);
        memory.task = "harvest".to_string();

        Ok("harvest")
    }
}
