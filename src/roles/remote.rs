//! Remote workers: travel to an integration room, work it, and ferry the
//! proceeds home. One controller parameterized over the four remote roles;
//! they share the travel/work/return pattern and differ only in what "work"
//! means.

use super::context::ExecutionContext;
use super::utility::*;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::{QueueStatus, UnitMemory};
use crate::constants::Part;
use crate::findnearest::{FindNearest, PathHelpers};
use crate::machine::{Effect, StateTable, UnitEvent, UnitState};
use crate::tasks::Priority;
use crate::world::{RoomView, UnitView};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RemoteKind {
    Miner,
    Hauler,
    Upgrader,
    Builder,
}

pub struct RemoteController {
    role: Role,
    kind: RemoteKind,
    config: RoleConfig,
    table: StateTable,
}

impl RemoteController {
    fn new(role: Role, kind: RemoteKind, base_body: Vec<Part>, growth_pattern: Vec<Part>, max_repeats: u32) -> RemoteController {
        RemoteController {
            role,
            kind,
            config: RoleConfig {
                minimum: 0,
                base_body,
                growth_pattern,
                max_repeats,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Travel)
                .on(UnitState::Travel, UnitEvent::ArrivedTarget, UnitState::Work)
                .on(UnitState::Work, UnitEvent::CargoFull, UnitState::Return)
                .on_with(UnitState::Return, UnitEvent::EnergyEmpty, UnitState::Travel, Effect::ClearTarget),
        }
    }

    pub fn miner() -> RemoteController {
        RemoteController::new(
            Role::RemoteMiner,
            RemoteKind::Miner,
            vec![Part::Work, Part::Work, Part::Carry, Part::Move, Part::Move],
            vec![Part::Work, Part::Carry, Part::Move],
            2,
        )
    }

    pub fn hauler() -> RemoteController {
        RemoteController::new(
            Role::RemoteHauler,
            RemoteKind::Hauler,
            vec![Part::Carry, Part::Carry, Part::Move, Part::Move],
            vec![Part::Carry, Part::Carry, Part::Move, Part::Move],
            5,
        )
    }

    pub fn upgrader() -> RemoteController {
        RemoteController::new(
            Role::RemoteUpgrader,
            RemoteKind::Upgrader,
            vec![Part::Work, Part::Carry, Part::Move, Part::Move],
            vec![Part::Work, Part::Carry, Part::Move],
            3,
        )
    }

    pub fn builder() -> RemoteController {
        RemoteController::new(
            Role::RemoteBuilder,
            RemoteKind::Builder,
            vec![Part::Work, Part::Carry, Part::Move, Part::Move],
            vec![Part::Work, Part::Carry, Part::Move],
            3,
        )
    }

    /// Bind the unit to an integration room. Spread units across rooms by
    /// skipping rooms already covered by a peer of the same role.
    fn assign_target_room(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &ExecutionContext<'_>) {
        if memory.target_room.is_some() {
            return;
        }

        let role = self.role;

        for entry in ctx
            .colony
            .integration_list
            .iter()
            .filter(|e| matches!(e.status, QueueStatus::Pending | QueueStatus::Active))
        {
            let covered = ctx
                .units_brief
                .iter()
                .any(|(name, brief)| {
                    name.as_str() != unit.name
                        && brief.role == role
                        && brief.target_room.as_deref() == Some(entry.room.as_str())
                });

            if !covered {
                memory.target_room = Some(entry.room.clone());
                if memory.home_room.is_none() {
                    memory.home_room = Some(entry.home_room.clone());
                }
                return;
            }
        }

        // Every room covered; double up on the first entry rather than idle.
        if let Some(entry) = ctx.colony.integration_list.first() {
            memory.target_room = Some(entry.room.clone());
        }
    }

    fn run_work(&self, unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> &'static str {
        match self.kind {
            RemoteKind::Miner => {
                if let Some(source) = room
                    .sources
                    .iter()
                    .filter(|s| s.energy > 0)
                    .find_nearest(&unit.pos, PathHelpers::same_room)
                {
                    harvest_or_approach(unit, source, ctx, Priority::Normal);
                    "harvest"
                } else {
                    "idle"
                }
            }
            RemoteKind::Hauler => {
                if let Some(dropped) = room.dropped_resources.iter().find_nearest(&unit.pos, PathHelpers::same_room) {
                    pickup_or_approach(unit, dropped, ctx, Priority::Normal);
                    return "pickup";
                }

                acquire_energy(unit, room, ctx, false)
            }
            RemoteKind::Upgrader => {
                if unit.store.is_empty() {
                    return acquire_energy(unit, room, ctx, true);
                }

                match room.controller.as_ref().filter(|c| c.my) {
                    Some(controller) => {
                        upgrade_or_approach(unit, controller, ctx, Priority::Normal);
                        "upgrade"
                    }
                    None => "idle",
                }
            }
            RemoteKind::Builder => {
                if unit.store.is_empty() {
                    return acquire_energy(unit, room, ctx, true);
                }

                match room.construction_sites.iter().find_nearest(&unit.pos, PathHelpers::same_room) {
                    Some(site) => {
                        build_or_approach(unit, site, ctx, Priority::Normal);
                        "build"
                    }
                    None => "idle",
                }
            }
        }
    }

    fn run_return(&self, unit: &UnitView, memory: &UnitMemory, ctx: &mut ExecutionContext<'_>) -> &'static str {
        let home = match memory.home_room.as_deref() {
            Some(home) => home,
            None => return "idle",
        };

        if unit.room_name() != home {
            travel_to_room(unit, home, ctx, Priority::Normal);
            return "return";
        }

        let room = match ctx.snapshot.room(home) {
            Some(room) => room,
            None => return "return",
        };

        if deposit_cargo(unit, room, ctx) {
            "deliver"
        } else {
            "idle"
        }
    }
}

impl RoleController for RemoteController {
    fn role(&self) -> Role {
        self.role
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

        let hauls_cargo = matches!(self.kind, RemoteKind::Miner | RemoteKind::Hauler);

        let mut machine = self.load_machine(memory);

        machine.run(&self.table, &unit.name, |m| match m.state() {
            UnitState::Travel => {
                if unit.room_name() == target_room {
                    Some(UnitEvent::ArrivedTarget)
                } else {
                    None
                }
            }
            UnitState::Work => {
                if hauls_cargo && unit.store.capacity > 0 && unit.store.is_full() {
                    Some(UnitEvent::CargoFull)
                } else {
                    None
                }
            }
            UnitState::Return => {
                if unit.store.is_empty() {
                    Some(UnitEvent::EnergyEmpty)
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
            UnitState::Work => match ctx.snapshot.room(&target_room) {
                Some(room) if unit.room_name() == target_room => self.run_work(unit, room, ctx),
                _ => {
                    // Drifted out of the target room (edge bounce); head back.
                    travel_to_room(unit, &target_room, ctx, Priority::Normal);
                    "travel"
                }
            },
            UnitState::Return => self.run_return(unit, memory, ctx),
            _ => "idle",
        };

        memory.state_machine = Some(machine.serialize());
        memory.task = task_name.to_string();

        Ok(task_name)
    }
}
