//! Task discovery: turn room observations into idempotent task entries,
//! classified by owning role. Runs once per owned room per tick; queue
//! insertion is idempotent by task id, so repeat discovery refreshes rather
//! than duplicates.

use super::queue::TaskQueues;
use super::{Priority, TaskEntry, TaskKind};
use crate::constants::StructureKind;
use crate::roles::Role;
use crate::world::RoomView;

const HARVEST_TASK_TTL: u64 = 100;
const BUILD_TASK_TTL: u64 = 200;
const REPAIR_TASK_TTL: u64 = 150;
const PICKUP_TASK_TTL: u64 = 50;
const DELIVERY_TASK_TTL: u64 = 100;
const UPGRADE_TASK_TTL: u64 = 50;
const STATIC_HARVEST_TTL: u64 = 100;

/// Minimum dropped-energy pile worth sending a hauler after.
const MIN_PICKUP_AMOUNT: u32 = 20;

/// Container search range around a source for static harvesting.
pub const CONTAINER_SEARCH_RANGE: u32 = 2;

/// Thresholds that bound discovery of repair work on fortifications.
#[derive(Copy, Clone, Debug)]
pub struct DiscoveryTuning {
    pub wall_target_hits: u32,
    pub rampart_target_hits: u32,
}

impl Default for DiscoveryTuning {
    fn default() -> DiscoveryTuning {
        DiscoveryTuning {
            wall_target_hits: 100_000,
            rampart_target_hits: 100_000,
        }
    }
}

pub fn discover_room_tasks(room: &RoomView, tick: u64, tuning: &DiscoveryTuning, queues: &mut TaskQueues) {
    discover_harvest_tasks(room, tick, queues);
    discover_build_tasks(room, tick, queues);
    discover_repair_tasks(room, tick, tuning, queues);
    discover_haul_tasks(room, tick, queues);
    discover_upgrade_task(room, tick, queues);
    discover_static_harvest_tasks(room, tick, queues);
}

fn discover_harvest_tasks(room: &RoomView, tick: u64, queues: &mut TaskQueues) {
    for source in room.sources.iter().filter(|s| s.energy > 0) {
        queues.add_task(
            Role::Harvester,
            TaskEntry::new(
                TaskKind::Harvest,
                source.id.clone(),
                room.name.clone(),
                Priority::High,
                tick + HARVEST_TASK_TTL,
            ),
        );
    }
}

fn build_priority(kind: StructureKind) -> Priority {
    match kind {
        StructureKind::Spawn | StructureKind::Extension => Priority::Critical,
        StructureKind::Tower | StructureKind::Container | StructureKind::Storage => Priority::High,
        StructureKind::Road | StructureKind::Rampart => Priority::Normal,
        _ => Priority::Low,
    }
}

fn discover_build_tasks(room: &RoomView, tick: u64, queues: &mut TaskQueues) {
    for site in &room.construction_sites {
        queues.add_task(
            Role::Builder,
            TaskEntry::new(
                TaskKind::Build,
                site.id.clone(),
                room.name.clone(),
                build_priority(site.kind),
                tick + BUILD_TASK_TTL,
            ),
        );
    }
}

fn repair_priority(kind: StructureKind) -> Priority {
    match kind {
        StructureKind::Spawn | StructureKind::Tower => Priority::Critical,
        StructureKind::Road | StructureKind::Container => Priority::High,
        _ => Priority::Normal,
    }
}

fn discover_repair_tasks(room: &RoomView, tick: u64, tuning: &DiscoveryTuning, queues: &mut TaskQueues) {
    for structure in room.structures.iter().filter(|s| s.is_damaged()) {
        // Fortifications are only repair targets below their target hits;
        // grinding them to max is wall-upgrade work, not maintenance.
        let wanted = match structure.kind {
            StructureKind::Wall => structure.hits < tuning.wall_target_hits,
            StructureKind::Rampart => structure.hits < tuning.rampart_target_hits,
            _ => true,
        };

        if !wanted {
            continue;
        }

        queues.add_task(
            Role::Repairer,
            TaskEntry::new(
                TaskKind::Repair,
                structure.id.clone(),
                room.name.clone(),
                repair_priority(structure.kind),
                tick + REPAIR_TASK_TTL,
            ),
        );
    }
}

fn discover_haul_tasks(room: &RoomView, tick: u64, queues: &mut TaskQueues) {
    for dropped in room.dropped_resources.iter().filter(|d| d.amount >= MIN_PICKUP_AMOUNT) {
        queues.add_task(
            Role::Hauler,
            TaskEntry::new(
                TaskKind::Pickup,
                dropped.id.clone(),
                room.name.clone(),
                Priority::High,
                tick + PICKUP_TASK_TTL,
            ),
        );
    }

    for container in room.structures_of(StructureKind::Container) {
        if !container.store().is_empty() {
            queues.add_task(
                Role::Hauler,
                TaskEntry::new(
                    TaskKind::WithdrawContainer,
                    container.id.clone(),
                    room.name.clone(),
                    Priority::Normal,
                    tick + PICKUP_TASK_TTL,
                ),
            );
        }
    }

    for structure in room.my_structures() {
        match structure.kind {
            StructureKind::Spawn | StructureKind::Extension => {
                if structure.store().free_capacity() > 0 {
                    queues.add_task(
                        Role::Hauler,
                        TaskEntry::new(
                            TaskKind::RefillSpawn,
                            structure.id.clone(),
                            room.name.clone(),
                            Priority::Critical,
                            tick + DELIVERY_TASK_TTL,
                        ),
                    );
                }
            }
            StructureKind::Tower => {
                if structure.store().free_capacity() > 0 {
                    queues.add_task(
                        Role::Hauler,
                        TaskEntry::new(
                            TaskKind::RefillTower,
                            structure.id.clone(),
                            room.name.clone(),
                            Priority::High,
                            tick + DELIVERY_TASK_TTL,
                        ),
                    );
                }
            }
            StructureKind::Storage => {
                if structure.store().free_capacity() > 0 {
                    queues.add_task(
                        Role::Hauler,
                        TaskEntry::new(
                            TaskKind::StoreEnergy,
                            structure.id.clone(),
                            room.name.clone(),
                            Priority::Normal,
                            tick + DELIVERY_TASK_TTL,
                        ),
                    );
                }
            }
            _ => {}
        }
    }
}

fn discover_upgrade_task(room: &RoomView, tick: u64, queues: &mut TaskQueues) {
    if let Some(controller) = room.controller.as_ref().filter(|c| c.my) {
        queues.add_task(
            Role::Upgrader,
            TaskEntry::new(
                TaskKind::Upgrade,
                controller.id.clone(),
                room.name.clone(),
                Priority::Normal,
                tick + UPGRADE_TASK_TTL,
            ),
        );
    }
}

fn discover_static_harvest_tasks(room: &RoomView, tick: u64, queues: &mut TaskQueues) {
    for (source, _container) in room.sources_with_container(CONTAINER_SEARCH_RANGE) {
        queues.add_task(
            Role::StationaryHarvester,
            TaskEntry::new(
                TaskKind::StaticHarvest,
                source.id.clone(),
                room.name.clone(),
                Priority::High,
                tick + STATIC_HARVEST_TTL,
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::builder::SnapshotBuilder;

    #[test]
    fn one_entry_per_target_across_repeat_discovery() {
        let snapshot = SnapshotBuilder::new(10)
            .room("W1N1", |room| {
                room.owned(2)
                    .source("source-1", 10, 10, 3000)
                    .construction_site("site-1", StructureKind::Spawn, 20, 20)
            })
            .build();

        let room = snapshot.room("W1N1").unwrap();
        let mut queues = TaskQueues::default();

        discover_room_tasks(room, 10, &DiscoveryTuning::default(), &mut queues);
        discover_room_tasks(room, 11, &DiscoveryTuning::default(), &mut queues);

        assert_eq!(queues.queue(Role::Harvester).unwrap().entries().len(), 1);
        assert_eq!(queues.queue(Role::Builder).unwrap().entries().len(), 1);
        assert_eq!(queues.queue(Role::Builder).unwrap().entries()[0].priority, Priority::Critical);
    }

    #[test]
    fn fortifications_above_target_hits_are_not_repair_work() {
        let snapshot = SnapshotBuilder::new(10)
            .room("W1N1", |room| {
                room.owned(3)
                    .structure("wall-1", StructureKind::Wall, 5, 5, |s| s.hits(200_000, 300_000_000))
                    .structure("road-1", StructureKind::Road, 6, 6, |s| s.hits(2_000, 5_000))
            })
            .build();

        let room = snapshot.room("W1N1").unwrap();
        let mut queues = TaskQueues::default();

        discover_room_tasks(room, 10, &DiscoveryTuning::default(), &mut queues);

        let repair = queues.queue(Role::Repairer).unwrap();

        assert_eq!(repair.entries().len(), 1);
        assert_eq!(repair.entries()[0].target_id, "road-1");
        assert_eq!(repair.entries()[0].priority, Priority::High);
    }

    #[test]
    fn refill_tasks_track_free_capacity() {
        let snapshot = SnapshotBuilder::new(10)
            .room("W1N1", |room| {
                room.owned(3)
                    .structure("spawn-1", StructureKind::Spawn, 25, 25, |s| s.store(100, 300))
                    .structure("tower-1", StructureKind::Tower, 26, 25, |s| s.store(1000, 1000))
            })
            .build();

        let room = snapshot.room("W1N1").unwrap();
        let mut queues = TaskQueues::default();

        discover_room_tasks(room, 10, &DiscoveryTuning::default(), &mut queues);

        let hauler = queues.queue(Role::Hauler).unwrap();

        assert_eq!(hauler.entries().len(), 1);
        assert_eq!(hauler.entries()[0].kind, TaskKind::RefillSpawn);
    }
}
