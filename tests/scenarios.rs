//! End-to-end tick scenarios driven through the public snapshot builder.

use colony_kernel::blackboard::{Blackboard, Posture, UnitMemory};
use colony_kernel::constants::{Part, StructureKind};
use colony_kernel::roles::Role;
use colony_kernel::tasks::TaskKind;
use colony_kernel::world::builder::{ScriptedCpuMeter, SnapshotBuilder};
use colony_kernel::world::UnitIntent;
use colony_kernel::TickKernel;

#[test]
fn bootstrap_spawns_first_harvester() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    let snapshot = SnapshotBuilder::new(1)
        .room("W1N1", |room| room.owned(1).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .build();

    let summary = kernel.run(&snapshot, &mut blackboard);

    assert_eq!(summary.spawned_units, 1);
    assert_eq!(blackboard.unit_counter, 1);
    assert!(blackboard.unit_memory.contains_key("harvester-1-0"));

    let intents = snapshot.intents();
    let intents = intents.borrow();
    assert_eq!(intents.spawn_intents.len(), 1);
    assert_eq!(intents.spawn_intents[0].unit_name, "harvester-1-0");
    assert_eq!(intents.spawn_intents[0].body, vec![Part::Work, Part::Carry, Part::Move]);

    // Next tick the unit exists; role counts pick it up after memory repair.
    let snapshot = SnapshotBuilder::new(2)
        .room("W1N1", |room| room.owned(1).energy(100, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s.spawning("harvester-1-0", 9, 6))
        .unit("harvester-1-0", |u| u.at("W1N1", 25, 26))
        .build();

    kernel.run(&snapshot, &mut blackboard);

    assert_eq!(blackboard.role_counts.get(&Role::Harvester), Some(&1));
    assert!(blackboard.unit_counter >= 1);
}

#[test]
fn container_transition_prefers_stationary_harvesters() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    let mut units = vec![("harvester-1-0", Role::Harvester)];
    units.push(("hauler-1-0", Role::Hauler));
    units.push(("hauler-1-1", Role::Hauler));
    units.push(("upgrader-1-0", Role::Upgrader));
    units.push(("upgrader-1-1", Role::Upgrader));
    units.push(("upgrader-1-2", Role::Upgrader));
    units.push(("builder-1-0", Role::Builder));

    for (name, role) in &units {
        blackboard.unit_memory.insert(name.to_string(), UnitMemory::new(*role, 1));
    }

    let mut builder = SnapshotBuilder::new(500)
        .room("W1N1", |room| {
            room.owned(4)
                .energy(900, 1300)
                .source("source-1", 10, 10, 3000)
                .source("source-2", 40, 40, 3000)
                .structure("container-1", StructureKind::Container, 11, 10, |s| s)
                .structure("container-2", StructureKind::Container, 39, 40, |s| s)
        })
        .spawn("Spawn1", "W1N1", 25, 25, |s| s);

    for (i, (name, _)) in units.iter().enumerate() {
        let name = name.to_string();
        builder = builder.unit(&name, |u| u.at("W1N1", 20, 20 + i as u8).store(0, 50));
    }

    let snapshot = builder.build();
    let summary = kernel.run(&snapshot, &mut blackboard);

    let demand = blackboard.last_demand.as_ref().unwrap();
    assert_eq!(demand.target(Role::StationaryHarvester), 2);
    assert_eq!(demand.target(Role::Hauler), 2);
    assert!(demand.target(Role::Harvester) <= 2);

    assert_eq!(summary.spawned_units, 1);

    let intents = snapshot.intents();
    let intents = intents.borrow();
    assert_eq!(intents.spawn_intents[0].memory.role, Role::StationaryHarvester);
}

#[test]
fn one_construction_site_is_worked_by_one_builder() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    for name in ["builder-1-0", "builder-1-1", "builder-1-2"] {
        blackboard.unit_memory.insert(name.to_string(), UnitMemory::new(Role::Builder, 1));
    }

    let snapshot = SnapshotBuilder::new(50)
        .room("W1N1", |room| {
            room.owned(2)
                .energy(300, 300)
                .source("source-1", 10, 10, 3000)
                .construction_site("site-spawn", StructureKind::Spawn, 30, 30)
                .structure("road-1", StructureKind::Road, 20, 20, |s| s.hits(2000, 5000))
        })
        .unit("builder-1-0", |u| u.at("W1N1", 28, 28).store(50, 50))
        .unit("builder-1-1", |u| u.at("W1N1", 27, 27).store(50, 50))
        .unit("builder-1-2", |u| u.at("W1N1", 26, 26).store(50, 50))
        .build();

    let summary = kernel.run(&snapshot, &mut blackboard);

    // Exactly one builder holds the build assignment.
    let build_queue = blackboard.task_queues.queue(Role::Builder).unwrap();
    assert_eq!(build_queue.entries().len(), 1);
    assert_eq!(build_queue.entries()[0].assigned_unit.as_deref(), Some("builder-1-0"));

    assert_eq!(summary.tasks_executed.get("build"), Some(&1));
    // The others fell through to maintenance or idled; nobody errored.
    assert_eq!(summary.processed_units, 3);
    assert!(summary.warnings.iter().all(|w| !w.contains("execute failed")));
}

#[test]
fn defensive_posture_reprioritizes_spawning() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();
    blackboard.defense.posture.insert("W1N1".to_string(), Posture::Defensive);

    let snapshot = SnapshotBuilder::new(10)
        .room("W1N1", |room| room.owned(4).energy(300, 800).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .build();

    kernel.run(&snapshot, &mut blackboard);

    let demand = blackboard.last_demand.as_ref().unwrap();

    assert_eq!(demand.target(Role::Upgrader), 0);
    assert!(demand.target(Role::Attacker) >= 2);
    assert!(demand.target(Role::Healer) >= 2);
    assert_eq!(&demand.order[..3], &[Role::Harvester, Role::Attacker, Role::Healer]);
}

#[test]
fn cpu_exhaustion_aborts_to_telemetry() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    // The meter reports 95% of the limit from the first checkpoint on.
    let snapshot = SnapshotBuilder::new(30)
        .cpu(100.0, 500.0)
        .cpu_meter(Box::new(ScriptedCpuMeter::constant(95.0)))
        .room("W1N1", |room| room.owned(2).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .unit("harvester-1-0", |u| u.at("W1N1", 11, 10))
        .build();

    blackboard
        .unit_memory
        .insert("harvester-1-0".to_string(), UnitMemory::new(Role::Harvester, 1));

    let summary = kernel.run(&snapshot, &mut blackboard);

    assert!(summary
        .warnings
        .iter()
        .any(|w| w == "CPU threshold exceeded after memory operations"));

    // Telemetry still made it to the blackboard; nothing else ran.
    assert_eq!(blackboard.telemetry.tick, 30);
    assert_eq!(summary.spawned_units, 0);
    assert!(summary.tasks_executed.is_empty());

    let intents = snapshot.intents();
    assert!(intents.borrow().spawn_intents.is_empty());
    assert!(intents.borrow().unit_intents.is_empty());

    // Memory repair ran before the abort, so the blackboard stayed coherent.
    assert_eq!(blackboard.role_counts.get(&Role::Harvester), Some(&1));
}

#[test]
fn dead_unit_assignment_is_reclaimed() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    blackboard
        .unit_memory
        .insert("harvester-100-0".to_string(), UnitMemory::new(Role::Harvester, 1));

    let snapshot = SnapshotBuilder::new(200)
        .room("W1N1", |room| room.owned(2).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s.spawning("other-1", 9, 3))
        .unit("harvester-100-0", |u| u.at("W1N1", 20, 20).store(0, 50))
        .build();

    kernel.run(&snapshot, &mut blackboard);

    let entry = blackboard
        .task_queues
        .queue(Role::Harvester)
        .unwrap()
        .get("W1N1-harvest-source-1")
        .unwrap();
    assert_eq!(entry.assigned_unit.as_deref(), Some("harvester-100-0"));

    // Next tick the assignee is gone; a replacement picks up the same task.
    blackboard
        .unit_memory
        .insert("harvester-100-1".to_string(), UnitMemory::new(Role::Harvester, 1));

    let snapshot = SnapshotBuilder::new(201)
        .room("W1N1", |room| room.owned(2).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s.spawning("other-1", 9, 2))
        .unit("harvester-100-1", |u| u.at("W1N1", 21, 20).store(0, 50))
        .build();

    kernel.run(&snapshot, &mut blackboard);

    assert!(!blackboard.unit_memory.contains_key("harvester-100-0"));

    let entry = blackboard
        .task_queues
        .queue(Role::Harvester)
        .unwrap()
        .get("W1N1-harvest-source-1")
        .unwrap();
    assert_eq!(entry.assigned_unit.as_deref(), Some("harvester-100-1"));
}

#[test]
fn empty_world_still_writes_telemetry() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    let snapshot = SnapshotBuilder::new(77).build();

    let summary = kernel.run(&snapshot, &mut blackboard);

    assert_eq!(summary.tick, 77);
    assert_eq!(blackboard.telemetry.tick, 77);
    assert_eq!(summary.processed_units, 0);
    assert!(summary.warnings.iter().any(|w| w.contains("respawn")));
}

#[test]
fn harvester_lifecycle_issues_expected_intents() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    blackboard
        .unit_memory
        .insert("harvester-1-0".to_string(), UnitMemory::new(Role::Harvester, 1));

    // Empty store, adjacent to the source: the unit should harvest.
    let snapshot = SnapshotBuilder::new(10)
        .room("W1N1", |room| room.owned(2).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .unit("harvester-1-0", |u| u.at("W1N1", 11, 10).store(0, 50))
        .build();

    kernel.run(&snapshot, &mut blackboard);

    {
        let intents = snapshot.intents();
        let intents = intents.borrow();
        let harvests: Vec<_> = intents.intents_for("harvester-1-0").collect();
        assert_eq!(harvests, vec![&UnitIntent::Harvest { target_id: "source-1".to_string() }]);
    }

    // Full store next to a hungry spawn structure: forced delivery.
    let snapshot = SnapshotBuilder::new(11)
        .room("W1N1", |room| {
            room.owned(2)
                .energy(100, 300)
                .source("source-1", 10, 10, 3000)
                .structure("spawn-struct-1", StructureKind::Spawn, 25, 25, |s| s.store(100, 300))
        })
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .unit("harvester-1-0", |u| u.at("W1N1", 25, 26).store(50, 50))
        .build();

    kernel.run(&snapshot, &mut blackboard);

    let intents = snapshot.intents();
    let intents = intents.borrow();
    let delivery: Vec<_> = intents.intents_for("harvester-1-0").collect();
    assert_eq!(
        delivery,
        vec![&UnitIntent::Transfer {
            target_id: "spawn-struct-1".to_string(),
            amount: 50,
        }]
    );
}

#[test]
fn blackboard_survives_segment_round_trip() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    let snapshot = SnapshotBuilder::new(5)
        .room("W1N1", |room| room.owned(1).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .build();

    kernel.run(&snapshot, &mut blackboard);

    let json = blackboard.to_value();
    let (decoded, warnings) = Blackboard::from_value(json);

    assert!(warnings.is_empty());
    assert_eq!(decoded.unit_counter, blackboard.unit_counter);
    assert_eq!(decoded.unit_memory.len(), blackboard.unit_memory.len());
    assert_eq!(decoded.telemetry.tick, 5);

    // And through the compressed segment codec.
    let encoded = colony_kernel::serialize::encode_to_string(&blackboard).unwrap();
    let from_segment: Blackboard = colony_kernel::serialize::decode_from_string(&encoded).unwrap();

    assert_eq!(from_segment.unit_counter, blackboard.unit_counter);
}

#[test]
fn subtree_heal_surfaces_in_telemetry() {
    let (mut blackboard, warnings) = Blackboard::from_value(serde_json::json!({
        "unit_counter": 3,
        "task_queue": 42,
    }));

    assert_eq!(warnings.len(), 1);

    let snapshot = SnapshotBuilder::new(9)
        .room("W1N1", |room| room.owned(1).energy(300, 300).source("source-1", 10, 10, 3000))
        .spawn("Spawn1", "W1N1", 25, 25, |s| s)
        .build();

    let summary = TickKernel::new().run(&snapshot, &mut blackboard);

    assert!(summary.warnings.iter().any(|w| w.contains("task_queue") && w.contains("reset to defaults")));
    assert_eq!(summary.memory_heals, 1);
    // The heal is reported once, not on every later tick.
    assert!(blackboard.heal_warnings.is_empty());
    assert_eq!(blackboard.unit_counter, 4);
}

#[test]
fn hauler_runs_refill_tasks() {
    let mut kernel = TickKernel::new();
    let mut blackboard = Blackboard::new();

    blackboard
        .unit_memory
        .insert("hauler-1-0".to_string(), UnitMemory::new(Role::Hauler, 1));

    // Hauler with cargo, spawn structure needs energy: refill task claimed
    // and served.
    let snapshot = SnapshotBuilder::new(40)
        .room("W1N1", |room| {
            room.owned(3)
                .energy(200, 550)
                .source("source-1", 10, 10, 3000)
                .structure("spawn-struct-1", StructureKind::Spawn, 25, 25, |s| s.store(200, 300))
                .structure("container-1", StructureKind::Container, 12, 10, |s| s.store(800, 2000))
        })
        .unit("hauler-1-0", |u| {
            u.at("W1N1", 25, 26).body(vec![Part::Carry, Part::Carry, Part::Move]).store(100, 100)
        })
        .build();

    let summary = kernel.run(&snapshot, &mut blackboard);

    assert_eq!(summary.tasks_executed.get("deliver"), Some(&1));

    let entry = blackboard
        .task_queues
        .queue(Role::Hauler)
        .unwrap()
        .entries()
        .iter()
        .find(|e| e.kind == TaskKind::RefillSpawn)
        .unwrap();
    assert_eq!(entry.assigned_unit.as_deref(), Some("hauler-1-0"));

    let intents = snapshot.intents();
    let intents = intents.borrow();
    let moves: Vec<_> = intents.intents_for("hauler-1-0").collect();
    assert_eq!(
        moves,
        vec![&UnitIntent::Transfer {
            target_id: "spawn-struct-1".to_string(),
            amount: 100,
        }]
    );
}
