//! Spawn planning: walk the demand-ordered role list, pick idle spawns, and
//! enqueue spawn intents under the energy reserve policy. Also hosts the
//! stuck-spawn watchdog.

use super::body;
use crate::blackboard::{Blackboard, SpawnHealthEntry};
use crate::constants::body_cost;
use crate::demand::Demand;
use crate::energy;
use crate::roles::{Role, RoleRegistry};
use crate::world::{SpawnView, WorldSnapshot};
use log::*;
use std::collections::HashMap;

/// Rooms with fewer units than this may spend full capacity on a spawn to
/// bootstrap, ignoring the sustainability cap.
const EARLY_GAME_UNIT_COUNT: usize = 5;

/// Consecutive stuck ticks before the critical warning fires.
const STUCK_SPAWN_TICKS: u64 = 10;

#[derive(Default, Debug)]
pub struct SpawnOutcome {
    pub spawned: Vec<String>,
    pub warnings: Vec<String>,
}

struct RoomSpawnState {
    energy_available: u32,
    energy_capacity: u32,
    sustainable_cap: u32,
    units_in_room: usize,
    idle_spawns: Vec<String>,
}

pub fn plan_spawns(
    snapshot: &WorldSnapshot,
    blackboard: &mut Blackboard,
    demand: &Demand,
    registry: &RoleRegistry,
) -> SpawnOutcome {
    let mut outcome = SpawnOutcome::default();

    // Unit memory covers live units plus in-flight spawn candidates, which
    // is exactly the population spawn gating should see.
    let mut counts: HashMap<Role, u32> = HashMap::new();
    for memory in blackboard.unit_memory.values() {
        *counts.entry(memory.role).or_insert(0) += 1;
    }

    let harvester_count = counts.get(&Role::Harvester).copied().unwrap_or(0);
    let hauler_count = counts.get(&Role::Hauler).copied().unwrap_or(0);

    let logistics_exist = snapshot.owned_rooms().any(|room| {
        room.has_towers() || room.storage().is_some() || room.structures_of(crate::constants::StructureKind::Container).next().is_some()
    });

    let mut rooms: Vec<(String, RoomSpawnState)> = snapshot
        .owned_rooms()
        .map(|room| {
            let stats = energy::analyze(room, snapshot, harvester_count);
            let state = RoomSpawnState {
                energy_available: room.energy_available,
                energy_capacity: room.energy_capacity_available,
                sustainable_cap: energy::sustainable_spawn_cap(&stats, room.energy_capacity_available),
                units_in_room: snapshot
                    .units
                    .values()
                    .filter(|u| u.room_name() == room.name)
                    .count(),
                idle_spawns: snapshot
                    .spawns_in_room(&room.name)
                    .iter()
                    .filter(|s| !s.is_spawning())
                    .map(|s| s.name.clone())
                    .collect(),
            };
            (room.name.clone(), state)
        })
        .collect();

    for role in &demand.order {
        let role = *role;
        let target = demand.target(role);

        if counts.get(&role).copied().unwrap_or(0) >= target {
            continue;
        }

        let controller = match registry.get(role) {
            Some(controller) => controller,
            None => continue,
        };

        let emergency_harvester = role == Role::Harvester && harvester_count == 0;
        let critical_hauler = role == Role::Hauler && logistics_exist && hauler_count == 0;

        for (room_name, state) in rooms.iter_mut() {
            if state.idle_spawns.is_empty() {
                continue;
            }

            // Sustainability caps the budget, except while bootstrapping a
            // nearly-empty room, or when the economy itself is down and only
            // the energy actually on hand matters.
            let budget = if emergency_harvester || critical_hauler {
                state.energy_available
            } else if state.units_in_room < EARLY_GAME_UNIT_COUNT {
                state.energy_capacity
            } else {
                state.energy_capacity.min(state.sustainable_cap)
            };

            let body = body::compose(controller.config(), budget);

            if body.is_empty() {
                continue;
            }

            let cost = body_cost(&body);

            if cost > state.energy_available {
                continue;
            }

            let reserve = 50u32.max((0.2 * state.energy_capacity as f64) as u32);
            let bypass_reserve = emergency_harvester
                || critical_hauler
                || (matches!(role, Role::Harvester | Role::Upgrader | Role::Builder)
                    && cost + reserve > state.energy_capacity);

            if !bypass_reserve && state.energy_available - cost < reserve {
                continue;
            }

            let spawn_name = state.idle_spawns.remove(0);
            let spawn = &snapshot.spawns[&spawn_name];

            let unit_name = format!("{}-{}-{}", role, snapshot.tick, blackboard.unit_counter);
            let memory = controller.create_memory(room_name);

            match spawn.spawn_intent(&body, &unit_name, memory.clone()) {
                Ok(()) => {
                    debug!("spawning {} in {} (cost {})", unit_name, room_name, cost);

                    blackboard.unit_counter += 1;
                    blackboard.unit_memory.insert(unit_name.clone(), memory);
                    state.energy_available -= cost;
                    *counts.entry(role).or_insert(0) += 1;
                    outcome.spawned.push(unit_name);
                }
                Err(err) => {
                    outcome
                        .warnings
                        .push(format!("spawn {} rejected {}: {}", spawn_name, unit_name, err));
                }
            }

            break;
        }
    }

    outcome
}

/// Stuck-spawn detection. A spawn that still reports spawning while its
/// candidate already lives and the remaining time is spent starts an
/// episode; ten consecutive stuck ticks raise the critical warning exactly
/// once per episode.
pub fn check_spawn_health(snapshot: &WorldSnapshot, blackboard: &mut Blackboard) -> Vec<String> {
    let mut warnings = Vec::new();
    let tick = snapshot.tick;

    let mut active: Vec<&SpawnView> = snapshot.spawns.values().collect();
    active.sort_by(|a, b| a.name.cmp(&b.name));

    for spawn in &active {
        let spawning = match spawn.spawning.as_ref() {
            Some(spawning) => spawning,
            None => {
                blackboard.spawn_health.remove(&spawn.id);
                continue;
            }
        };

        if spawning.remaining_time > spawning.need_time as i32 {
            warnings.push(format!(
                "spawn {} reports invalid timing: {} remaining of {} needed",
                spawn.name, spawning.remaining_time, spawning.need_time
            ));
        }

        let candidate_live = snapshot.units.contains_key(&spawning.unit_name);
        let stuck = candidate_live && spawning.remaining_time <= 0;

        if !stuck {
            blackboard.spawn_health.remove(&spawn.id);
            continue;
        }

        let entry = blackboard
            .spawn_health
            .entry(spawn.id.clone())
            .or_insert_with(|| SpawnHealthEntry {
                detected_at: tick,
                candidate_name: spawning.unit_name.clone(),
                remaining_time: spawning.remaining_time,
            });

        // A different candidate means a new episode.
        if entry.candidate_name != spawning.unit_name {
            *entry = SpawnHealthEntry {
                detected_at: tick,
                candidate_name: spawning.unit_name.clone(),
                remaining_time: spawning.remaining_time,
            };
        }

        entry.remaining_time = spawning.remaining_time;

        if tick.saturating_sub(entry.detected_at) == STUCK_SPAWN_TICKS {
            warnings.push(format!(
                "spawn {} stuck for {} ticks on {}",
                spawn.name, STUCK_SPAWN_TICKS, spawning.unit_name
            ));
            warn!("{}", warnings.last().unwrap());
        }
    }

    // Entries for spawns no longer in the snapshot are stale.
    blackboard
        .spawn_health
        .retain(|spawn_id, _| snapshot.spawns.values().any(|s| s.id == *spawn_id));

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Part;
    use crate::world::builder::SnapshotBuilder;

    fn registry() -> RoleRegistry {
        RoleRegistry::new()
    }

    fn bootstrap_demand() -> Demand {
        let mut demand = Demand::default();
        demand.targets.insert(Role::Harvester, 1);
        demand.order = vec![Role::Harvester];
        demand
    }

    #[test]
    fn bootstrap_spawn_uses_base_body() {
        let snapshot = SnapshotBuilder::new(5)
            .room("W1N1", |room| room.owned(1).energy(300, 300).source("source-1", 10, 10, 3000))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s)
            .build();

        let mut blackboard = Blackboard::new();
        let outcome = plan_spawns(&snapshot, &mut blackboard, &bootstrap_demand(), &registry());

        assert_eq!(outcome.spawned, vec!["harvester-5-0"]);
        assert_eq!(blackboard.unit_counter, 1);
        assert!(blackboard.unit_memory.contains_key("harvester-5-0"));

        let intents = snapshot.intents();
        let intents = intents.borrow();
        assert_eq!(intents.spawn_intents.len(), 1);
        assert_eq!(intents.spawn_intents[0].body, vec![Part::Work, Part::Carry, Part::Move]);
    }

    #[test]
    fn reserve_blocks_non_essential_roles() {
        // 800-capacity room nearly drained: a scout would dip below the
        // 160-energy reserve, so nothing spawns.
        let snapshot = SnapshotBuilder::new(5)
            .room("W1N1", |room| room.owned(4).energy(200, 800).source("source-1", 10, 10, 3000))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s)
            .unit("harvester-1-0", |u| u.at("W1N1", 11, 10))
            .unit("harvester-1-1", |u| u.at("W1N1", 9, 10))
            .unit("upgrader-1-0", |u| u.at("W1N1", 25, 39))
            .unit("builder-1-0", |u| u.at("W1N1", 25, 38))
            .unit("hauler-1-0", |u| u.at("W1N1", 25, 37))
            .build();

        let mut blackboard = Blackboard::new();
        for name in ["harvester-1-0", "harvester-1-1"] {
            blackboard
                .unit_memory
                .insert(name.to_string(), crate::blackboard::UnitMemory::new(Role::Harvester, 1));
        }

        let mut demand = Demand::default();
        demand.targets.insert(Role::Scout, 1);
        demand.order = vec![Role::Scout];

        let outcome = plan_spawns(&snapshot, &mut blackboard, &demand, &registry());

        assert!(outcome.spawned.is_empty());
    }

    #[test]
    fn workforce_collapse_spawns_with_available_energy() {
        // No units at all and only 180 energy: the emergency bypass spawns
        // a two-part harvester instead of waiting for a full base body.
        let snapshot = SnapshotBuilder::new(5)
            .room("W1N1", |room| room.owned(2).energy(180, 550).source("source-1", 10, 10, 3000))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s)
            .build();

        let mut blackboard = Blackboard::new();
        let outcome = plan_spawns(&snapshot, &mut blackboard, &bootstrap_demand(), &registry());

        assert_eq!(outcome.spawned.len(), 1);

        let intents = snapshot.intents();
        let intents = intents.borrow();
        assert_eq!(intents.spawn_intents[0].body, vec![Part::Work, Part::Move]);
    }

    #[test]
    fn stuck_spawn_warns_once_per_episode() {
        let mut blackboard = Blackboard::new();

        let build = |tick: u64| {
            SnapshotBuilder::new(tick)
                .room("W1N1", |room| room.owned(2).energy(300, 300))
                .spawn("Spawn1", "W1N1", 25, 25, |s| s.spawning("harvester-1-0", 9, 0))
                .unit("harvester-1-0", |u| u.at("W1N1", 25, 26))
                .build()
        };

        let mut critical = 0;
        for tick in 100..120 {
            let snapshot = build(tick);
            let warnings = check_spawn_health(&snapshot, &mut blackboard);
            critical += warnings.iter().filter(|w| w.contains("stuck")).count();
        }

        assert_eq!(critical, 1);
        assert_eq!(blackboard.spawn_health["Spawn1"].detected_at, 100);
    }

    #[test]
    fn invalid_timing_always_warns() {
        let snapshot = SnapshotBuilder::new(50)
            .room("W1N1", |room| room.owned(2).energy(300, 300))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s.spawning("hauler-1-0", 9, 12))
            .build();

        let mut blackboard = Blackboard::new();
        let warnings = check_spawn_health(&snapshot, &mut blackboard);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid timing"));
    }
}
