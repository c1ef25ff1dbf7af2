//! Room energy economy analysis.
//!
//! Produces the production/consumption balance that bounds how expensive a
//! spawned body may be before the workforce starves its own economy.

use crate::constants::{SOURCE_ENERGY_PER_TICK, SPAWN_TIME_PER_PART, UNIT_LIFETIME, UNIT_UPKEEP_COST};
use crate::world::{RoomView, WorldSnapshot};

/// Average part cost used to estimate the drain of an in-progress spawn,
/// whose exact body is not visible in the snapshot.
const ESTIMATED_COST_PER_PART: f64 = 75.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RoomEnergyStats {
    pub production: f64,
    pub consumption: f64,
    pub ratio: f64,
    pub max_spawn_budget: u32,
}

pub fn analyze(room: &RoomView, snapshot: &WorldSnapshot, harvester_count: u32) -> RoomEnergyStats {
    let source_count = room.sources.len() as f64;

    let production = if source_count > 0.0 {
        let efficiency = (harvester_count as f64 / source_count).clamp(0.5, 1.0);
        source_count * SOURCE_ENERGY_PER_TICK as f64 * efficiency
    } else {
        0.0
    };

    let units_in_room = snapshot
        .units
        .values()
        .filter(|u| u.room_name() == room.name)
        .count() as u32;

    let spawning_drain: f64 = snapshot
        .spawns_in_room(&room.name)
        .iter()
        .filter_map(|s| s.spawning.as_ref())
        .map(|s| {
            let parts = (s.need_time / SPAWN_TIME_PER_PART).max(1) as f64;
            parts * ESTIMATED_COST_PER_PART / s.need_time.max(1) as f64
        })
        .sum();

    let consumption = if spawning_drain > 0.0 {
        spawning_drain
    } else {
        units_in_room as f64 * UNIT_UPKEEP_COST as f64 / UNIT_LIFETIME as f64
    };

    let ratio = production / consumption.max(0.001);

    let max_spawn_budget = (0.8 * production / units_in_room.max(3) as f64).max(200.0) as u32;

    RoomEnergyStats {
        production,
        consumption,
        ratio,
        max_spawn_budget,
    }
}

/// The largest body cost the room can sustain given its balance. Applied by
/// the body composer on top of the room's raw energy capacity.
pub fn sustainable_spawn_cap(stats: &RoomEnergyStats, energy_capacity: u32) -> u32 {
    if stats.ratio >= 1.5 {
        energy_capacity
    } else if stats.ratio >= 1.2 {
        energy_capacity.min((1.2 * stats.max_spawn_budget as f64) as u32)
    } else if stats.ratio >= 1.0 {
        energy_capacity.min(stats.max_spawn_budget)
    } else {
        (0.8 * stats.max_spawn_budget as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::builder::SnapshotBuilder;

    fn two_source_snapshot() -> WorldSnapshot {
        SnapshotBuilder::new(100)
            .room("W1N1", |room| {
                room.owned(3)
                    .energy(550, 550)
                    .source("source-1", 10, 10, 3000)
                    .source("source-2", 40, 40, 3000)
            })
            .unit("harvester-1-0", |u| u.at("W1N1", 11, 10))
            .unit("harvester-1-1", |u| u.at("W1N1", 39, 40))
            .build()
    }

    #[test]
    fn efficiency_is_clamped() {
        let snapshot = two_source_snapshot();
        let room = snapshot.room("W1N1").unwrap();

        // 2 harvesters on 2 sources: full efficiency.
        let stats = analyze(room, &snapshot, 2);
        assert_eq!(stats.production, 20.0);

        // No harvesters: efficiency floors at 0.5.
        let stats = analyze(room, &snapshot, 0);
        assert_eq!(stats.production, 10.0);
    }

    #[test]
    fn idle_consumption_scales_with_units() {
        let snapshot = two_source_snapshot();
        let room = snapshot.room("W1N1").unwrap();

        let stats = analyze(room, &snapshot, 2);

        // 2 units at 300/1500 upkeep each.
        assert!((stats.consumption - 0.4).abs() < 1e-9);
        assert!(stats.ratio > 1.5);
    }

    #[test]
    fn sustainable_cap_bands() {
        let stats = RoomEnergyStats {
            production: 20.0,
            consumption: 1.0,
            ratio: 1.5,
            max_spawn_budget: 200,
        };
        assert_eq!(sustainable_spawn_cap(&stats, 800), 800);

        let stats = RoomEnergyStats { ratio: 1.2, ..stats };
        assert_eq!(sustainable_spawn_cap(&stats, 800), 240);

        let stats = RoomEnergyStats { ratio: 1.0, ..stats };
        assert_eq!(sustainable_spawn_cap(&stats, 800), 200);

        let stats = RoomEnergyStats { ratio: 0.5, ..stats };
        assert_eq!(sustainable_spawn_cap(&stats, 800), 160);
    }
}
