//! Demand calculation: derive per-role target minimums and the spawn
//! priority order from the current snapshot. Reads the blackboard, never
//! writes it; the spawn planner is the only consumer.

use crate::blackboard::{Blackboard, Posture, QueueStatus};
use crate::constants::StructureKind;
use crate::roles::{Role, RoleRegistry};
use crate::tasks::discovery::CONTAINER_SEARCH_RANGE;
use crate::world::{RoomView, WorldSnapshot};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

bitflags! {
    /// Infrastructure present in an analyzed room.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct RoomFlags: u8 {
        const HAS_TOWERS = 1 << 0;
        const HAS_STORAGE = 1 << 1;
        const HAS_CONTAINERS = 1 << 2;
        const HAS_LINKS = 1 << 3;
        const HAS_DAMAGE = 1 << 4;
    }
}

/// Per-room observation feeding the demand formulas.
#[derive(Clone, Debug)]
pub struct RoomAnalysis {
    pub name: String,
    pub rcl: u8,
    pub source_count: u32,
    pub container_sources: u32,
    pub link_count: u32,
    pub construction_sites: u32,
    pub damaged_structures: u32,
    pub flags: RoomFlags,
    pub storage_energy_ratio: f64,
    pub extension_fill: f64,
}

pub fn analyze_room(room: &RoomView) -> RoomAnalysis {
    let mut flags = RoomFlags::default();

    if room.has_towers() {
        flags |= RoomFlags::HAS_TOWERS;
    }
    if room.storage().is_some() {
        flags |= RoomFlags::HAS_STORAGE;
    }
    if room.structures_of(StructureKind::Container).next().is_some() {
        flags |= RoomFlags::HAS_CONTAINERS;
    }

    let link_count = room
        .structures_of(StructureKind::Link)
        .filter(|l| l.operational)
        .count() as u32;

    if link_count > 0 {
        flags |= RoomFlags::HAS_LINKS;
    }

    // Fortifications do not count toward maintenance pressure here; the
    // repair queue applies its own target-hits bounds.
    let damaged_structures = room
        .structures
        .iter()
        .filter(|s| !matches!(s.kind, StructureKind::Wall | StructureKind::Rampart))
        .filter(|s| s.is_damaged())
        .count() as u32;

    if damaged_structures > 0 {
        flags |= RoomFlags::HAS_DAMAGE;
    }

    let storage_energy_ratio = room
        .storage()
        .map(|s| s.store().fill_fraction())
        .unwrap_or(0.0);

    let extension_fill = if room.energy_capacity_available > 0 {
        room.energy_available as f64 / room.energy_capacity_available as f64
    } else {
        0.0
    };

    RoomAnalysis {
        name: room.name.clone(),
        rcl: room.rcl(),
        source_count: room.sources.len() as u32,
        container_sources: room.sources_with_container(CONTAINER_SEARCH_RANGE).count() as u32,
        link_count,
        construction_sites: room.construction_sites.len() as u32,
        damaged_structures,
        flags,
        storage_energy_ratio,
        extension_fill,
    }
}

/// Derived spawn targets for the current tick. Cached in the blackboard so
/// spawn planning survives a skipped demand phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    #[serde(default)]
    pub targets: HashMap<Role, u32>,
    #[serde(default)]
    pub order: Vec<Role>,
}

impl Demand {
    pub fn target(&self, role: Role) -> u32 {
        self.targets.get(&role).copied().unwrap_or(0)
    }
}

/// Harvester target for one room. Rooms with container mining hand the bulk
/// of the work to stationary harvesters and haulers.
fn harvester_target(analysis: &RoomAnalysis) -> u32 {
    if analysis.container_sources > 0 {
        return analysis.source_count.saturating_sub(analysis.container_sources).max(1);
    }

    match analysis.source_count {
        0 => 0,
        1 => {
            if analysis.rcl < 3 {
                3
            } else {
                2
            }
        }
        s => {
            if analysis.rcl >= 3 {
                2 * s
            } else {
                s + 1
            }
        }
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b.max(1)
}

pub fn calculate(snapshot: &WorldSnapshot, blackboard: &Blackboard, registry: &RoleRegistry) -> Demand {
    let analyses: Vec<RoomAnalysis> = snapshot.owned_rooms().map(analyze_room).collect();
    let owned_rooms = (analyses.len() as u32).max(1);

    let builder_baseline = registry.config(Role::Builder).map(|c| c.minimum).unwrap_or(1);
    let upgrader_baseline = registry.config(Role::Upgrader).map(|c| c.minimum).unwrap_or(3);

    let mut targets: HashMap<Role, u32> = HashMap::new();

    let mut harvester: u32 = analyses.iter().map(harvester_target).sum();
    let stationary: u32 = analyses.iter().map(|a| a.container_sources).sum();

    let any_container_mining = stationary > 0;
    let any_logistics = analyses.iter().any(|a| {
        a.flags
            .intersects(RoomFlags::HAS_TOWERS | RoomFlags::HAS_STORAGE | RoomFlags::HAS_CONTAINERS)
    });

    let mut repairer: u32 = 0;

    let hauler: u32 = if any_container_mining {
        repairer = owned_rooms;

        analyses
            .iter()
            .filter(|a| a.container_sources > 0)
            .map(|a| {
                if a.link_count >= 2 {
                    ceil_div(a.source_count, 2).max(1)
                } else {
                    a.source_count.max(owned_rooms)
                }
            })
            .sum()
    } else if any_logistics {
        harvester = harvester.saturating_sub(1);
        owned_rooms.max(1)
    } else {
        0
    };

    if analyses.iter().any(|a| a.flags.contains(RoomFlags::HAS_DAMAGE)) {
        repairer = repairer.max(1);
    }

    let total_sites: u32 = analyses.iter().map(|a| a.construction_sites).sum();
    let builder = match total_sites {
        0 => builder_baseline,
        1..=5 => 1,
        6..=15 => 2,
        _ => 3,
    };

    let mut upgrader = upgrader_baseline;
    for analysis in &analyses {
        let boosted = if analysis.rcl >= 4 {
            if analysis.storage_energy_ratio > 0.5 || analysis.extension_fill > 0.9 {
                5
            } else if analysis.storage_energy_ratio > 0.3 || analysis.extension_fill > 0.75 {
                4
            } else {
                upgrader_baseline
            }
        } else if analysis.rcl == 3 && analysis.extension_fill > 0.8 {
            4
        } else {
            upgrader_baseline
        };

        upgrader = upgrader.max(boosted);
    }

    targets.insert(Role::Harvester, harvester);
    targets.insert(Role::StationaryHarvester, stationary);
    targets.insert(Role::Hauler, hauler);
    targets.insert(Role::Repairer, repairer);
    targets.insert(Role::Builder, builder);
    targets.insert(Role::Upgrader, upgrader);

    // Overlays from the colony and combat queues.
    let pending_expansions = blackboard
        .colony
        .expansion_queue
        .iter()
        .filter(|e| e.status == QueueStatus::Pending)
        .count() as u32;

    let assigned_claimers = blackboard
        .unit_memory
        .iter()
        .filter(|(name, m)| {
            m.role == Role::Claimer && m.target_room.is_some() && snapshot.units.contains_key(*name)
        })
        .count() as u32;

    targets.insert(Role::Claimer, pending_expansions.saturating_sub(assigned_claimers));

    let pending_attacks = blackboard
        .combat
        .attack_queue
        .iter()
        .filter(|e| matches!(e.status, QueueStatus::Pending | QueueStatus::Active))
        .count() as u32;

    let live_attackers = blackboard.role_counts.get(&Role::Attacker).copied().unwrap_or(0);

    let mut attacker = (2 * pending_attacks).saturating_sub(live_attackers);
    let mut healer = 0;

    let active_integrations = blackboard
        .colony
        .integration_list
        .iter()
        .filter(|e| matches!(e.status, QueueStatus::Pending | QueueStatus::Active))
        .count() as u32;

    targets.insert(Role::RemoteMiner, active_integrations);
    targets.insert(Role::RemoteHauler, active_integrations);
    targets.insert(Role::RemoteUpgrader, active_integrations);
    targets.insert(Role::RemoteBuilder, active_integrations);

    let any_scouting = blackboard
        .colony
        .expansion_queue
        .iter()
        .any(|e| e.status == QueueStatus::Scouting);

    targets.insert(Role::Scout, u32::from(any_scouting));
    targets.insert(Role::Dismantler, 0);

    // Combat override: throttle upgrading, guarantee defenders.
    let worst_posture = analyses
        .iter()
        .map(|a| blackboard.defense.posture_of(&a.name))
        .max_by_key(|p| match p {
            Posture::Normal => 0,
            Posture::Alert => 1,
            Posture::Defensive => 2,
            Posture::Emergency => 3,
        })
        .unwrap_or(Posture::Normal);

    match worst_posture {
        Posture::Emergency => {
            targets.insert(Role::Upgrader, 0);
            attacker = attacker.max(2);
            healer = healer.max(2);
            repairer = repairer.max(1);
        }
        Posture::Defensive => {
            targets.insert(Role::Upgrader, (0.3 * upgrader as f64).floor() as u32);
            attacker = attacker.max(2);
            healer = healer.max(2);
            repairer = repairer.max(1);
        }
        Posture::Alert => {
            targets.insert(Role::Upgrader, ((0.3 * upgrader as f64).floor() as u32).max(1));
        }
        Posture::Normal => {}
    }

    targets.insert(Role::Attacker, attacker);
    targets.insert(Role::Healer, healer);
    targets.insert(Role::Repairer, repairer);

    let order = spawn_priority_order(
        worst_posture,
        pending_attacks > 0,
        pending_expansions > 0,
        any_logistics,
        blackboard.role_counts.get(&Role::Hauler).copied().unwrap_or(0),
    );

    Demand { targets, order }
}

fn spawn_priority_order(
    posture: Posture,
    attack_pending: bool,
    expansion_pending: bool,
    logistics_exist: bool,
    hauler_count: u32,
) -> Vec<Role> {
    let mut order = vec![
        Role::Harvester,
        Role::Upgrader,
        Role::Builder,
        Role::StationaryHarvester,
        Role::Hauler,
        Role::Repairer,
        Role::RemoteMiner,
        Role::RemoteHauler,
        Role::RemoteUpgrader,
        Role::RemoteBuilder,
        Role::Scout,
        Role::Attacker,
        Role::Healer,
        Role::Dismantler,
        Role::Claimer,
    ];

    let hoist = |order: &mut Vec<Role>, role: Role, to: usize| {
        if let Some(pos) = order.iter().position(|r| *r == role) {
            let role = order.remove(pos);
            order.insert(to.min(order.len()), role);
        }
    };

    if posture.is_combat() {
        hoist(&mut order, Role::Attacker, 1);
        hoist(&mut order, Role::Healer, 2);
    }

    // A room with logistics infrastructure but zero haulers starves fast;
    // jump the queue unless the whole colony is in emergency.
    if logistics_exist && hauler_count == 0 && posture != Posture::Emergency {
        hoist(&mut order, Role::Hauler, 1);
    }

    if attack_pending {
        hoist(&mut order, Role::Attacker, 1);
    }

    if expansion_pending {
        hoist(&mut order, Role::Claimer, 1);
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::builder::SnapshotBuilder;

    fn registry() -> RoleRegistry {
        RoleRegistry::new()
    }

    #[test]
    fn container_transition_shifts_demand() {
        // Two container-mined sources at RCL 4: stationary harvesters take
        // over and the harvester count collapses.
        let snapshot = SnapshotBuilder::new(100)
            .room("W1N1", |room| {
                room.owned(4)
                    .energy(300, 800)
                    .source("source-1", 10, 10, 3000)
                    .source("source-2", 40, 40, 3000)
                    .structure("container-1", StructureKind::Container, 11, 10, |s| s)
                    .structure("container-2", StructureKind::Container, 39, 40, |s| s)
            })
            .build();

        let demand = calculate(&snapshot, &Blackboard::new(), &registry());

        assert_eq!(demand.target(Role::StationaryHarvester), 2);
        assert_eq!(demand.target(Role::Hauler), 2);
        assert_eq!(demand.target(Role::Repairer), 1);
        assert!(demand.target(Role::Harvester) <= 2);
    }

    #[test]
    fn bootstrap_room_wants_three_harvesters() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(1).energy(300, 300).source("source-1", 10, 10, 3000))
            .build();

        let demand = calculate(&snapshot, &Blackboard::new(), &registry());

        assert_eq!(demand.target(Role::Harvester), 3);
        assert_eq!(demand.order[0], Role::Harvester);
    }

    #[test]
    fn builder_scales_with_site_count() {
        let mut builder = SnapshotBuilder::new(1);
        builder = builder.room("W1N1", |mut room| {
            room = room.owned(3).energy(300, 800);
            for i in 0..7 {
                room = room.construction_site(&format!("site-{}", i), StructureKind::Road, 10 + i, 10);
            }
            room
        });

        let demand = calculate(&builder.build(), &Blackboard::new(), &registry());

        assert_eq!(demand.target(Role::Builder), 2);
    }

    #[test]
    fn defensive_posture_reprioritizes_combat() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(4).energy(300, 800).source("source-1", 10, 10, 3000))
            .build();

        let mut blackboard = Blackboard::new();
        blackboard
            .defense
            .posture
            .insert("W1N1".to_string(), Posture::Defensive);

        let demand = calculate(&snapshot, &blackboard, &registry());

        // floor(0.3 * 3) = 0 under defensive posture.
        assert_eq!(demand.target(Role::Upgrader), 0);
        assert!(demand.target(Role::Attacker) >= 2);
        assert!(demand.target(Role::Healer) >= 2);
        assert!(demand.target(Role::Repairer) >= 1);
        assert_eq!(&demand.order[..3], &[Role::Harvester, Role::Attacker, Role::Healer]);
    }

    #[test]
    fn alert_posture_keeps_one_upgrader() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(3).energy(300, 800).source("source-1", 10, 10, 3000))
            .build();

        let mut blackboard = Blackboard::new();
        blackboard.defense.posture.insert("W1N1".to_string(), Posture::Alert);

        let demand = calculate(&snapshot, &blackboard, &registry());

        assert_eq!(demand.target(Role::Upgrader), 1);
    }

    #[test]
    fn critical_hauler_jumps_the_queue() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| {
                room.owned(4)
                    .energy(300, 800)
                    .source("source-1", 10, 10, 3000)
                    .structure("storage-1", StructureKind::Storage, 20, 20, |s| s.store(10_000, 1_000_000))
            })
            .build();

        let demand = calculate(&snapshot, &Blackboard::new(), &registry());

        assert_eq!(demand.order[1], Role::Hauler);
    }
}
