//! The tick kernel: executes one simulation tick under an incremental CPU
//! budget.
//!
//! Phase order is fixed: memory repair, respawn check, construction, demand,
//! spawn planning, queue cleanup, task discovery, per-unit execution,
//! movement resolution, telemetry. A CPU checkpoint guards the expensive
//! phases; telemetry is written on every path out, and no failure escapes
//! `run`.

use crate::blackboard::Blackboard;
use crate::demand::{self, Demand};
use crate::pathing::grid::GridPathfindingManager;
use crate::pathing::{MovementRequests, PathfindingManager};
use crate::roles::context::{ExecutionContext, UnitBrief};
use crate::roles::{Role, RoleRegistry};
use crate::spawning::planner;
use crate::tasks::discovery::{self, DiscoveryTuning};
use crate::telemetry::{RoomSummary, TickSummary};
use crate::world::WorldSnapshot;
use log::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Fraction of the CPU limit that trips the inter-phase checkpoints.
    pub safety_margin: f64,
    /// Per-unit CPU delta above which a warning is recorded.
    pub max_cpu_per_unit: f64,
    /// Towers below this stored energy are refilled ahead of routine topoffs.
    pub tower_min_capacity: u32,
    pub discovery: DiscoveryTuning,
}

impl Default for KernelConfig {
    fn default() -> KernelConfig {
        KernelConfig {
            safety_margin: 0.85,
            max_cpu_per_unit: 1.5,
            tower_min_capacity: 500,
            discovery: DiscoveryTuning::default(),
        }
    }
}

/// External construction manager contract. Invoked once per tick; must be
/// safe to call repeatedly with the same input.
pub trait ConstructionManager {
    fn plan_sites(&mut self, snapshot: &WorldSnapshot, blackboard: &Blackboard) -> Vec<crate::world::ConstructionIntent>;
}

/// Default construction manager: plans nothing.
pub struct NullConstructionManager;

impl ConstructionManager for NullConstructionManager {
    fn plan_sites(&mut self, _snapshot: &WorldSnapshot, _blackboard: &Blackboard) -> Vec<crate::world::ConstructionIntent> {
        Vec::new()
    }
}

pub struct TickKernel {
    config: KernelConfig,
    registry: RoleRegistry,
    construction: Box<dyn ConstructionManager>,
    pathfinding: Box<dyn PathfindingManager>,
}

impl TickKernel {
    pub fn new() -> TickKernel {
        TickKernel::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> TickKernel {
        TickKernel {
            config,
            registry: RoleRegistry::new(),
            construction: Box::new(NullConstructionManager),
            pathfinding: Box::new(GridPathfindingManager::new()),
        }
    }

    pub fn construction_manager(mut self, manager: Box<dyn ConstructionManager>) -> TickKernel {
        self.construction = manager;
        self
    }

    pub fn pathfinding_manager(mut self, manager: Box<dyn PathfindingManager>) -> TickKernel {
        self.pathfinding = manager;
        self
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// Execute one tick. The blackboard is updated in place; the returned
    /// summary is also written to `blackboard.telemetry`.
    pub fn run(&mut self, snapshot: &WorldSnapshot, blackboard: &mut Blackboard) -> TickSummary {
        let mut summary = TickSummary {
            tick: snapshot.tick,
            cpu_limit: snapshot.cpu.limit,
            bucket: snapshot.cpu.bucket,
            ..TickSummary::default()
        };

        let threshold = snapshot.cpu.limit * self.config.safety_margin;

        // Subtree heals recorded at decode time surface through this tick's
        // telemetry.
        summary.warnings.append(&mut blackboard.heal_warnings);

        // Phase: memory repair. Always runs.
        self.repair_memory(snapshot, blackboard);
        summary.role_counts = blackboard.role_counts.clone();

        // Phase: respawn / empty-world check.
        if snapshot.units.is_empty() && snapshot.spawns.is_empty() {
            summary.warnings.push("no units and no spawns; waiting for respawn".to_string());
            self.write_telemetry(snapshot, blackboard, &mut summary);
            return summary;
        }

        if self.over_budget(snapshot, threshold, "memory operations", &mut summary) {
            self.write_telemetry(snapshot, blackboard, &mut summary);
            return summary;
        }

        // Phase: construction requests, relayed to the host verbatim.
        let construction_intents = self.construction.plan_sites(snapshot, blackboard);
        if !construction_intents.is_empty() {
            let handle = snapshot.intents();
            handle.borrow_mut().construction_intents.extend(construction_intents);
        }

        // Phase: demand. On budget overrun this phase alone is skipped and
        // spawn planning works from the demand cached last tick.
        let demand: Demand = if self.over_budget(snapshot, threshold, "construction", &mut summary) {
            blackboard.last_demand.clone().unwrap_or_default()
        } else {
            let demand = demand::calculate(snapshot, blackboard, &self.registry);
            blackboard.last_demand = Some(demand.clone());
            demand
        };

        // Phase: spawn planning and spawn health.
        let outcome = planner::plan_spawns(snapshot, blackboard, &demand, &self.registry);
        summary.spawned_units = outcome.spawned.len() as u32;
        summary.spawns = outcome.spawned;
        summary.warnings.extend(outcome.warnings);
        summary.warnings.extend(planner::check_spawn_health(snapshot, blackboard));

        if self.over_budget(snapshot, threshold, "spawn planning", &mut summary) {
            self.write_telemetry(snapshot, blackboard, &mut summary);
            return summary;
        }

        // Phase: queue cleanup.
        blackboard.task_queues.cleanup_dead_unit_tasks(snapshot);
        blackboard.task_queues.cleanup_expired(snapshot.tick);

        // Phase: task discovery over owned rooms.
        for room in snapshot.owned_rooms() {
            discovery::discover_room_tasks(room, snapshot.tick, &self.config.discovery, &mut blackboard.task_queues);
        }

        // Phase: per-unit execution.
        let mut movement = MovementRequests::default();
        self.execute_units(snapshot, blackboard, &mut movement, threshold, &mut summary);

        // Phase: movement resolution.
        if self.pathfinding.available() {
            self.pathfinding.run_moves(snapshot, &mut movement);
        } else {
            // Manager unavailable; degrade to direct move intents.
            for request in movement.drain_ordered() {
                if let Some(unit) = snapshot.units.get(&request.unit) {
                    if let Err(err) = unit.move_to(request.goal, request.range) {
                        debug!("{}: fallback move failed: {}", request.unit, err);
                    }
                }
            }
        }

        // Phase: telemetry. Mandatory on every path.
        self.write_telemetry(snapshot, blackboard, &mut summary);

        summary
    }

    fn over_budget(&self, snapshot: &WorldSnapshot, threshold: f64, phase: &str, summary: &mut TickSummary) -> bool {
        let used = snapshot.cpu.get_used();

        if used > threshold {
            let warning = format!("CPU threshold exceeded after {}", phase);
            warn!("{} ({:.1} > {:.1})", warning, used, threshold);
            summary.warnings.push(warning);
            true
        } else {
            false
        }
    }

    /// Reconcile unit memory with the snapshot: drop records for vanished
    /// units (keeping in-flight spawn candidates) and refresh role counts.
    fn repair_memory(&self, snapshot: &WorldSnapshot, blackboard: &mut Blackboard) {
        let spawning_candidates: Vec<String> = snapshot
            .spawns
            .values()
            .filter_map(|s| s.spawning.as_ref())
            .map(|s| s.unit_name.clone())
            .collect();

        blackboard.unit_memory.retain(|name, _| {
            let keep = snapshot.units.contains_key(name) || spawning_candidates.iter().any(|c| c == name);

            if !keep {
                debug!("cleaning up memory of dead unit {}", name);
            }

            keep
        });

        let mut counts: HashMap<Role, u32> = HashMap::new();

        for name in snapshot.units.keys() {
            if let Some(memory) = blackboard.unit_memory.get(name) {
                *counts.entry(memory.role).or_insert(0) += 1;
            }
        }

        blackboard.role_counts = counts;
    }

    fn execute_units(
        &self,
        snapshot: &WorldSnapshot,
        blackboard: &mut Blackboard,
        movement: &mut MovementRequests,
        threshold: f64,
        summary: &mut TickSummary,
    ) {
        let briefs: HashMap<String, UnitBrief> = blackboard
            .unit_memory
            .iter()
            .map(|(name, memory)| {
                (
                    name.clone(),
                    UnitBrief {
                        role: memory.role,
                        squad_id: memory.squad_id.clone(),
                        target_room: memory.target_room.clone(),
                    },
                )
            })
            .collect();

        for name in snapshot.sorted_unit_names() {
            if snapshot.cpu.get_used() > threshold {
                let warning = "CPU threshold exceeded during unit execution".to_string();
                warn!("{}; skipping remaining units", warning);
                summary.warnings.push(warning);
                break;
            }

            let unit = &snapshot.units[&name];

            let mut memory = match blackboard.unit_memory.remove(&name) {
                Some(memory) => memory,
                None => {
                    // Host-injected unit with no memory; nothing to drive.
                    continue;
                }
            };

            let controller = match self.registry.get(memory.role) {
                Some(controller) => controller,
                None => {
                    if memory.task != "unknown_role" {
                        summary
                            .warnings
                            .push(format!("unit {} has unknown role '{}'", name, memory.role));
                        memory.task = "unknown_role".to_string();
                    }

                    summary.processed_units += 1;
                    blackboard.unit_memory.insert(name, memory);
                    continue;
                }
            };

            controller.validate_memory(&mut memory);

            let cpu_before = snapshot.cpu.get_used();

            let mut ctx = ExecutionContext {
                snapshot,
                queues: &mut blackboard.task_queues,
                movement,
                defense: &blackboard.defense,
                colony: &blackboard.colony,
                combat: &blackboard.combat,
                scout: &mut blackboard.scout,
                units_brief: &briefs,
                tower_min_capacity: self.config.tower_min_capacity,
                tick: snapshot.tick,
            };

            match controller.execute(unit, &mut memory, &mut ctx) {
                Ok(task_name) => {
                    summary.record_task(task_name);
                }
                Err(err) => {
                    summary
                        .warnings
                        .push(format!("unit {} ({}) execute failed: {}", name, memory.role, err));
                }
            }

            summary.processed_units += 1;

            let delta = snapshot.cpu.get_used() - cpu_before;
            if delta > self.config.max_cpu_per_unit {
                let warning = format!("unit {} used {:.2} cpu (limit {:.2})", name, delta, self.config.max_cpu_per_unit);
                warn!("{}", warning);
                summary.warnings.push(warning);
            }

            blackboard.unit_memory.insert(name, memory);
        }
    }

    fn write_telemetry(&self, snapshot: &WorldSnapshot, blackboard: &mut Blackboard, summary: &mut TickSummary) {
        summary.cpu_used = snapshot.cpu.get_used();
        summary.task_stats = blackboard.task_queues.queue_stats(snapshot.tick);

        if summary.role_counts.is_empty() {
            summary.role_counts = blackboard.role_counts.clone();
        }

        summary.rooms = snapshot
            .owned_rooms()
            .map(|room| {
                (
                    room.name.clone(),
                    RoomSummary {
                        energy_available: room.energy_available,
                        energy_capacity: room.energy_capacity_available,
                        rcl: room.rcl(),
                        hostiles: room.hostiles.len() as u32,
                    },
                )
            })
            .collect();

        summary.memory_heals = summary
            .warnings
            .iter()
            .filter(|w| w.contains("reset to defaults"))
            .count() as u32;

        blackboard.telemetry = summary.clone();
    }
}

impl Default for TickKernel {
    fn default() -> TickKernel {
        TickKernel::new()
    }
}
