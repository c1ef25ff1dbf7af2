//! Role controllers: one per behavioral class of unit.
//!
//! Controllers are polymorphic over `{role, config, create_memory,
//! validate_memory, execute}` and dispatched through a registry keyed by the
//! role tag. `execute` chooses and performs exactly one atomic action for
//! the unit this tick and returns a short task name for telemetry; it never
//! mutates the snapshot and touches only the unit's own memory and the
//! role's task queues.

pub mod attacker;
pub mod builder;
pub mod claimer;
pub mod context;
pub mod dismantler;
pub mod harvester;
pub mod hauler;
pub mod healer;
pub mod remote;
pub mod repairer;
pub mod scout;
pub mod staticharvest;
pub mod upgrader;
pub mod utility;

use crate::blackboard::UnitMemory;
use crate::constants::Part;
use crate::machine::{StateMachine, StateTable};
use crate::world::UnitView;
use context::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Harvester,
    Hauler,
    Upgrader,
    Builder,
    Repairer,
    StationaryHarvester,
    RemoteMiner,
    RemoteHauler,
    RemoteUpgrader,
    RemoteBuilder,
    Attacker,
    Healer,
    Dismantler,
    Claimer,
    Scout,
    /// Catch-all for persisted roles this build no longer knows. Units with
    /// this role are warned about once and skipped.
    #[serde(other)]
    Unknown,
}

impl Role {
    /// All spawnable roles, in a stable order.
    pub const ALL: [Role; 15] = [
        Role::Harvester,
        Role::Hauler,
        Role::Upgrader,
        Role::Builder,
        Role::Repairer,
        Role::StationaryHarvester,
        Role::RemoteMiner,
        Role::RemoteHauler,
        Role::RemoteUpgrader,
        Role::RemoteBuilder,
        Role::Attacker,
        Role::Healer,
        Role::Dismantler,
        Role::Claimer,
        Role::Scout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Role::Harvester => "harvester",
            Role::Hauler => "hauler",
            Role::Upgrader => "upgrader",
            Role::Builder => "builder",
            Role::Repairer => "repairer",
            Role::StationaryHarvester => "stationary_harvester",
            Role::RemoteMiner => "remote_miner",
            Role::RemoteHauler => "remote_hauler",
            Role::RemoteUpgrader => "remote_upgrader",
            Role::RemoteBuilder => "remote_builder",
            Role::Attacker => "attacker",
            Role::Healer => "healer",
            Role::Dismantler => "dismantler",
            Role::Claimer => "claimer",
            Role::Scout => "scout",
            Role::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile-time-ish definition of a role's spawn shape and memory schema.
#[derive(Clone, Debug)]
pub struct RoleConfig {
    pub minimum: u32,
    pub base_body: Vec<Part>,
    pub growth_pattern: Vec<Part>,
    pub max_repeats: u32,
    pub memory_schema_version: u32,
}

pub trait RoleController {
    fn role(&self) -> Role;

    fn config(&self) -> &RoleConfig;

    fn state_table(&self) -> &StateTable;

    /// Memory for a freshly spawned unit of this role.
    fn create_memory(&self, home_room: &str) -> UnitMemory {
        let mut memory = UnitMemory::new(self.role(), self.config().memory_schema_version);

        memory.task = "idle".to_string();
        memory.home_room = Some(home_room.to_string());
        memory.state_machine = Some(StateMachine::new(self.state_table()).serialize());

        memory
    }

    /// Reset role-owned task and state fields when the schema version moved;
    /// fields owned by other subsystems are preserved.
    fn validate_memory(&self, memory: &mut UnitMemory) {
        if memory.version != self.config().memory_schema_version {
            memory.version = self.config().memory_schema_version;
            memory.task = "idle".to_string();
            memory.state_machine = Some(StateMachine::new(self.state_table()).serialize());
            memory.source_id = None;
            memory.container_id = None;
        }

        if memory.task.is_empty() {
            memory.task = "idle".to_string();
        }
    }

    /// Restore this unit's machine from memory, or start fresh.
    fn load_machine(&self, memory: &UnitMemory) -> StateMachine {
        match memory.state_machine.as_ref() {
            Some(persisted) => StateMachine::restore(self.state_table(), persisted),
            None => StateMachine::new(self.state_table()),
        }
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String>;
}

/// Dispatch table keyed by role tag.
pub struct RoleRegistry {
    controllers: HashMap<Role, Box<dyn RoleController>>,
}

impl RoleRegistry {
    pub fn new() -> RoleRegistry {
        let mut controllers: HashMap<Role, Box<dyn RoleController>> = HashMap::new();

        let all: Vec<Box<dyn RoleController>> = vec![
            Box::new(harvester::HarvesterController::new()),
            Box::new(hauler::HaulerController::new()),
            Box::new(upgrader::UpgraderController::new()),
            Box::new(builder::BuilderController::new()),
            Box::new(repairer::RepairerController::new()),
            Box::new(staticharvest::StationaryHarvesterController::new()),
            Box::new(remote::RemoteController::miner()),
            Box::new(remote::RemoteController::hauler()),
            Box::new(remote::RemoteController::upgrader()),
            Box::new(remote::RemoteController::builder()),
            Box::new(attacker::AttackerController::new()),
            Box::new(healer::HealerController::new()),
            Box::new(dismantler::DismantlerController::new()),
            Box::new(claimer::ClaimerController::new()),
            Box::new(scout::ScoutController::new()),
        ];

        for controller in all {
            controllers.insert(controller.role(), controller);
        }

        RoleRegistry { controllers }
    }

    pub fn get(&self, role: Role) -> Option<&dyn RoleController> {
        self.controllers.get(&role).map(|c| c.as_ref())
    }

    pub fn config(&self, role: Role) -> Option<&RoleConfig> {
        self.get(role).map(|c| c.config())
    }
}

impl Default for RoleRegistry {
    fn default() -> RoleRegistry {
        RoleRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_spawnable_role() {
        let registry = RoleRegistry::new();

        for role in Role::ALL {
            let controller = registry.get(role).unwrap_or_else(|| panic!("missing controller for {}", role));
            assert_eq!(controller.role(), role);
            assert!(!controller.config().base_body.is_empty());
        }

        assert!(registry.get(Role::Unknown).is_none());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::StationaryHarvester).unwrap(), "\"stationary_harvester\"");

        let role: Role = serde_json::from_str("\"no_such_role\"").unwrap();
        assert_eq!(role, Role::Unknown);
    }

    #[test]
    fn validate_memory_resets_stale_schema() {
        let registry = RoleRegistry::new();
        let controller = registry.get(Role::Harvester).unwrap();

        let mut memory = UnitMemory::new(Role::Harvester, 999);
        memory.task = "deliver".to_string();
        memory.source_id = Some("source-1".to_string());
        memory.home_room = Some("W1N1".to_string());

        controller.validate_memory(&mut memory);

        assert_eq!(memory.version, controller.config().memory_schema_version);
        assert_eq!(memory.task, "idle");
        assert_eq!(memory.source_id, None);
        // Foreign field preserved.
        assert_eq!(memory.home_room.as_deref(), Some("W1N1"));
    }
}
