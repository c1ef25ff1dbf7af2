//! Persisted agent state. The only mutable state that survives across ticks.
//!
//! The host owns the blackboard between ticks and may store it however it
//! likes: as JSON via serde, or as a compressed memory segment through
//! `crate::serialize`. Keys are stable; decoding is lenient per subtree so a
//! corrupt region self-heals to defaults instead of poisoning the whole
//! agent.

use crate::demand::Demand;
use crate::machine::PersistedMachine;
use crate::roles::Role;
use crate::tasks::queue::TaskQueues;
use crate::telemetry::TickSummary;
use log::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-unit persisted record. Created at spawn success, mutated only by the
/// owning role controller, deleted by memory repair when the unit is gone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitMemory {
    pub role: Role,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub state_machine: Option<PersistedMachine>,
    #[serde(default)]
    pub home_room: Option<String>,
    #[serde(default)]
    pub target_room: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub squad_id: Option<String>,
    #[serde(default)]
    pub emergency: bool,
}

impl UnitMemory {
    pub fn new(role: Role, version: u32) -> UnitMemory {
        UnitMemory {
            role,
            task: String::new(),
            version,
            state_machine: None,
            home_room: None,
            target_room: None,
            source_id: None,
            container_id: None,
            squad_id: None,
            emergency: false,
        }
    }
}

/// Defensive posture of a room, produced by the external defense subsystem.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    #[default]
    Normal,
    Alert,
    Defensive,
    Emergency,
}

impl Posture {
    pub fn is_combat(self) -> bool {
        matches!(self, Posture::Defensive | Posture::Emergency)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DefenseState {
    #[serde(default)]
    pub posture: HashMap<String, Posture>,
}

impl DefenseState {
    pub fn posture_of(&self, room: &str) -> Posture {
        self.posture.get(room).copied().unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Pending,
    Scouting,
    Active,
    Assigned,
    Complete,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpansionRequest {
    pub target_room: String,
    #[serde(default)]
    pub status: QueueStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackRequest {
    pub target_room: String,
    pub flag: String,
    #[serde(default)]
    pub status: QueueStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegrationEntry {
    pub room: String,
    pub home_room: String,
    #[serde(default)]
    pub status: QueueStatus,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ColonyState {
    #[serde(default)]
    pub expansion_queue: Vec<ExpansionRequest>,
    #[serde(default)]
    pub integration_list: Vec<IntegrationEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CombatState {
    #[serde(default)]
    pub attack_queue: Vec<AttackRequest>,
}

/// Visibility memory written by scouts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoutState {
    #[serde(default)]
    pub visited: HashMap<String, u64>,
}

/// Stuck-spawn detection record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnHealthEntry {
    pub detected_at: u64,
    pub candidate_name: String,
    pub remaining_time: i32,
}

#[derive(Default, Serialize, Deserialize)]
pub struct Blackboard {
    #[serde(default)]
    pub unit_counter: u64,
    #[serde(default)]
    pub unit_memory: HashMap<String, UnitMemory>,
    #[serde(default)]
    pub role_counts: HashMap<Role, u32>,
    #[serde(default, rename = "task_queue")]
    pub task_queues: TaskQueues,
    #[serde(default)]
    pub spawn_health: HashMap<String, SpawnHealthEntry>,
    #[serde(default)]
    pub defense: DefenseState,
    #[serde(default)]
    pub colony: ColonyState,
    #[serde(default)]
    pub combat: CombatState,
    #[serde(default)]
    pub scout: ScoutState,
    #[serde(default)]
    pub last_demand: Option<Demand>,
    #[serde(default)]
    pub telemetry: TickSummary,
    /// Heal warnings from the last decode, drained into the next tick's
    /// telemetry. Never persisted.
    #[serde(skip)]
    pub heal_warnings: Vec<String>,
}

impl Blackboard {
    pub fn new() -> Blackboard {
        Blackboard::default()
    }

    /// Lenient decode. Each top-level subtree deserializes independently; a
    /// wrong-typed subtree is replaced with its default and a warning is
    /// returned so the kernel can record the heal.
    pub fn from_value(value: serde_json::Value) -> (Blackboard, Vec<String>) {
        let mut warnings = Vec::new();

        let mut map = match value {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                warnings.push(format!("blackboard root was {}, reset to defaults", value_kind(&other)));
                serde_json::Map::new()
            }
        };

        let mut blackboard = Blackboard {
            unit_counter: heal_subtree(map.remove("unit_counter"), "unit_counter", &mut warnings),
            unit_memory: heal_subtree(map.remove("unit_memory"), "unit_memory", &mut warnings),
            role_counts: heal_subtree(map.remove("role_counts"), "role_counts", &mut warnings),
            task_queues: heal_subtree(map.remove("task_queue"), "task_queue", &mut warnings),
            spawn_health: heal_subtree(map.remove("spawn_health"), "spawn_health", &mut warnings),
            defense: heal_subtree(map.remove("defense"), "defense", &mut warnings),
            colony: heal_subtree(map.remove("colony"), "colony", &mut warnings),
            combat: heal_subtree(map.remove("combat"), "combat", &mut warnings),
            scout: heal_subtree(map.remove("scout"), "scout", &mut warnings),
            last_demand: heal_subtree(map.remove("last_demand"), "last_demand", &mut warnings),
            telemetry: heal_subtree(map.remove("telemetry"), "telemetry", &mut warnings),
            heal_warnings: Vec::new(),
        };

        blackboard.heal_warnings = warnings.clone();

        (blackboard, warnings)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn heal_subtree<T>(value: Option<serde_json::Value>, key: &str, warnings: &mut Vec<String>) -> T
where
    T: DeserializeOwned + Default,
{
    let value = match value {
        Some(value) => value,
        None => return T::default(),
    };

    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("blackboard subtree '{}' failed to decode: {}", key, err);
            warnings.push(format!("blackboard subtree '{}' reset to defaults", key));
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_empty_to_defaults_without_warnings() {
        let (blackboard, warnings) = Blackboard::from_value(json!({}));

        assert_eq!(blackboard.unit_counter, 0);
        assert!(blackboard.unit_memory.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn heals_corrupt_subtree_and_keeps_the_rest() {
        let (blackboard, warnings) = Blackboard::from_value(json!({
            "unit_counter": 7,
            "unit_memory": "this is not an object",
        }));

        assert_eq!(blackboard.unit_counter, 7);
        assert!(blackboard.unit_memory.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unit_memory"));
    }

    #[test]
    fn round_trips_unit_memory() {
        let mut blackboard = Blackboard::new();
        let mut memory = UnitMemory::new(Role::Harvester, 1);
        memory.task = "harvest".to_string();
        memory.source_id = Some("source-1".to_string());
        blackboard.unit_memory.insert("harvester-5-0".to_string(), memory.clone());

        let (decoded, warnings) = Blackboard::from_value(blackboard.to_value());

        assert!(warnings.is_empty());
        assert_eq!(decoded.unit_memory.get("harvester-5-0"), Some(&memory));
    }

    #[test]
    fn unknown_role_decodes_to_unknown_variant() {
        let (blackboard, warnings) = Blackboard::from_value(json!({
            "unit_memory": {
                "mystery-1-0": { "role": "chrononaut", "version": 1 }
            }
        }));

        assert!(warnings.is_empty());
        assert_eq!(blackboard.unit_memory["mystery-1-0"].role, Role::Unknown);
    }
}
