//! Per-tick telemetry. Written to the blackboard on every run, including
//! every early-abort path, so the host's health probes always see a fresh
//! record.

use crate::roles::Role;
use crate::tasks::queue::QueueStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub energy_available: u32,
    pub energy_capacity: u32,
    pub rcl: u8,
    pub hostiles: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickSummary {
    #[serde(default)]
    pub tick: u64,
    #[serde(default)]
    pub cpu_used: f64,
    #[serde(default)]
    pub cpu_limit: f64,
    #[serde(default)]
    pub bucket: f64,
    #[serde(default)]
    pub processed_units: u32,
    #[serde(default)]
    pub spawned_units: u32,
    #[serde(default)]
    pub tasks_executed: HashMap<String, u32>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub role_counts: HashMap<Role, u32>,
    #[serde(default)]
    pub task_stats: HashMap<Role, QueueStats>,
    #[serde(default)]
    pub spawns: Vec<String>,
    #[serde(default)]
    pub rooms: HashMap<String, RoomSummary>,
    #[serde(default)]
    pub memory_heals: u32,
}

impl TickSummary {
    pub fn record_task(&mut self, task_name: &str) {
        *self.tasks_executed.entry(task_name.to_string()).or_insert(0) += 1;
    }
}
