//! Persistent per-role task queues with assignment bookkeeping.
//!
//! Entries are kept sorted ascending by priority; insertion is a binary
//! search on priority only, so equal priorities stay FIFO. Distance
//! tie-breaks happen at execution time via the closest-of lookup.

use super::{Priority, TaskEntry};
use crate::roles::Role;
use crate::world::WorldSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Queue statistics reported through telemetry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: u32,
    pub assigned: u32,
    pub available: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleTaskQueue {
    entries: Vec<TaskEntry>,
}

impl RoleTaskQueue {
    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    /// Idempotent insert by `task_id`. An existing unassigned entry has its
    /// priority and expiration refreshed; an assigned entry only has its
    /// expiration refreshed, never its priority.
    pub fn add_task(&mut self, entry: TaskEntry) {
        if let Some(pos) = self.entries.iter().position(|e| e.task_id == entry.task_id) {
            if self.entries[pos].assigned_unit.is_some() {
                self.entries[pos].expires_at = self.entries[pos].expires_at.max(entry.expires_at);
                return;
            }

            let existing = self.entries.remove(pos);
            let refreshed = TaskEntry {
                expires_at: existing.expires_at.max(entry.expires_at),
                ..entry
            };

            self.insert_sorted(refreshed);
            return;
        }

        self.insert_sorted(entry);
    }

    fn insert_sorted(&mut self, entry: TaskEntry) {
        let pos = self
            .entries
            .binary_search_by(|probe| {
                probe
                    .priority
                    .cmp(&entry.priority)
                    .then(std::cmp::Ordering::Less)
            })
            .unwrap_or_else(|e| e);

        self.entries.insert(pos, entry);
    }

    /// Assign the first available entry to `unit`. Expired entries are
    /// dropped on the way.
    pub fn assign_task(&mut self, unit: &str, tick: u64) -> Option<&TaskEntry> {
        self.cleanup_expired(tick);

        let pos = self.entries.iter().position(|e| e.is_available(tick))?;

        self.entries[pos].assigned_unit = Some(unit.to_string());

        Some(&self.entries[pos])
    }

    /// Assign a specific entry to `unit` if it is still available.
    pub fn assign_specific(&mut self, task_id: &str, unit: &str, tick: u64) -> Option<&TaskEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.task_id == task_id && e.is_available(tick))?;

        self.entries[pos].assigned_unit = Some(unit.to_string());

        Some(&self.entries[pos])
    }

    /// Remove an entry on completion or abandonment. Only the assignee (or
    /// anyone, for an unassigned entry) may remove it.
    pub fn release_task(&mut self, task_id: &str, unit: &str) -> bool {
        let pos = self.entries.iter().position(|e| {
            e.task_id == task_id && e.assigned_unit.as_deref().map(|a| a == unit).unwrap_or(true)
        });

        match pos {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn cleanup_expired(&mut self, tick: u64) {
        self.entries.retain(|e| !e.is_expired(tick));
    }

    fn cleanup_dead_units(&mut self, snapshot: &WorldSnapshot) {
        for entry in &mut self.entries {
            let dead = entry
                .assigned_unit
                .as_ref()
                .map(|unit| !snapshot.units.contains_key(unit))
                .unwrap_or(false);

            if dead {
                entry.assigned_unit = None;
            }
        }
    }

    pub fn stats(&self, tick: u64) -> QueueStats {
        let total = self.entries.len() as u32;
        let assigned = self.entries.iter().filter(|e| e.assigned_unit.is_some()).count() as u32;
        let available = self.entries.iter().filter(|e| e.is_available(tick)).count() as u32;

        QueueStats {
            total,
            assigned,
            available,
        }
    }
}

/// All role queues, persisted under the blackboard's `task_queue` key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskQueues {
    queues: HashMap<Role, RoleTaskQueue>,
}

impl TaskQueues {
    pub fn queue(&self, role: Role) -> Option<&RoleTaskQueue> {
        self.queues.get(&role)
    }

    pub fn queue_mut(&mut self, role: Role) -> &mut RoleTaskQueue {
        self.queues.entry(role).or_default()
    }

    pub fn add_task(&mut self, role: Role, entry: TaskEntry) {
        self.queue_mut(role).add_task(entry);
    }

    pub fn assign_task(&mut self, role: Role, unit: &str, tick: u64) -> Option<TaskEntry> {
        self.queue_mut(role).assign_task(unit, tick).cloned()
    }

    pub fn release_task(&mut self, role: Role, task_id: &str, unit: &str) -> bool {
        self.queue_mut(role).release_task(task_id, unit)
    }

    pub fn get(&self, role: Role, task_id: &str) -> Option<&TaskEntry> {
        self.queues.get(&role).and_then(|q| q.get(task_id))
    }

    /// Release assignments held by units that no longer exist.
    pub fn cleanup_dead_unit_tasks(&mut self, snapshot: &WorldSnapshot) {
        for queue in self.queues.values_mut() {
            queue.cleanup_dead_units(snapshot);
        }
    }

    pub fn cleanup_expired(&mut self, tick: u64) {
        for queue in self.queues.values_mut() {
            queue.cleanup_expired(tick);
        }
    }

    pub fn queue_stats(&self, tick: u64) -> HashMap<Role, QueueStats> {
        self.queues.iter().map(|(role, queue)| (*role, queue.stats(tick))).collect()
    }

    /// Highest-priority available entry for a role, filtered by predicate.
    /// Does not assign; used for peek-style decisions.
    pub fn peek_available<'a, F>(&'a self, role: Role, tick: u64, mut filter: F) -> Option<&'a TaskEntry>
    where
        F: FnMut(&TaskEntry) -> bool,
    {
        self.queues
            .get(&role)?
            .entries()
            .iter()
            .find(|e| e.is_available(tick) && filter(e))
    }
}
