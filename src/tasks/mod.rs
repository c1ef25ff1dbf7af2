pub mod discovery;
pub mod queue;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Task priority with a stable total order. Persisted as its numeric value;
/// lower numbers sort first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl Priority {
    pub fn from_value(value: u8) -> Option<Priority> {
        match value {
            1 => Some(Priority::Critical),
            2 => Some(Priority::High),
            3 => Some(Priority::Normal),
            4 => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
        let value = u8::deserialize(deserializer)?;

        Priority::from_value(value).ok_or_else(|| D::Error::custom(format!("priority out of range: {}", value)))
    }
}

/// The class of work a task entry represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Harvest,
    Build,
    Repair,
    Pickup,
    WithdrawContainer,
    RefillSpawn,
    RefillTower,
    StoreEnergy,
    Upgrade,
    StaticHarvest,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Harvest => "harvest",
            TaskKind::Build => "build",
            TaskKind::Repair => "repair",
            TaskKind::Pickup => "pickup",
            TaskKind::WithdrawContainer => "withdraw_container",
            TaskKind::RefillSpawn => "refill_spawn",
            TaskKind::RefillTower => "refill_tower",
            TaskKind::StoreEnergy => "store_energy",
            TaskKind::Upgrade => "upgrade",
            TaskKind::StaticHarvest => "static_harvest",
        }
    }
}

/// A unit of assignable work. `task_id` is deterministic from
/// `(room, kind, target)` so repeated discovery is idempotent; it never
/// embeds volatile data such as positions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task_id: String,
    pub kind: TaskKind,
    pub target_id: String,
    pub room_name: String,
    pub priority: Priority,
    pub expires_at: u64,
    #[serde(default)]
    pub assigned_unit: Option<String>,
}

impl TaskEntry {
    pub fn new(
        kind: TaskKind,
        target_id: impl Into<String>,
        room_name: impl Into<String>,
        priority: Priority,
        expires_at: u64,
    ) -> TaskEntry {
        let target_id = target_id.into();
        let room_name = room_name.into();

        TaskEntry {
            task_id: task_id(&room_name, kind, &target_id),
            kind,
            target_id,
            room_name,
            priority,
            expires_at,
            assigned_unit: None,
        }
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        self.expires_at <= tick
    }

    pub fn is_available(&self, tick: u64) -> bool {
        self.assigned_unit.is_none() && !self.is_expired(tick)
    }
}

pub fn task_id(room: &str, kind: TaskKind, target_id: &str) -> String {
    format!("{}-{}-{}", room, kind.as_str(), target_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_critical_first() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[test]
    fn priority_serializes_as_number() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "2");

        let back: Priority = serde_json::from_str("4").unwrap();
        assert_eq!(back, Priority::Low);

        assert!(serde_json::from_str::<Priority>("9").is_err());
    }

    #[test]
    fn task_id_is_deterministic() {
        let a = TaskEntry::new(TaskKind::Build, "site-1", "W1N1", Priority::Critical, 100);
        let b = TaskEntry::new(TaskKind::Build, "site-1", "W1N1", Priority::Low, 400);

        assert_eq!(a.task_id, b.task_id);
        assert_eq!(a.task_id, "W1N1-build-site-1");
    }
}
