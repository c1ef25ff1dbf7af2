//! Movement coordination.
//!
//! Controllers never move units directly; they submit `(unit, goal, range,
//! priority)` requests during execution. After the execution phase the
//! kernel hands the accumulated requests to the pathfinding manager, which
//! resolves steps and traffic in one pass. Hosts with a native pathfinder
//! implement `PathfindingManager` themselves; `grid::GridPathfindingManager`
//! is the default.

pub mod grid;

use crate::tasks::Priority;
use crate::world::{Position, WorldSnapshot};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct MovementRequest {
    pub unit: String,
    pub goal: Position,
    pub range: u32,
    pub priority: Priority,
}

/// Per-tick movement intents keyed by unit. A later request from the same
/// unit replaces the earlier one; units take one step per tick.
#[derive(Default, Debug)]
pub struct MovementRequests {
    requests: HashMap<String, MovementRequest>,
}

impl MovementRequests {
    pub fn request(&mut self, unit: &str, goal: Position, range: u32, priority: Priority) {
        self.requests.insert(
            unit.to_string(),
            MovementRequest {
                unit: unit.to_string(),
                goal,
                range,
                priority,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn get(&self, unit: &str) -> Option<&MovementRequest> {
        self.requests.get(unit)
    }

    /// Requests in deterministic order: priority first, then unit name.
    pub fn drain_ordered(&mut self) -> Vec<MovementRequest> {
        let mut requests: Vec<_> = self.requests.drain().map(|(_, r)| r).collect();

        requests.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.unit.cmp(&b.unit)));

        requests
    }
}

/// External pathfinding manager contract. `run_moves` is invoked once per
/// tick after unit execution so the manager can coordinate swaps and
/// traffic before emitting move intents.
pub trait PathfindingManager {
    /// Whether the manager can resolve moves this tick. When false the
    /// kernel falls back to direct move intents per request.
    fn available(&self) -> bool {
        true
    }

    fn run_moves(&mut self, snapshot: &WorldSnapshot, requests: &mut MovementRequests);

    /// Estimated path length between two positions, used for closest-of
    /// tie-breaks. Defaults to Chebyshev range.
    fn estimate_distance(&self, from: &Position, to: &Position) -> u32 {
        from.range_to(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_request_replaces_earlier() {
        let mut requests = MovementRequests::default();

        requests.request("unit-1", Position::new("W1N1", 10, 10), 1, Priority::Normal);
        requests.request("unit-1", Position::new("W1N1", 20, 20), 0, Priority::High);

        assert_eq!(requests.len(), 1);
        assert_eq!(requests.get("unit-1").unwrap().goal, Position::new("W1N1", 20, 20));
    }

    #[test]
    fn drain_orders_by_priority_then_name() {
        let mut requests = MovementRequests::default();

        requests.request("unit-b", Position::new("W1N1", 1, 1), 0, Priority::Normal);
        requests.request("unit-a", Position::new("W1N1", 2, 2), 0, Priority::Normal);
        requests.request("unit-c", Position::new("W1N1", 3, 3), 0, Priority::Critical);

        let order: Vec<_> = requests.drain_ordered().into_iter().map(|r| r.unit).collect();

        assert_eq!(order, ["unit-c", "unit-a", "unit-b"]);
    }
}
