//! Default movement manager: A* over the open room grid with priority-order
//! cell grants and head-on swap resolution.

use super::{MovementRequests, PathfindingManager};
use crate::constants::{StructureKind, ROOM_SIZE};
use crate::world::{Position, WorldSnapshot};
use log::*;
use pathfinding::prelude::astar;
use std::collections::{HashMap, HashSet};

/// Parse a room name of the form `W12N3`/`E4S5` into world coordinates.
/// West and north are negative.
fn parse_room_name(name: &str) -> Option<(i32, i32)> {
    let mut chars = name.chars().peekable();

    let h = *chars.peek()?;
    if h != 'W' && h != 'E' {
        return None;
    }
    chars.next();

    let mut x_digits = String::new();
    while let Some(c) = chars.peek().filter(|c| c.is_ascii_digit()) {
        x_digits.push(*c);
        chars.next();
    }

    let v = *chars.peek()?;
    if v != 'N' && v != 'S' {
        return None;
    }
    chars.next();

    let y_digits: String = chars.collect();

    let x: i32 = x_digits.parse().ok()?;
    let y: i32 = y_digits.parse().ok()?;

    let x = if h == 'W' { -x - 1 } else { x };
    let y = if v == 'N' { -y - 1 } else { y };

    Some((x, y))
}

fn room_distance(a: &str, b: &str) -> u32 {
    match (parse_room_name(a), parse_room_name(b)) {
        (Some((ax, ay)), Some((bx, by))) => {
            let dx = (ax - bx).unsigned_abs();
            let dy = (ay - by).unsigned_abs();
            dx.max(dy)
        }
        _ => 1,
    }
}

/// The edge-tile goal used when the real goal lies in another room.
fn exit_goal(from: &Position, target_room: &str) -> Position {
    let (fx, fy) = parse_room_name(&from.room).unwrap_or((0, 0));
    let (tx, ty) = parse_room_name(target_room).unwrap_or((0, 0));

    let (x, y) = if tx < fx {
        (0, from.y)
    } else if tx > fx {
        (ROOM_SIZE - 1, from.y)
    } else if ty < fy {
        (from.x, 0)
    } else {
        (from.x, ROOM_SIZE - 1)
    };

    Position::new(from.room.clone(), x, y)
}

pub struct GridPathfindingManager {
    /// Cells statically blocked per room, derived once per tick.
    blocked: HashMap<String, HashSet<(u8, u8)>>,
}

impl GridPathfindingManager {
    pub fn new() -> GridPathfindingManager {
        GridPathfindingManager {
            blocked: HashMap::new(),
        }
    }

    fn rebuild_blocked(&mut self, snapshot: &WorldSnapshot) {
        self.blocked.clear();

        for room in snapshot.rooms.values() {
            let cells: HashSet<(u8, u8)> = room
                .structures
                .iter()
                .filter(|s| {
                    !matches!(
                        s.kind,
                        StructureKind::Road | StructureKind::Container | StructureKind::Rampart | StructureKind::Controller
                    )
                })
                .map(|s| (s.pos.x, s.pos.y))
                .collect();

            self.blocked.insert(room.name.clone(), cells);
        }
    }

    fn is_blocked(&self, pos: &Position) -> bool {
        self.blocked
            .get(&pos.room)
            .map(|cells| cells.contains(&(pos.x, pos.y)))
            .unwrap_or(false)
    }

    fn neighbors(&self, pos: &Position) -> Vec<Position> {
        let mut result = Vec::with_capacity(8);

        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }

                let x = pos.x as i32 + dx;
                let y = pos.y as i32 + dy;

                if !(0..ROOM_SIZE as i32).contains(&x) || !(0..ROOM_SIZE as i32).contains(&y) {
                    continue;
                }

                let candidate = Position::new(pos.room.clone(), x as u8, y as u8);

                if !self.is_blocked(&candidate) {
                    result.push(candidate);
                }
            }
        }

        result
    }

    /// Next step along the A* path from `from` toward `goal`, or None when
    /// no path exists or the unit is already within range.
    fn next_step(&self, from: &Position, goal: &Position, range: u32) -> Option<Position> {
        if from.in_range_to(goal, range) {
            return None;
        }

        let result = astar(
            from,
            |pos| self.neighbors(pos).into_iter().map(|n| (n, 1u32)),
            |pos| pos.range_to(goal),
            |pos| pos.in_range_to(goal, range),
        );

        result.and_then(|(path, _)| path.into_iter().nth(1))
    }
}

impl Default for GridPathfindingManager {
    fn default() -> GridPathfindingManager {
        GridPathfindingManager::new()
    }
}

impl PathfindingManager for GridPathfindingManager {
    fn run_moves(&mut self, snapshot: &WorldSnapshot, requests: &mut MovementRequests) {
        self.rebuild_blocked(snapshot);

        let ordered = requests.drain_ordered();

        // Cells already granted this tick, and the planned step per mover.
        let mut granted: HashSet<Position> = HashSet::new();
        let mut planned: HashMap<String, Position> = HashMap::new();

        // Desired steps per request, priority order.
        let mut desires: Vec<(String, Position)> = Vec::new();

        for request in &ordered {
            let unit = match snapshot.units.get(&request.unit) {
                Some(unit) => unit,
                None => continue,
            };

            let goal = if unit.pos.room == request.goal.room {
                request.goal.clone()
            } else {
                exit_goal(&unit.pos, &request.goal.room)
            };

            let range = if unit.pos.room == request.goal.room { request.range } else { 0 };

            if let Some(step) = self.next_step(&unit.pos, &goal, range) {
                desires.push((request.unit.clone(), step));
            }
        }

        let desired_by_unit: HashMap<&str, &Position> =
            desires.iter().map(|(unit, step)| (unit.as_str(), step)).collect();

        for (unit_name, step) in &desires {
            let unit = &snapshot.units[unit_name];

            if granted.contains(step) {
                trace!("movement: cell {} already granted, {} waits", step, unit_name);
                continue;
            }

            // A cell occupied by a stationary unit blocks, unless the
            // occupant is itself stepping out, or the two units are swapping
            // head-on (the occupant wants our cell).
            let occupant = snapshot
                .units
                .values()
                .find(|other| other.name != *unit_name && other.pos == *step);

            if let Some(occupant) = occupant {
                let occupant_moves_away = desired_by_unit
                    .get(occupant.name.as_str())
                    .map(|next| **next != occupant.pos)
                    .unwrap_or(false);

                let head_on_swap = desired_by_unit
                    .get(occupant.name.as_str())
                    .map(|next| **next == unit.pos)
                    .unwrap_or(false);

                if !occupant_moves_away && !head_on_swap {
                    trace!("movement: {} blocked by {}", unit_name, occupant.name);
                    continue;
                }
            }

            granted.insert(step.clone());
            planned.insert(unit_name.clone(), step.clone());
        }

        for (unit_name, step) in planned {
            snapshot.units[&unit_name].move_step(step);
        }
    }

    fn estimate_distance(&self, from: &Position, to: &Position) -> u32 {
        if from.room == to.room {
            from.range_to(to)
        } else {
            room_distance(&from.room, &to.room) * ROOM_SIZE as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;
    use crate::world::builder::SnapshotBuilder;
    use crate::world::UnitIntent;

    #[test]
    fn parses_room_names() {
        assert_eq!(parse_room_name("W1N1"), Some((-2, -2)));
        assert_eq!(parse_room_name("E0S0"), Some((0, 0)));
        assert_eq!(parse_room_name("nonsense"), None);
    }

    #[test]
    fn steps_toward_goal() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(1))
            .unit("unit-1", |u| u.at("W1N1", 10, 10))
            .build();

        let mut manager = GridPathfindingManager::new();
        let mut requests = MovementRequests::default();
        requests.request("unit-1", Position::new("W1N1", 15, 10), 1, Priority::Normal);

        manager.run_moves(&snapshot, &mut requests);

        let intents = snapshot.intents();
        let intents = intents.borrow();
        let moves: Vec<_> = intents.intents_for("unit-1").collect();

        // Equal-cost diagonals are all optimal; the step must advance x and
        // stay adjacent to the start.
        assert_eq!(moves.len(), 1);
        match moves[0] {
            UnitIntent::Move { to } => {
                assert_eq!(to.x, 11);
                assert!((9..=11).contains(&to.y));
            }
            other => panic!("expected a move intent, got {:?}", other),
        }
    }

    /// Walls on both sides of row 10 force a single-file corridor.
    fn corridor_room(room: crate::world::builder::RoomBuilder) -> crate::world::builder::RoomBuilder {
        let mut room = room.owned(1);

        for x in 6..=16u8 {
            room = room
                .structure(&format!("wall-n-{}", x), StructureKind::Wall, x, 9, |s| s)
                .structure(&format!("wall-s-{}", x), StructureKind::Wall, x, 11, |s| s);
        }

        room
    }

    #[test]
    fn head_on_swap_is_allowed() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", corridor_room)
            .unit("unit-a", |u| u.at("W1N1", 10, 10))
            .unit("unit-b", |u| u.at("W1N1", 11, 10))
            .build();

        let mut manager = GridPathfindingManager::new();
        let mut requests = MovementRequests::default();
        requests.request("unit-a", Position::new("W1N1", 14, 10), 0, Priority::Normal);
        requests.request("unit-b", Position::new("W1N1", 7, 10), 0, Priority::Normal);

        manager.run_moves(&snapshot, &mut requests);

        let intents = snapshot.intents();
        let intents = intents.borrow();

        let a_moves: Vec<_> = intents.intents_for("unit-a").collect();
        let b_moves: Vec<_> = intents.intents_for("unit-b").collect();

        assert_eq!(a_moves, vec![&UnitIntent::Move { to: Position::new("W1N1", 11, 10) }]);
        assert_eq!(b_moves, vec![&UnitIntent::Move { to: Position::new("W1N1", 10, 10) }]);
    }

    #[test]
    fn within_range_means_no_step() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(1))
            .unit("unit-1", |u| u.at("W1N1", 10, 10))
            .build();

        let mut manager = GridPathfindingManager::new();
        let mut requests = MovementRequests::default();
        requests.request("unit-1", Position::new("W1N1", 11, 11), 1, Priority::Normal);

        manager.run_moves(&snapshot, &mut requests);

        let intents = snapshot.intents();
        assert!(intents.borrow().unit_intents.is_empty());
    }
}
