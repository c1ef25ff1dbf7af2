use serde::{Deserialize, Serialize};

/// A grid position inside a named room. Rooms are 50x50; range math is
/// Chebyshev, matching the simulation's adjacency rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub room: String,
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(room: impl Into<String>, x: u8, y: u8) -> Position {
        Position { room: room.into(), x, y }
    }

    /// Chebyshev distance to another position in the same room. Positions in
    /// different rooms are treated as out of any action range.
    pub fn range_to(&self, other: &Position) -> u32 {
        if self.room != other.room {
            return u32::MAX;
        }

        let dx = (self.x as i32 - other.x as i32).unsigned_abs();
        let dy = (self.y as i32 - other.y as i32).unsigned_abs();

        dx.max(dy)
    }

    pub fn in_range_to(&self, other: &Position, range: u32) -> bool {
        self.range_to(other) <= range
    }

    pub fn is_near(&self, other: &Position) -> bool {
        self.in_range_to(other, 1)
    }

}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{},{}", self.room, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_range() {
        let a = Position::new("W1N1", 10, 10);
        let b = Position::new("W1N1", 13, 11);

        assert_eq!(a.range_to(&b), 3);
        assert!(a.in_range_to(&b, 3));
        assert!(!a.is_near(&b));
    }

    #[test]
    fn cross_room_is_out_of_range() {
        let a = Position::new("W1N1", 10, 10);
        let b = Position::new("W2N1", 10, 10);

        assert_eq!(a.range_to(&b), u32::MAX);
    }

}
