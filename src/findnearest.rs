//! Closest-of lookup over iterators of positioned views.
//!
//! Priority decides which class of work a unit takes; among equals the unit
//! picks the nearest candidate by a caller-supplied distance generator
//! (typically the pathfinding manager's estimate).

use crate::world::{HasPosition, Position};

pub trait FindNearest<T: Sized + HasPosition> {
    /// The candidate with the smallest generated distance. `None` from the
    /// generator marks a candidate unreachable. First match wins ties, so
    /// results are deterministic for a stable input order.
    fn find_nearest<F>(self, start_pos: &Position, generator: F) -> Option<T>
    where
        Self: Sized,
        F: Fn(&Position, &T) -> Option<u32>;
}

pub struct PathHelpers;

impl PathHelpers {
    /// Same-room Chebyshev distance; cross-room candidates are unreachable.
    pub fn same_room<T>(start_pos: &Position, pos_object: &T) -> Option<u32>
    where
        T: HasPosition,
    {
        let range = start_pos.range_to(pos_object.pos());

        if range == u32::MAX {
            None
        } else {
            Some(range)
        }
    }
}

impl<I> FindNearest<I::Item> for I
where
    I: Iterator,
    I::Item: HasPosition,
{
    fn find_nearest<F>(self, start_pos: &Position, generator: F) -> Option<I::Item>
    where
        F: Fn(&Position, &I::Item) -> Option<u32>,
    {
        self.filter_map(|pos_object| generator(start_pos, &pos_object).map(|length| (length, pos_object)))
            .min_by_key(|(length, _)| *length)
            .map(|(_, pos_object)| pos_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing {
        pos: Position,
        tag: &'static str,
    }

    impl HasPosition for Thing {
        fn pos(&self) -> &Position {
            &self.pos
        }
    }

    #[test]
    fn picks_the_closest_reachable() {
        let start = Position::new("W1N1", 10, 10);

        let things = vec![
            Thing { pos: Position::new("W1N1", 30, 30), tag: "far" },
            Thing { pos: Position::new("W1N1", 12, 10), tag: "near" },
            Thing { pos: Position::new("W2N1", 10, 10), tag: "elsewhere" },
        ];

        let nearest = things.into_iter().find_nearest(&start, PathHelpers::same_room);

        assert_eq!(nearest.map(|t| t.tag), Some("near"));
    }

    #[test]
    fn empty_input_finds_nothing() {
        let start = Position::new("W1N1", 10, 10);
        let things: Vec<Thing> = Vec::new();

        assert!(things.into_iter().find_nearest(&start, PathHelpers::same_room).is_none());
    }
}
