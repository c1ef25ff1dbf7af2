//! Body composition: grow a role's base body by its growth pattern until
//! the energy budget, the part ceiling, or the repeat cap stops it.

use crate::constants::{body_cost, Part, MAX_BODY_PARTS};
use crate::roles::RoleConfig;

/// Smallest useful bodies, used when no role config applies or the budget
/// cannot cover the role's base body.
pub fn emergency_body(energy: u32) -> Vec<Part> {
    if energy >= 200 {
        vec![Part::Work, Part::Carry, Part::Move]
    } else if energy >= 150 {
        vec![Part::Work, Part::Move]
    } else {
        Vec::new()
    }
}

pub fn compose(config: &RoleConfig, budget: u32) -> Vec<Part> {
    let mut body = config.base_body.clone();

    if body.is_empty() || body_cost(&body) > budget {
        return emergency_body(budget);
    }

    if config.growth_pattern.is_empty() {
        return body;
    }

    let pattern_cost = body_cost(&config.growth_pattern);

    for _ in 0..config.max_repeats {
        let grown_cost = body_cost(&body) + pattern_cost;
        let grown_len = body.len() + config.growth_pattern.len();

        if grown_cost > budget || grown_len > MAX_BODY_PARTS {
            break;
        }

        body.extend_from_slice(&config.growth_pattern);
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: Vec<Part>, growth: Vec<Part>, max_repeats: u32) -> RoleConfig {
        RoleConfig {
            minimum: 0,
            base_body: base,
            growth_pattern: growth,
            max_repeats,
            memory_schema_version: 1,
        }
    }

    #[test]
    fn emergency_bodies_by_budget() {
        assert_eq!(emergency_body(300), vec![Part::Work, Part::Carry, Part::Move]);
        assert_eq!(emergency_body(199), vec![Part::Work, Part::Move]);
        assert!(emergency_body(149).is_empty());
    }

    #[test]
    fn grows_until_budget() {
        let config = config(
            vec![Part::Work, Part::Carry, Part::Move],
            vec![Part::Work, Part::Carry, Part::Move],
            4,
        );

        // 300 covers the base (200) but not base + one repeat (400).
        assert_eq!(compose(&config, 300).len(), 3);

        // 800 covers base + three repeats (800).
        assert_eq!(compose(&config, 800).len(), 12);
    }

    #[test]
    fn growth_respects_repeat_cap() {
        let config = config(vec![Part::Work, Part::Move], vec![Part::Move], 2);

        // Budget would allow many MOVE parts; the cap stops at two repeats.
        assert_eq!(compose(&config, 5000).len(), 4);
    }

    #[test]
    fn growth_respects_part_ceiling() {
        let config = config(vec![Part::Move], vec![Part::Move], 100);

        assert_eq!(compose(&config, 100_000).len(), MAX_BODY_PARTS);
    }

    #[test]
    fn unaffordable_base_falls_back_to_emergency() {
        let config = config(vec![Part::Heal, Part::Heal, Part::Move], vec![], 0);

        // 300-cost base against a 250 budget: emergency worker instead.
        assert_eq!(compose(&config, 250), vec![Part::Work, Part::Carry, Part::Move]);
    }
}
