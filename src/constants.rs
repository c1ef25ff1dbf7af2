//! Simulation constants shared by the kernel and the host contract.

use serde::{Deserialize, Serialize};

/// Body part tags a unit can be composed from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Move,
    Work,
    Carry,
    Attack,
    RangedAttack,
    Heal,
    Claim,
    Tough,
}

impl Part {
    pub fn cost(self) -> u32 {
        match self {
            Part::Move => 50,
            Part::Work => 100,
            Part::Carry => 50,
            Part::Attack => 80,
            Part::RangedAttack => 150,
            Part::Heal => 250,
            Part::Claim => 600,
            Part::Tough => 10,
        }
    }
}

pub fn body_cost(body: &[Part]) -> u32 {
    body.iter().map(|p| p.cost()).sum()
}

/// Maximum number of parts in a single unit body.
pub const MAX_BODY_PARTS: usize = 50;

/// Ticks of build time per body part.
pub const SPAWN_TIME_PER_PART: u32 = 3;

/// Energy a source regenerates per tick, amortized.
pub const SOURCE_ENERGY_PER_TICK: u32 = 10;

/// Lifetime of a standard unit in ticks.
pub const UNIT_LIFETIME: u32 = 1500;

/// Amortized energy cost of keeping one standard unit alive.
pub const UNIT_UPKEEP_COST: u32 = 300;

/// Structure classes the kernel distinguishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Spawn,
    Extension,
    Tower,
    Container,
    Storage,
    Link,
    Road,
    Rampart,
    Wall,
    Controller,
    Other,
}

/// Action ranges, in Chebyshev distance.
pub mod range {
    pub const HARVEST: u32 = 1;
    pub const TRANSFER: u32 = 1;
    pub const WITHDRAW: u32 = 1;
    pub const PICKUP: u32 = 1;
    pub const ATTACK: u32 = 1;
    pub const HEAL: u32 = 1;
    pub const DISMANTLE: u32 = 1;
    pub const CLAIM: u32 = 1;
    pub const BUILD: u32 = 3;
    pub const REPAIR: u32 = 3;
    pub const UPGRADE: u32 = 3;
    pub const RANGED_ATTACK: u32 = 3;
    pub const RANGED_HEAL: u32 = 3;
}

/// Width and height of a room grid.
pub const ROOM_SIZE: u8 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_body_costs() {
        assert_eq!(body_cost(&[Part::Work, Part::Carry, Part::Move]), 200);
        assert_eq!(body_cost(&[Part::Work, Part::Move]), 150);
    }
}
