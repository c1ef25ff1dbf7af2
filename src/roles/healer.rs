//! Healer: keeps the most-injured friendly alive, trailing its squad's
//! attacker when nobody is wounded.

use super::context::ExecutionContext;
use super::{Role, RoleConfig, RoleController};
use crate::blackboard::UnitMemory;
use crate::constants::Part;
use crate::machine::{StateTable, UnitState};
use crate::tasks::Priority;
use crate::world::{ActionError, UnitView};
use log::*;

pub struct HealerController {
    config: RoleConfig,
    table: StateTable,
}

impl HealerController {
    pub fn new() -> HealerController {
        HealerController {
            config: RoleConfig {
                minimum: 0,
                base_body: vec![Part::Heal, Part::Move],
                growth_pattern: vec![Part::Heal, Part::Move],
                max_repeats: 3,
                memory_schema_version: 1,
            },
            table: StateTable::new(UnitState::Support),
        }
    }

    /// Most-injured friendly by hits fraction; name-ordered tie-break keeps
    /// target choice deterministic.
    fn most_injured<'a>(&self, ctx: &ExecutionContext<'a>) -> Option<&'a UnitView> {
        let mut wounded: Vec<&UnitView> = ctx
            .snapshot
            .units
            .values()
            .filter(|u| u.hits < u.hits_max)
            .collect();

        wounded.sort_by(|a, b| {
            let a_frac = a.hits as f64 / a.hits_max.max(1) as f64;
            let b_frac = b.hits as f64 / b.hits_max.max(1) as f64;

            a_frac
                .partial_cmp(&b_frac)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        wounded.first().copied()
    }

    fn squad_leader<'a>(&self, unit: &UnitView, memory: &UnitMemory, ctx: &ExecutionContext<'a>) -> Option<&'a UnitView> {
        let squad_id = memory.squad_id.as_deref()?;

        let leader_name = ctx
            .units_where(|brief| brief.role == Role::Attacker && brief.squad_id.as_deref() == Some(squad_id))
            .into_iter()
            .find(|name| *name != unit.name);

        leader_name.and_then(|name| ctx.snapshot.units.get(name))
    }
}

impl RoleController for HealerController {
    fn role(&self) -> Role {
        Role::Healer
    }

    fn config(&self) -> &RoleConfig {
        &self.config
    }

    fn state_table(&self) -> &StateTable {
        &self.table
    }

    fn execute(&self, unit: &UnitView, memory: &mut UnitMemory, ctx: &mut ExecutionContext<'_>) -> Result<&'static str, String> {
        if let Some(patient) = self.most_injured(ctx) {
            let result = if unit.pos.is_near(&patient.pos) {
                unit.heal(patient)
            } else {
                unit.ranged_heal(patient)
            };

            match result {
                Ok(()) => {}
                Err(ActionError::NotInRange) => {
                    ctx.movement.request(&unit.name, patient.pos.clone(), 1, Priority::High);
                }
                Err(err) => debug!("{}: heal of {} failed: {}", unit.name, patient.name, err),
            }

            memory.task = "heal".to_string();
            return Ok("heal");
        }

        // Nobody wounded; shadow the squad's attacker so healing starts the
        // moment damage lands.
        if let Some(leader) = self.squad_leader(unit, memory, ctx) {
            if !unit.pos.is_near(&leader.pos) {
                ctx.movement.request(&unit.name, leader.pos.clone(), 1, Priority::Normal);
            }

            memory.task = "follow".to_string();
            return Ok("follow");
        }

        memory.task = "hold".to_string();
        Ok("hold")
    }
}
