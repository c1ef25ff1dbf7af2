//! Shared behavior helpers used by the role controllers.
//!
//! Each `*_or_approach` helper performs the action when in range and
//! otherwise queues a movement request; transient action failures are logged
//! at DEBUG and retried next tick.

use super::context::ExecutionContext;
use crate::constants::{range, StructureKind};
use crate::findnearest::{FindNearest, PathHelpers};
use crate::tasks::Priority;
use crate::world::*;
use log::*;

/// Floor below which a spawn counts as hungry regardless of capacity.
pub const SPAWN_REFILL_FLOOR: u32 = 150;

/// The closest hungry spawn structure, if any. A spawn is hungry below
/// `max(150, capacity / 2)`.
pub fn hungry_spawn<'a>(unit: &UnitView, room: &'a RoomView) -> Option<&'a StructureView> {
    room.my_structures()
        .filter(|s| s.kind == StructureKind::Spawn)
        .filter(|s| {
            let store = s.store();
            store.used < SPAWN_REFILL_FLOOR.max(store.capacity / 2)
        })
        .find_nearest(&unit.pos, PathHelpers::same_room)
}

/// Spawn refill pre-emption: a unit carrying energy is forced to deliver to
/// the closest hungry spawn, overriding its current state. Returns the task
/// name when the rule fires.
pub fn spawn_refill_preemption(unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> Option<&'static str> {
    if unit.store.is_empty() {
        return None;
    }

    let target = hungry_spawn(unit, room)?;

    transfer_or_approach(unit, target, ctx, Priority::Critical);

    Some("deliver")
}

pub fn transfer_or_approach(unit: &UnitView, target: &StructureView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.transfer(target, None) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, target.pos.clone(), range::TRANSFER, priority);
        }
        Err(err) => debug!("{}: transfer to {} failed: {}", unit.name, target.id, err),
    }
}

pub fn withdraw_or_approach(unit: &UnitView, target: &StructureView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.withdraw(target, None) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, target.pos.clone(), range::WITHDRAW, priority);
        }
        Err(err) => debug!("{}: withdraw from {} failed: {}", unit.name, target.id, err),
    }
}

pub fn harvest_or_approach(unit: &UnitView, source: &SourceView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.harvest(source) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, source.pos.clone(), range::HARVEST, priority);
        }
        Err(err) => debug!("{}: harvest of {} failed: {}", unit.name, source.id, err),
    }
}

pub fn pickup_or_approach(unit: &UnitView, dropped: &DroppedResourceView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.pickup(dropped) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, dropped.pos.clone(), range::PICKUP, priority);
        }
        Err(err) => debug!("{}: pickup of {} failed: {}", unit.name, dropped.id, err),
    }
}

pub fn build_or_approach(unit: &UnitView, site: &ConstructionSiteView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.build(site) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, site.pos.clone(), range::BUILD, priority);
        }
        Err(err) => debug!("{}: build of {} failed: {}", unit.name, site.id, err),
    }
}

pub fn repair_or_approach(unit: &UnitView, target: &StructureView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.repair(target) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, target.pos.clone(), range::REPAIR, priority);
        }
        Err(err) => debug!("{}: repair of {} failed: {}", unit.name, target.id, err),
    }
}

pub fn upgrade_or_approach(unit: &UnitView, controller: &ControllerView, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    match unit.upgrade(controller) {
        Ok(()) => {}
        Err(ActionError::NotInRange) => {
            ctx.movement.request(&unit.name, controller.pos.clone(), range::UPGRADE, priority);
        }
        Err(err) => debug!("{}: upgrade of {} failed: {}", unit.name, controller.id, err),
    }
}

/// Refill the unit's store: withdraw from storage or a container holding
/// energy, else harvest the closest active source when allowed. Returns the
/// task name describing what was started.
pub fn acquire_energy(unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>, allow_harvest: bool) -> &'static str {
    let stocked = room
        .structures
        .iter()
        .filter(|s| matches!(s.kind, StructureKind::Storage | StructureKind::Container))
        .filter(|s| !s.store().is_empty())
        .find_nearest(&unit.pos, PathHelpers::same_room);

    if let Some(target) = stocked {
        withdraw_or_approach(unit, target, ctx, Priority::Normal);
        return "recharge";
    }

    if allow_harvest {
        if let Some(source) = room
            .sources
            .iter()
            .filter(|s| s.energy > 0)
            .find_nearest(&unit.pos, PathHelpers::same_room)
        {
            harvest_or_approach(unit, source, ctx, Priority::Normal);
            return "recharge";
        }
    }

    "idle"
}

/// Deliver the unit's cargo in the standard order: spawn/extension, then
/// tower, then storage, then container. Returns false when nothing in the
/// room can take energy.
pub fn deposit_cargo(unit: &UnitView, room: &RoomView, ctx: &mut ExecutionContext<'_>) -> bool {
    let spawn_like = room
        .my_structures()
        .filter(|s| matches!(s.kind, StructureKind::Spawn | StructureKind::Extension))
        .filter(|s| s.store().free_capacity() > 0)
        .find_nearest(&unit.pos, PathHelpers::same_room);

    if let Some(target) = spawn_like {
        transfer_or_approach(unit, target, ctx, Priority::High);
        return true;
    }

    let tower = room
        .my_structures()
        .filter(|s| s.kind == StructureKind::Tower && s.store().free_capacity() > 0)
        .find_nearest(&unit.pos, PathHelpers::same_room);

    if let Some(target) = tower {
        transfer_or_approach(unit, target, ctx, Priority::High);
        return true;
    }

    let bulk = room
        .structures
        .iter()
        .filter(|s| matches!(s.kind, StructureKind::Storage | StructureKind::Container))
        .filter(|s| s.store().free_capacity() > 0)
        .find_nearest(&unit.pos, PathHelpers::same_room);

    if let Some(target) = bulk {
        transfer_or_approach(unit, target, ctx, Priority::Normal);
        return true;
    }

    false
}

/// Request travel toward the center of another room.
pub fn travel_to_room(unit: &UnitView, room_name: &str, ctx: &mut ExecutionContext<'_>, priority: Priority) {
    ctx.movement.request(&unit.name, Position::new(room_name, 25, 25), 20, priority);
}
