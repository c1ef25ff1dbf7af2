//! Read-mostly world snapshot handed to the kernel each tick.
//!
//! The host builds one of these from its native world representation (see
//! `builder.rs`). Views expose identity and state as plain data plus action
//! verbs that validate locally and enqueue intents for the host to execute
//! at end of tick. The kernel never mutates the snapshot.

use super::intents::*;
use super::position::Position;
use crate::blackboard::UnitMemory;
use crate::constants::{body_cost, range, Part, StructureKind, MAX_BODY_PARTS};
use itertools::Itertools;
use std::collections::HashMap;

/// Host-implemented incremental compute meter.
pub trait CpuMeter {
    fn get_used(&self) -> f64;
}

/// Meter that always reports zero. Useful for hosts without budget pressure.
pub struct NullCpuMeter;

impl CpuMeter for NullCpuMeter {
    fn get_used(&self) -> f64 {
        0.0
    }
}

pub struct CpuView {
    pub limit: f64,
    pub bucket: f64,
    pub meter: Box<dyn CpuMeter>,
}

impl CpuView {
    pub fn get_used(&self) -> f64 {
        self.meter.get_used()
    }
}

pub trait HasPosition {
    fn pos(&self) -> &Position;
}

impl<T: HasPosition> HasPosition for &T {
    fn pos(&self) -> &Position {
        (**self).pos()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreView {
    pub used: u32,
    pub capacity: u32,
}

impl StoreView {
    pub fn new(used: u32, capacity: u32) -> StoreView {
        StoreView { used, capacity }
    }

    pub fn free_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.capacity
    }

    pub fn fill_fraction(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceView {
    pub id: String,
    pub pos: Position,
    pub energy: u32,
    pub energy_capacity: u32,
}

impl HasPosition for SourceView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

#[derive(Clone, Debug)]
pub struct ControllerView {
    pub id: String,
    pub pos: Position,
    pub my: bool,
    pub owned: bool,
    pub level: u8,
}

impl HasPosition for ControllerView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

#[derive(Clone, Debug)]
pub struct StructureView {
    pub id: String,
    pub kind: StructureKind,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    pub store: Option<StoreView>,
    pub my: bool,
    /// Links report operational state; other structures are always true.
    pub operational: bool,
}

impl StructureView {
    pub fn store(&self) -> StoreView {
        self.store.unwrap_or_default()
    }

    pub fn is_damaged(&self) -> bool {
        self.hits < self.hits_max
    }
}

impl HasPosition for StructureView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

#[derive(Clone, Debug)]
pub struct ConstructionSiteView {
    pub id: String,
    pub kind: StructureKind,
    pub pos: Position,
    pub progress: u32,
    pub progress_total: u32,
}

impl HasPosition for ConstructionSiteView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

#[derive(Clone, Debug)]
pub struct DroppedResourceView {
    pub id: String,
    pub pos: Position,
    pub amount: u32,
}

impl HasPosition for DroppedResourceView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

#[derive(Clone, Debug)]
pub struct HostileView {
    pub id: String,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    pub body: Vec<Part>,
}

impl HasPosition for HostileView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

pub struct UnitView {
    pub name: String,
    pub id: String,
    pub pos: Position,
    pub body: Vec<Part>,
    pub store: StoreView,
    pub hits: u32,
    pub hits_max: u32,
    pub ticks_to_live: Option<u32>,
    intents: IntentHandle,
}

impl HasPosition for UnitView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

impl UnitView {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        id: String,
        pos: Position,
        body: Vec<Part>,
        store: StoreView,
        hits: u32,
        hits_max: u32,
        ticks_to_live: Option<u32>,
        intents: IntentHandle,
    ) -> UnitView {
        UnitView {
            name,
            id,
            pos,
            body,
            store,
            hits,
            hits_max,
            ticks_to_live,
            intents,
        }
    }

    pub fn has_part(&self, part: Part) -> bool {
        self.body.contains(&part)
    }

    pub fn room_name(&self) -> &str {
        &self.pos.room
    }

    fn push(&self, intent: UnitIntent) {
        self.intents.borrow_mut().push_unit(&self.name, intent);
    }

    fn require_part(&self, part: Part) -> Result<(), ActionError> {
        if self.has_part(part) {
            Ok(())
        } else {
            Err(ActionError::NoBodyPart)
        }
    }

    fn require_range(&self, target: &Position, max: u32) -> Result<(), ActionError> {
        if self.pos.in_range_to(target, max) {
            Ok(())
        } else {
            Err(ActionError::NotInRange)
        }
    }

    pub fn harvest(&self, source: &SourceView) -> Result<(), ActionError> {
        self.require_part(Part::Work)?;
        self.require_range(&source.pos, range::HARVEST)?;

        if source.energy == 0 {
            return Err(ActionError::NotEnoughResources);
        }

        self.push(UnitIntent::Harvest {
            target_id: source.id.clone(),
        });

        Ok(())
    }

    pub fn transfer(&self, target: &StructureView, amount: Option<u32>) -> Result<(), ActionError> {
        self.require_range(&target.pos, range::TRANSFER)?;

        if self.store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        let target_store = target.store.ok_or(ActionError::InvalidTarget)?;

        if target_store.free_capacity() == 0 {
            return Err(ActionError::Full);
        }

        let amount = amount
            .unwrap_or(self.store.used)
            .min(self.store.used)
            .min(target_store.free_capacity());

        self.push(UnitIntent::Transfer {
            target_id: target.id.clone(),
            amount,
        });

        Ok(())
    }

    pub fn withdraw(&self, target: &StructureView, amount: Option<u32>) -> Result<(), ActionError> {
        self.require_range(&target.pos, range::WITHDRAW)?;

        let target_store = target.store.ok_or(ActionError::InvalidTarget)?;

        if target_store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        if self.store.is_full() {
            return Err(ActionError::Full);
        }

        let amount = amount
            .unwrap_or_else(|| self.store.free_capacity())
            .min(self.store.free_capacity())
            .min(target_store.used);

        self.push(UnitIntent::Withdraw {
            target_id: target.id.clone(),
            amount,
        });

        Ok(())
    }

    pub fn pickup(&self, dropped: &DroppedResourceView) -> Result<(), ActionError> {
        self.require_range(&dropped.pos, range::PICKUP)?;

        if self.store.is_full() {
            return Err(ActionError::Full);
        }

        self.push(UnitIntent::Pickup {
            target_id: dropped.id.clone(),
        });

        Ok(())
    }

    pub fn build(&self, site: &ConstructionSiteView) -> Result<(), ActionError> {
        self.require_part(Part::Work)?;
        self.require_range(&site.pos, range::BUILD)?;

        if self.store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        self.push(UnitIntent::Build {
            site_id: site.id.clone(),
        });

        Ok(())
    }

    pub fn repair(&self, target: &StructureView) -> Result<(), ActionError> {
        self.require_part(Part::Work)?;
        self.require_range(&target.pos, range::REPAIR)?;

        if self.store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        if !target.is_damaged() {
            return Err(ActionError::InvalidTarget);
        }

        self.push(UnitIntent::Repair {
            target_id: target.id.clone(),
        });

        Ok(())
    }

    pub fn upgrade(&self, controller: &ControllerView) -> Result<(), ActionError> {
        self.require_part(Part::Work)?;
        self.require_range(&controller.pos, range::UPGRADE)?;

        if self.store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        self.push(UnitIntent::Upgrade {
            controller_id: controller.id.clone(),
        });

        Ok(())
    }

    pub fn drop_resource(&self, amount: Option<u32>) -> Result<(), ActionError> {
        if self.store.is_empty() {
            return Err(ActionError::NotEnoughResources);
        }

        let amount = amount.unwrap_or(self.store.used).min(self.store.used);

        self.push(UnitIntent::Drop { amount });

        Ok(())
    }

    pub fn attack(&self, target_id: &str, target_pos: &Position) -> Result<(), ActionError> {
        self.require_part(Part::Attack)?;
        self.require_range(target_pos, range::ATTACK)?;

        self.push(UnitIntent::Attack {
            target_id: target_id.to_string(),
        });

        Ok(())
    }

    pub fn ranged_attack(&self, target_id: &str, target_pos: &Position) -> Result<(), ActionError> {
        self.require_part(Part::RangedAttack)?;
        self.require_range(target_pos, range::RANGED_ATTACK)?;

        self.push(UnitIntent::RangedAttack {
            target_id: target_id.to_string(),
        });

        Ok(())
    }

    pub fn heal(&self, target: &UnitView) -> Result<(), ActionError> {
        self.require_part(Part::Heal)?;
        self.require_range(&target.pos, range::HEAL)?;

        self.push(UnitIntent::Heal {
            target_id: target.name.clone(),
        });

        Ok(())
    }

    pub fn ranged_heal(&self, target: &UnitView) -> Result<(), ActionError> {
        self.require_part(Part::Heal)?;
        self.require_range(&target.pos, range::RANGED_HEAL)?;

        self.push(UnitIntent::RangedHeal {
            target_id: target.name.clone(),
        });

        Ok(())
    }

    pub fn dismantle(&self, target: &StructureView) -> Result<(), ActionError> {
        self.require_part(Part::Work)?;
        self.require_range(&target.pos, range::DISMANTLE)?;

        self.push(UnitIntent::Dismantle {
            target_id: target.id.clone(),
        });

        Ok(())
    }

    pub fn claim(&self, controller: &ControllerView) -> Result<(), ActionError> {
        self.require_part(Part::Claim)?;
        self.require_range(&controller.pos, range::CLAIM)?;

        if controller.owned {
            return Err(ActionError::InvalidTarget);
        }

        self.push(UnitIntent::Claim {
            controller_id: controller.id.clone(),
        });

        Ok(())
    }

    /// Direct goal-directed move. Fallback path when no movement manager is
    /// available; otherwise controllers go through the manager.
    pub fn move_to(&self, goal: Position, goal_range: u32) -> Result<(), ActionError> {
        self.require_part(Part::Move)?;

        self.push(UnitIntent::MoveTo { goal, range: goal_range });

        Ok(())
    }

    /// Single-step move, issued by the movement manager after resolution.
    pub(crate) fn move_step(&self, to: Position) {
        self.push(UnitIntent::Move { to });
    }
}

#[derive(Clone, Debug)]
pub struct SpawningState {
    pub unit_name: String,
    pub need_time: u32,
    pub remaining_time: i32,
}

pub struct SpawnView {
    pub id: String,
    pub name: String,
    pub pos: Position,
    pub store: StoreView,
    pub spawning: Option<SpawningState>,
    pub room_energy_available: u32,
    intents: IntentHandle,
}

impl HasPosition for SpawnView {
    fn pos(&self) -> &Position {
        &self.pos
    }
}

impl SpawnView {
    pub(crate) fn new(
        id: String,
        name: String,
        pos: Position,
        store: StoreView,
        spawning: Option<SpawningState>,
        room_energy_available: u32,
        intents: IntentHandle,
    ) -> SpawnView {
        SpawnView {
            id,
            name,
            pos,
            store,
            spawning,
            room_energy_available,
            intents,
        }
    }

    pub fn room_name(&self) -> &str {
        &self.pos.room
    }

    pub fn is_spawning(&self) -> bool {
        self.spawning.is_some()
    }

    pub fn spawn_intent(&self, body: &[Part], unit_name: &str, memory: UnitMemory) -> Result<(), SpawnError> {
        if self.is_spawning() {
            return Err(SpawnError::Busy);
        }

        if body.is_empty() || body.len() > MAX_BODY_PARTS {
            return Err(SpawnError::InvalidBody);
        }

        if body_cost(body) > self.room_energy_available {
            return Err(SpawnError::NotEnoughEnergy);
        }

        self.intents.borrow_mut().spawn_intents.push(SpawnIntent {
            spawn: self.name.clone(),
            body: body.to_vec(),
            unit_name: unit_name.to_string(),
            memory,
        });

        Ok(())
    }
}

pub struct RoomView {
    pub name: String,
    pub owned: bool,
    pub controller: Option<ControllerView>,
    pub energy_available: u32,
    pub energy_capacity_available: u32,
    pub sources: Vec<SourceView>,
    pub structures: Vec<StructureView>,
    pub construction_sites: Vec<ConstructionSiteView>,
    pub dropped_resources: Vec<DroppedResourceView>,
    pub hostiles: Vec<HostileView>,
}

impl RoomView {
    pub fn rcl(&self) -> u8 {
        self.controller.as_ref().map(|c| c.level).unwrap_or(0)
    }

    pub fn structures_of(&self, kind: StructureKind) -> impl Iterator<Item = &StructureView> {
        self.structures.iter().filter(move |s| s.kind == kind)
    }

    pub fn my_structures(&self) -> impl Iterator<Item = &StructureView> {
        self.structures.iter().filter(|s| s.my)
    }

    pub fn storage(&self) -> Option<&StructureView> {
        self.structures_of(StructureKind::Storage).next()
    }

    pub fn has_towers(&self) -> bool {
        self.structures_of(StructureKind::Tower).any(|s| s.my)
    }

    pub fn find_structure(&self, id: &str) -> Option<&StructureView> {
        self.structures.iter().find(|s| s.id == id)
    }

    pub fn find_source(&self, id: &str) -> Option<&SourceView> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn find_site(&self, id: &str) -> Option<&ConstructionSiteView> {
        self.construction_sites.iter().find(|s| s.id == id)
    }

    pub fn find_dropped(&self, id: &str) -> Option<&DroppedResourceView> {
        self.dropped_resources.iter().find(|d| d.id == id)
    }

    /// Sources that have a container within the given range.
    pub fn sources_with_container(&self, search_range: u32) -> impl Iterator<Item = (&SourceView, &StructureView)> {
        self.sources.iter().filter_map(move |source| {
            self.structures_of(StructureKind::Container)
                .find(|c| c.pos.in_range_to(&source.pos, search_range))
                .map(|container| (source, container))
        })
    }
}

pub struct WorldSnapshot {
    pub tick: u64,
    pub cpu: CpuView,
    pub units: HashMap<String, UnitView>,
    pub spawns: HashMap<String, SpawnView>,
    pub rooms: HashMap<String, RoomView>,
    pub(crate) intents: IntentHandle,
}

impl WorldSnapshot {
    /// Handle to the intent buffer the host drains after the tick.
    pub fn intents(&self) -> IntentHandle {
        self.intents.clone()
    }

    pub fn owned_rooms(&self) -> impl Iterator<Item = &RoomView> {
        self.rooms
            .values()
            .filter(|r| r.owned)
            .sorted_by(|a, b| a.name.cmp(&b.name))
    }

    /// Unit names in deterministic iteration order.
    pub fn sorted_unit_names(&self) -> Vec<String> {
        self.units.keys().cloned().sorted().collect()
    }

    pub fn room(&self, name: &str) -> Option<&RoomView> {
        self.rooms.get(name)
    }

    /// Spawns located in the given room, sorted by name.
    pub fn spawns_in_room<'a>(&'a self, room: &'a str) -> Vec<&'a SpawnView> {
        self.spawns
            .values()
            .filter(|s| s.room_name() == room)
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::builder::SnapshotBuilder;

    fn snapshot_with_unit(body: Vec<Part>, store: (u32, u32), at: (u8, u8)) -> WorldSnapshot {
        SnapshotBuilder::new(1)
            .room("W1N1", |room| {
                room.owned(2)
                    .energy(300, 300)
                    .source("source-1", 10, 10, 3000)
                    .structure("container-1", StructureKind::Container, 20, 20, |s| s.store(2000, 2000))
            })
            .unit("unit-1", |u| u.at("W1N1", at.0, at.1).body(body).store(store.0, store.1))
            .build()
    }

    #[test]
    fn transfer_validates_range_and_capacity() {
        let snapshot = snapshot_with_unit(vec![Part::Carry, Part::Move], (50, 50), (5, 5));
        let unit = &snapshot.units["unit-1"];
        let room = snapshot.room("W1N1").unwrap();
        let container = room.find_structure("container-1").unwrap();

        assert_eq!(unit.transfer(container, None), Err(ActionError::NotInRange));

        let snapshot = snapshot_with_unit(vec![Part::Carry, Part::Move], (50, 50), (20, 21));
        let unit = &snapshot.units["unit-1"];
        let room = snapshot.room("W1N1").unwrap();
        let container = room.find_structure("container-1").unwrap();

        // Adjacent, but the container is already full.
        assert_eq!(unit.transfer(container, None), Err(ActionError::Full));
        assert!(snapshot.intents().borrow().unit_intents.is_empty());
    }

    #[test]
    fn harvest_requires_a_work_part() {
        let snapshot = snapshot_with_unit(vec![Part::Carry, Part::Move], (0, 50), (11, 10));
        let unit = &snapshot.units["unit-1"];
        let source = snapshot.room("W1N1").unwrap().find_source("source-1").unwrap();

        assert_eq!(unit.harvest(source), Err(ActionError::NoBodyPart));
    }

    #[test]
    fn ranged_attack_reaches_three_cells() {
        let snapshot = snapshot_with_unit(vec![Part::RangedAttack, Part::Move], (0, 0), (10, 10));
        let unit = &snapshot.units["unit-1"];

        let near = Position::new("W1N1", 13, 10);
        let far = Position::new("W1N1", 14, 10);

        assert_eq!(unit.ranged_attack("hostile-1", &far), Err(ActionError::NotInRange));
        assert_eq!(unit.ranged_attack("hostile-1", &near), Ok(()));
        assert_eq!(unit.attack("hostile-1", &near), Err(ActionError::NoBodyPart));

        let intents = snapshot.intents();
        let intents = intents.borrow();
        assert_eq!(intents.unit_intents.len(), 1);
    }

    #[test]
    fn spawn_intent_rejects_busy_and_underfunded() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(1).energy(100, 300))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s)
            .spawn("Spawn2", "W1N1", 27, 25, |s| s.spawning("harvester-1-0", 9, 3))
            .build();

        let body = [Part::Work, Part::Carry, Part::Move];
        let memory = UnitMemory::new(crate::roles::Role::Harvester, 1);

        assert_eq!(
            snapshot.spawns["Spawn1"].spawn_intent(&body, "harvester-1-1", memory.clone()),
            Err(SpawnError::NotEnoughEnergy)
        );
        assert_eq!(
            snapshot.spawns["Spawn2"].spawn_intent(&body, "harvester-1-1", memory),
            Err(SpawnError::Busy)
        );
        assert!(snapshot.intents().borrow().spawn_intents.is_empty());
    }
}
