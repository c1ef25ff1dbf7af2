//! Fluent construction of world snapshots.
//!
//! Hosts adapt their native world representation through this builder; the
//! test suites drive the kernel with it directly.

use super::intents::IntentBuffer;
use super::position::Position;
use super::snapshot::*;
use crate::constants::{Part, StructureKind};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// CPU meter that replays a scripted sequence of readings, repeating the
/// final value once exhausted. Lets tests simulate budget exhaustion at a
/// chosen phase.
pub struct ScriptedCpuMeter {
    values: RefCell<Vec<f64>>,
    index: Cell<usize>,
}

impl ScriptedCpuMeter {
    pub fn new(values: Vec<f64>) -> ScriptedCpuMeter {
        ScriptedCpuMeter {
            values: RefCell::new(values),
            index: Cell::new(0),
        }
    }

    pub fn constant(value: f64) -> ScriptedCpuMeter {
        ScriptedCpuMeter::new(vec![value])
    }
}

impl CpuMeter for ScriptedCpuMeter {
    fn get_used(&self) -> f64 {
        let values = self.values.borrow();

        if values.is_empty() {
            return 0.0;
        }

        let index = self.index.get().min(values.len() - 1);

        if self.index.get() < values.len() - 1 {
            self.index.set(self.index.get() + 1);
        }

        values[index]
    }
}

pub struct StructureBuilder {
    id: String,
    kind: StructureKind,
    pos: Position,
    hits: u32,
    hits_max: u32,
    store: Option<StoreView>,
    my: bool,
    operational: bool,
}

impl StructureBuilder {
    fn new(id: String, kind: StructureKind, pos: Position) -> StructureBuilder {
        let store = match kind {
            StructureKind::Spawn => Some(StoreView::new(300, 300)),
            StructureKind::Extension => Some(StoreView::new(50, 50)),
            StructureKind::Tower => Some(StoreView::new(1000, 1000)),
            StructureKind::Container => Some(StoreView::new(0, 2000)),
            StructureKind::Storage => Some(StoreView::new(0, 1_000_000)),
            StructureKind::Link => Some(StoreView::new(0, 800)),
            _ => None,
        };

        StructureBuilder {
            id,
            kind,
            pos,
            hits: 1000,
            hits_max: 1000,
            store,
            my: true,
            operational: true,
        }
    }

    pub fn hits(mut self, hits: u32, hits_max: u32) -> StructureBuilder {
        self.hits = hits;
        self.hits_max = hits_max;
        self
    }

    pub fn store(mut self, used: u32, capacity: u32) -> StructureBuilder {
        self.store = Some(StoreView::new(used, capacity));
        self
    }

    pub fn not_mine(mut self) -> StructureBuilder {
        self.my = false;
        self
    }

    pub fn inoperative(mut self) -> StructureBuilder {
        self.operational = false;
        self
    }

    fn build(self) -> StructureView {
        StructureView {
            id: self.id,
            kind: self.kind,
            pos: self.pos,
            hits: self.hits,
            hits_max: self.hits_max,
            store: self.store,
            my: self.my,
            operational: self.operational,
        }
    }
}

pub struct RoomBuilder {
    name: String,
    owned: bool,
    controller: Option<ControllerView>,
    energy_available: u32,
    energy_capacity_available: u32,
    sources: Vec<SourceView>,
    structures: Vec<StructureView>,
    construction_sites: Vec<ConstructionSiteView>,
    dropped_resources: Vec<DroppedResourceView>,
    hostiles: Vec<HostileView>,
}

impl RoomBuilder {
    fn new(name: String) -> RoomBuilder {
        RoomBuilder {
            name,
            owned: false,
            controller: None,
            energy_available: 0,
            energy_capacity_available: 0,
            sources: Vec::new(),
            structures: Vec::new(),
            construction_sites: Vec::new(),
            dropped_resources: Vec::new(),
            hostiles: Vec::new(),
        }
    }

    /// Mark the room as player-owned at the given controller level.
    pub fn owned(mut self, rcl: u8) -> RoomBuilder {
        self.owned = true;
        self.controller = Some(ControllerView {
            id: format!("controller-{}", self.name),
            pos: Position::new(self.name.clone(), 25, 40),
            my: true,
            owned: true,
            level: rcl,
        });
        self
    }

    pub fn neutral_controller(mut self) -> RoomBuilder {
        self.controller = Some(ControllerView {
            id: format!("controller-{}", self.name),
            pos: Position::new(self.name.clone(), 25, 40),
            my: false,
            owned: false,
            level: 0,
        });
        self
    }

    pub fn controller_at(mut self, x: u8, y: u8) -> RoomBuilder {
        if let Some(controller) = self.controller.as_mut() {
            controller.pos = Position::new(self.name.clone(), x, y);
        }
        self
    }

    pub fn energy(mut self, available: u32, capacity: u32) -> RoomBuilder {
        self.energy_available = available;
        self.energy_capacity_available = capacity;
        self
    }

    pub fn source(mut self, id: &str, x: u8, y: u8, energy: u32) -> RoomBuilder {
        self.sources.push(SourceView {
            id: id.to_string(),
            pos: Position::new(self.name.clone(), x, y),
            energy,
            energy_capacity: 3000,
        });
        self
    }

    pub fn structure<F>(mut self, id: &str, kind: StructureKind, x: u8, y: u8, configure: F) -> RoomBuilder
    where
        F: FnOnce(StructureBuilder) -> StructureBuilder,
    {
        let builder = StructureBuilder::new(id.to_string(), kind, Position::new(self.name.clone(), x, y));

        self.structures.push(configure(builder).build());
        self
    }

    pub fn construction_site(mut self, id: &str, kind: StructureKind, x: u8, y: u8) -> RoomBuilder {
        self.construction_sites.push(ConstructionSiteView {
            id: id.to_string(),
            kind,
            pos: Position::new(self.name.clone(), x, y),
            progress: 0,
            progress_total: 1000,
        });
        self
    }

    pub fn dropped(mut self, id: &str, x: u8, y: u8, amount: u32) -> RoomBuilder {
        self.dropped_resources.push(DroppedResourceView {
            id: id.to_string(),
            pos: Position::new(self.name.clone(), x, y),
            amount,
        });
        self
    }

    pub fn hostile(mut self, id: &str, x: u8, y: u8, hits: u32, hits_max: u32) -> RoomBuilder {
        self.hostiles.push(HostileView {
            id: id.to_string(),
            pos: Position::new(self.name.clone(), x, y),
            hits,
            hits_max,
            body: vec![Part::Attack, Part::Move],
        });
        self
    }

    fn build(self) -> RoomView {
        RoomView {
            name: self.name,
            owned: self.owned,
            controller: self.controller,
            energy_available: self.energy_available,
            energy_capacity_available: self.energy_capacity_available,
            sources: self.sources,
            structures: self.structures,
            construction_sites: self.construction_sites,
            dropped_resources: self.dropped_resources,
            hostiles: self.hostiles,
        }
    }
}

pub struct UnitBuilder {
    name: String,
    pos: Position,
    body: Vec<Part>,
    store: StoreView,
    hits: u32,
    hits_max: u32,
    ticks_to_live: Option<u32>,
}

impl UnitBuilder {
    fn new(name: String) -> UnitBuilder {
        UnitBuilder {
            name,
            pos: Position::new("W1N1", 25, 25),
            body: vec![Part::Work, Part::Carry, Part::Move],
            store: StoreView::new(0, 50),
            hits: 100,
            hits_max: 100,
            ticks_to_live: Some(1500),
        }
    }

    pub fn at(mut self, room: &str, x: u8, y: u8) -> UnitBuilder {
        self.pos = Position::new(room, x, y);
        self
    }

    pub fn body(mut self, body: Vec<Part>) -> UnitBuilder {
        self.body = body;
        self
    }

    pub fn store(mut self, used: u32, capacity: u32) -> UnitBuilder {
        self.store = StoreView::new(used, capacity);
        self
    }

    pub fn hits(mut self, hits: u32, hits_max: u32) -> UnitBuilder {
        self.hits = hits;
        self.hits_max = hits_max;
        self
    }

    pub fn ticks_to_live(mut self, ttl: u32) -> UnitBuilder {
        self.ticks_to_live = Some(ttl);
        self
    }
}

pub struct SpawnBuilder {
    name: String,
    pos: Position,
    store: StoreView,
    spawning: Option<SpawningState>,
}

impl SpawnBuilder {
    fn new(name: String, room: &str, x: u8, y: u8) -> SpawnBuilder {
        SpawnBuilder {
            name,
            pos: Position::new(room, x, y),
            store: StoreView::new(300, 300),
            spawning: None,
        }
    }

    pub fn store(mut self, used: u32, capacity: u32) -> SpawnBuilder {
        self.store = StoreView::new(used, capacity);
        self
    }

    pub fn spawning(mut self, unit_name: &str, need_time: u32, remaining_time: i32) -> SpawnBuilder {
        self.spawning = Some(SpawningState {
            unit_name: unit_name.to_string(),
            need_time,
            remaining_time,
        });
        self
    }
}

pub struct SnapshotBuilder {
    tick: u64,
    cpu_limit: f64,
    cpu_bucket: f64,
    cpu_meter: Option<Box<dyn CpuMeter>>,
    rooms: Vec<RoomBuilder>,
    units: Vec<UnitBuilder>,
    spawns: Vec<SpawnBuilder>,
}

impl SnapshotBuilder {
    pub fn new(tick: u64) -> SnapshotBuilder {
        SnapshotBuilder {
            tick,
            cpu_limit: 100.0,
            cpu_bucket: 0.0,
            cpu_meter: None,
            rooms: Vec::new(),
            units: Vec::new(),
            spawns: Vec::new(),
        }
    }

    pub fn cpu(mut self, limit: f64, bucket: f64) -> SnapshotBuilder {
        self.cpu_limit = limit;
        self.cpu_bucket = bucket;
        self
    }

    pub fn cpu_meter(mut self, meter: Box<dyn CpuMeter>) -> SnapshotBuilder {
        self.cpu_meter = Some(meter);
        self
    }

    pub fn room<F>(mut self, name: &str, configure: F) -> SnapshotBuilder
    where
        F: FnOnce(RoomBuilder) -> RoomBuilder,
    {
        self.rooms.push(configure(RoomBuilder::new(name.to_string())));
        self
    }

    pub fn unit<F>(mut self, name: &str, configure: F) -> SnapshotBuilder
    where
        F: FnOnce(UnitBuilder) -> UnitBuilder,
    {
        self.units.push(configure(UnitBuilder::new(name.to_string())));
        self
    }

    pub fn spawn<F>(mut self, name: &str, room: &str, x: u8, y: u8, configure: F) -> SnapshotBuilder
    where
        F: FnOnce(SpawnBuilder) -> SpawnBuilder,
    {
        self.spawns.push(configure(SpawnBuilder::new(name.to_string(), room, x, y)));
        self
    }

    pub fn build(self) -> WorldSnapshot {
        let intents = IntentBuffer::new_handle();

        let rooms: HashMap<String, RoomView> = self
            .rooms
            .into_iter()
            .map(|room| {
                let room = room.build();
                (room.name.clone(), room)
            })
            .collect();

        let units: HashMap<String, UnitView> = self
            .units
            .into_iter()
            .map(|unit| {
                let view = UnitView::new(
                    unit.name.clone(),
                    unit.name.clone(),
                    unit.pos,
                    unit.body,
                    unit.store,
                    unit.hits,
                    unit.hits_max,
                    unit.ticks_to_live,
                    intents.clone(),
                );
                (unit.name, view)
            })
            .collect();

        let spawns: HashMap<String, SpawnView> = self
            .spawns
            .into_iter()
            .map(|spawn| {
                let room_energy = rooms.get(&spawn.pos.room).map(|r| r.energy_available).unwrap_or(0);

                let view = SpawnView::new(
                    spawn.name.clone(),
                    spawn.name.clone(),
                    spawn.pos,
                    spawn.store,
                    spawn.spawning,
                    room_energy,
                    intents.clone(),
                );
                (spawn.name, view)
            })
            .collect();

        WorldSnapshot {
            tick: self.tick,
            cpu: CpuView {
                limit: self.cpu_limit,
                bucket: self.cpu_bucket,
                meter: self.cpu_meter.unwrap_or(Box::new(NullCpuMeter)),
            },
            units,
            spawns,
            rooms,
            intents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_meter_repeats_last_value() {
        let meter = ScriptedCpuMeter::new(vec![1.0, 2.0]);

        assert_eq!(meter.get_used(), 1.0);
        assert_eq!(meter.get_used(), 2.0);
        assert_eq!(meter.get_used(), 2.0);
    }

    #[test]
    fn spawn_view_sees_room_energy() {
        let snapshot = SnapshotBuilder::new(1)
            .room("W1N1", |room| room.owned(1).energy(250, 300))
            .spawn("Spawn1", "W1N1", 25, 25, |s| s)
            .build();

        assert_eq!(snapshot.spawns["Spawn1"].room_energy_available, 250);
    }
}
