//! Runtime kernel for an autonomous agent playing a persistent real-time
//! strategy simulation.
//!
//! Each tick the host builds a read-mostly [`world::WorldSnapshot`], hands it
//! to [`kernel::TickKernel::run`] together with the persisted
//! [`blackboard::Blackboard`], and afterwards drains the snapshot's intent
//! buffer to apply the agent's actions. Demand calculation, spawn planning,
//! task queues, and the per-unit state machines all run inside the kernel
//! under an incremental CPU budget.

pub mod blackboard;
pub mod constants;
pub mod demand;
pub mod energy;
pub mod findnearest;
pub mod kernel;
pub mod logging;
pub mod machine;
pub mod pathing;
pub mod roles;
pub mod serialize;
pub mod spawning;
pub mod tasks;
pub mod telemetry;
pub mod world;

pub use blackboard::Blackboard;
pub use kernel::{ConstructionManager, KernelConfig, TickKernel};
pub use telemetry::TickSummary;
