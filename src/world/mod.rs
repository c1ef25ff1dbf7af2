pub mod builder;
pub mod intents;
pub mod position;
pub mod snapshot;

pub use builder::*;
pub use intents::*;
pub use position::*;
pub use snapshot::*;
