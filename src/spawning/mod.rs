pub mod body;
pub mod planner;

pub use body::*;
pub use planner::*;
