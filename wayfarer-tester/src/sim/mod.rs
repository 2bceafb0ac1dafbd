//! Simulated grid world the navigation loop is exercised against.
pub mod map;
pub mod world;

pub use map::ParsedMap;
pub use world::{SimLog, SimRules, SimWorld};
