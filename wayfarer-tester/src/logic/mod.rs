pub mod reports;
pub mod simulation;
pub mod tester;

pub use tester::*;
