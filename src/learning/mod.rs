pub mod features;
pub mod qlearn;

pub use qlearn::{LearnerSnapshot, ReinforcementSelector};
