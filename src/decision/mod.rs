pub mod scoring;
pub mod switcher;

pub use switcher::{ExplorationPhase, SwitchDecision, SwitchDecisionEngine, SwitcherState};
