pub mod runner;
pub mod state;

pub use runner::ControlLoop;
pub use state::{decide, ControlState, Decision, Phase};
