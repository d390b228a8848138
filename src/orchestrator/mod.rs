pub mod runner;
pub mod state;

pub use runner::{Orchestrator, SequenceHandle};
pub use state::{PhaseStamp, SequenceReport};
