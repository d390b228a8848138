pub mod config;
pub mod errors;
pub mod machine;
pub mod observer;
pub mod orchestrator;
pub mod phase;
pub mod save;
pub mod store;
pub mod timer;
pub mod ui;

pub use errors::TransitionError;
pub use orchestrator::{Orchestrator, SequenceHandle, SequenceReport};
pub use phase::{CoverDirection, Phase, ScaleLevel, SequenceId};
pub use save::SaveAction;
pub use store::{PhaseSnapshot, PhaseStore};
