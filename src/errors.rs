//! Typed error hierarchy for the transition orchestrator.
//!
//! Stale continuations are not represented here: a timer or callback tagged
//! with an old sequence id is routine and is dropped without an error.

use crate::machine::PhaseEvent;
use crate::phase::{Phase, SequenceId};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the orchestrator to its callers.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The injected save action rejected. The original error is the source.
    #[error("Save action failed: {0}")]
    SaveFailed(#[source] anyhow::Error),

    #[error("Cannot start a sequence while phase is {phase}")]
    InvalidStart { phase: Phase },

    /// Raised by a caller-imposed timeout around the save action.
    #[error("Save action did not settle within {waited:?}")]
    StuckSequence { waited: Duration },

    #[error("Sequence {sequence} was aborted by reset")]
    Aborted { sequence: SequenceId },

    #[error("Event '{event}' is not valid in phase {phase}")]
    UnexpectedEvent { phase: Phase, event: PhaseEvent },

    #[error("Cannot report a late failure while phase is {phase}")]
    InvalidFailureReport { phase: Phase },

    #[error("Orchestrator is no longer running")]
    OrchestratorClosed,
}

impl TransitionError {
    /// Check if this error came from the save action rather than the phase graph.
    pub fn is_save_failure(&self) -> bool {
        matches!(self, Self::SaveFailed(_))
    }

    /// Find a `StuckSequence` error anywhere in a save failure's chain.
    pub fn stuck_after(&self) -> Option<Duration> {
        match self {
            Self::StuckSequence { waited } => Some(*waited),
            Self::SaveFailed(source) => source.chain().find_map(|cause| {
                match cause.downcast_ref::<TransitionError>() {
                    Some(TransitionError::StuckSequence { waited }) => Some(*waited),
                    _ => None,
                }
            }),
            _ => None,
        }
    }
}
