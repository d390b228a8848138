//! Per-sequence bookkeeping and the report handed back to callers.

use crate::errors::TransitionError;
use crate::phase::{Phase, SequenceId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A phase entered during a sequence, with its offset from `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStamp {
    pub phase: Phase,
    #[serde(with = "duration_serde")]
    pub at: Duration,
}

/// Outcome of a successful sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub sequence: SequenceId,
    /// Every phase entered, in order, ending with `idle`
    pub trail: Vec<PhaseStamp>,
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl SequenceReport {
    pub fn phases(&self) -> Vec<Phase> {
        self.trail.iter().map(|s| s.phase).collect()
    }

    /// Offset at which `phase` was entered, if it was.
    pub fn entered_at(&self, phase: Phase) -> Option<Duration> {
        self.trail.iter().find(|s| s.phase == phase).map(|s| s.at)
    }

    /// Time spent in `phase` before the next one was entered.
    pub fn time_in(&self, phase: Phase) -> Option<Duration> {
        let index = self.trail.iter().position(|s| s.phase == phase)?;
        let next = self.trail.get(index + 1)?;
        Some(next.at.saturating_sub(self.trail[index].at))
    }
}

pub(crate) type Outcome = Result<SequenceReport, TransitionError>;

/// The sequence currently owned by the driver.
pub(crate) struct ActiveSequence {
    pub id: SequenceId,
    started: Instant,
    trail: Vec<PhaseStamp>,
    outcome: oneshot::Sender<Outcome>,
    /// Error held until the transition back to idle resolves the outcome.
    pub failure: Option<anyhow::Error>,
}

impl ActiveSequence {
    pub fn new(id: SequenceId, outcome: oneshot::Sender<Outcome>) -> Self {
        Self {
            id,
            started: Instant::now(),
            trail: Vec::new(),
            outcome,
            failure: None,
        }
    }

    pub fn record(&mut self, phase: Phase) -> Duration {
        let at = self.started.elapsed();
        self.trail.push(PhaseStamp { phase, at });
        at
    }

    pub fn complete(self) -> SequenceReport {
        let report = SequenceReport {
            sequence: self.id,
            trail: self.trail,
            elapsed: self.started.elapsed(),
        };
        // The caller may have dropped its handle.
        self.outcome.send(Ok(report.clone())).ok();
        report
    }

    pub fn fail(self, error: TransitionError) {
        self.outcome.send(Err(error)).ok();
    }
}

/// Serde helpers for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
