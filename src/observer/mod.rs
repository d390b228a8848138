//! Visual Observer contract.
//!
//! Visual layers render purely from a [`PhaseSnapshot`]. They never write
//! phase state; the only thing they send upward is a completion signal through
//! a [`SettleHandle`], tagged with the sequence id they were animating for.
//!
//! ## Architecture
//!
//! 1. **VisualLayer**: the trait a layer implements: `render(snapshot)`,
//!    optionally returning a [`Motion`] whose completion should be reported
//! 2. **ObserverHost**: mounts a layer on a store's update stream, times its
//!    motions, and fires the settle callbacks
//! 3. **Layers**: reference `BookLayer` (scale, rotation, lift) and
//!    `CoverLayer` (direction flips, diffed on `(direction, trigger)`)

mod host;
mod layers;

pub use host::{MountedObserver, ObserverHost};
pub use layers::{BookLayer, BookPose, CoverLayer};

use crate::phase::{CoverDirection, SequenceId, Settle};
use crate::store::PhaseSnapshot;
use std::sync::Arc;
use std::time::Duration;

/// An animation whose end the layer can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub settle: Settle,
    pub duration: Duration,
}

impl Motion {
    pub fn new(settle: Settle, duration: Duration) -> Self {
        Self { settle, duration }
    }
}

/// A component that renders from the phase store.
pub trait VisualLayer: Send + 'static {
    fn name(&self) -> &str;

    /// Render `snapshot`. Return a motion to have the host report its
    /// completion after `motion.duration`; a newer motion replaces a pending one.
    fn render(&mut self, snapshot: &PhaseSnapshot) -> Option<Motion>;
}

type SettleSink = dyn Fn(SequenceId, Settle) + Send + Sync;

/// Completion-callback slots the orchestrator wires into its settle edges.
#[derive(Clone)]
pub struct SettleHandle {
    sink: Arc<SettleSink>,
}

impl SettleHandle {
    pub fn new(sink: impl Fn(SequenceId, Settle) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A handle that drops every signal.
    pub fn disconnected() -> Self {
        Self::new(|_, _| {})
    }

    pub fn on_rotation_settled(&self, sequence: SequenceId) {
        self.notify(sequence, Settle::Rotation);
    }

    pub fn on_lift_settled(&self, sequence: SequenceId) {
        self.notify(sequence, Settle::Lift);
    }

    pub fn notify(&self, sequence: SequenceId, settle: Settle) {
        (self.sink)(sequence, settle);
    }
}

impl std::fmt::Debug for SettleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettleHandle").finish_non_exhaustive()
    }
}

/// Detects new cover requests.
///
/// Diffs on `(direction, trigger)` rather than direction alone, so a repeated
/// request for the same direction still counts. The first snapshot seen only
/// sets the baseline.
#[derive(Debug, Clone, Default)]
pub struct CoverDiff {
    last: Option<(CoverDirection, u64)>,
}

impl CoverDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the requested direction if `snapshot` carries a new request.
    pub fn observe(&mut self, snapshot: &PhaseSnapshot) -> Option<CoverDirection> {
        let intent = snapshot.cover_intent();
        match self.last.replace(intent) {
            Some(previous) if previous != intent => Some(intent.0),
            _ => None,
        }
    }
}
