//! Reference visual layers.
//!
//! These keep their transform as local presentation state and never touch
//! the store. Interpolation is out of scope: a pose jumps to its target and
//! the motion's duration stands in for the animation.

use super::{CoverDiff, Motion, VisualLayer};
use crate::phase::{CoverDirection, Phase, ScaleLevel, SequenceId, Settle};
use crate::store::PhaseSnapshot;
use std::time::Duration;

/// Presentation state of the book body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookPose {
    pub scale: ScaleLevel,
    pub rotation_deg: u16,
    pub lifted: bool,
}

/// The book body: follows the requested scale, rotates 180 degrees and lifts.
///
/// Reports rotation and lift completion; scale has no completion signal.
#[derive(Debug, Clone)]
pub struct BookLayer {
    rotation: Duration,
    lift: Duration,
    pose: BookPose,
    last: Option<(SequenceId, Phase)>,
    motions: u32,
}

impl BookLayer {
    pub fn new(rotation: Duration, lift: Duration) -> Self {
        Self {
            rotation,
            lift,
            pose: BookPose::default(),
            last: None,
            motions: 0,
        }
    }

    pub fn pose(&self) -> BookPose {
        self.pose
    }

    /// Number of settle-reporting motions started so far.
    pub fn motions_started(&self) -> u32 {
        self.motions
    }

    fn target(phase: Phase) -> (u16, bool) {
        match phase {
            Phase::Rotating | Phase::ReverseLifting => (180, false),
            Phase::Lifting | Phase::WaitingForResult | Phase::Reversing => (180, true),
            Phase::Idle
            | Phase::Saving
            | Phase::Scaling
            | Phase::ClosingCover
            | Phase::ReverseRotating
            | Phase::OpeningCover
            | Phase::ReverseScaling
            | Phase::ShowingResult => (0, false),
        }
    }
}

impl VisualLayer for BookLayer {
    fn name(&self) -> &str {
        "book"
    }

    fn render(&mut self, snapshot: &PhaseSnapshot) -> Option<Motion> {
        self.pose.scale = snapshot.scale;

        let key = (snapshot.sequence, snapshot.phase);
        if self.last == Some(key) {
            return None;
        }
        self.last = Some(key);

        let (rotation_deg, lifted) = Self::target(snapshot.phase);
        self.pose.rotation_deg = rotation_deg;
        self.pose.lifted = lifted;

        let motion = match snapshot.phase {
            Phase::Rotating | Phase::ReverseRotating => Motion::new(Settle::Rotation, self.rotation),
            Phase::Lifting | Phase::ReverseLifting => Motion::new(Settle::Lift, self.lift),
            _ => return None,
        };
        self.motions += 1;
        Some(motion)
    }
}

/// The cover: flips whenever a new `(direction, trigger)` pair arrives.
///
/// Has no completion signal; the orchestrator times it with a dwell.
#[derive(Debug, Clone, Default)]
pub struct CoverLayer {
    diff: CoverDiff,
    direction: CoverDirection,
    flips: u32,
}

impl CoverLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self) -> CoverDirection {
        self.direction
    }

    pub fn flips(&self) -> u32 {
        self.flips
    }
}

impl VisualLayer for CoverLayer {
    fn name(&self) -> &str {
        "cover"
    }

    fn render(&mut self, snapshot: &PhaseSnapshot) -> Option<Motion> {
        self.direction = snapshot.direction;
        if self.diff.observe(snapshot).is_some() {
            self.flips += 1;
        }
        None
    }
}
