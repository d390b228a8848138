//! Phase graph value types for the transition orchestrator.
//!
//! This module provides:
//! - `Phase`: one named state of the close/flip/save/flip-back/open sequence
//! - `SequenceId`: token minted per start, used to reject stale continuations
//! - `ScaleLevel` and `CoverDirection`: visual parameters the orchestrator requests
//! - `Dwell` and `Settle`: the two kinds of edge triggers (alarm clock vs. interrupt)

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete state of the transition sequence.
///
/// `Idle` is both the initial and the terminal state. The forward half runs
/// `Saving` through `WaitingForResult`; the reverse half runs `Reversing`
/// through `ShowingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Saving,
    Scaling,
    ClosingCover,
    Rotating,
    Lifting,
    WaitingForResult,
    Reversing,
    ReverseLifting,
    ReverseRotating,
    OpeningCover,
    ReverseScaling,
    ShowingResult,
}

impl Phase {
    /// Every phase, in graph order.
    pub const ALL: [Phase; 13] = [
        Phase::Idle,
        Phase::Saving,
        Phase::Scaling,
        Phase::ClosingCover,
        Phase::Rotating,
        Phase::Lifting,
        Phase::WaitingForResult,
        Phase::Reversing,
        Phase::ReverseLifting,
        Phase::ReverseRotating,
        Phase::OpeningCover,
        Phase::ReverseScaling,
        Phase::ShowingResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Saving => "saving",
            Phase::Scaling => "scaling",
            Phase::ClosingCover => "closing_cover",
            Phase::Rotating => "rotating",
            Phase::Lifting => "lifting",
            Phase::WaitingForResult => "waiting_for_result",
            Phase::Reversing => "reversing",
            Phase::ReverseLifting => "reverse_lifting",
            Phase::ReverseRotating => "reverse_rotating",
            Phase::OpeningCover => "opening_cover",
            Phase::ReverseScaling => "reverse_scaling",
            Phase::ShowingResult => "showing_result",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// Check if the phase belongs to the reverse half of the graph.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Phase::Reversing
                | Phase::ReverseLifting
                | Phase::ReverseRotating
                | Phase::OpeningCover
                | Phase::ReverseScaling
                | Phase::ShowingResult
        )
    }

    /// Check if entering this phase changes what the visual layers show.
    pub fn is_visual(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Saving)
    }

    /// The phase on the other half of the graph that undoes this one.
    ///
    /// Only the four animated steps have mirrors; barriers and the
    /// save/result bookends do not.
    pub fn mirror(&self) -> Option<Phase> {
        match self {
            Phase::Scaling => Some(Phase::ReverseScaling),
            Phase::ClosingCover => Some(Phase::OpeningCover),
            Phase::Rotating => Some(Phase::ReverseRotating),
            Phase::Lifting => Some(Phase::ReverseLifting),
            Phase::ReverseScaling => Some(Phase::Scaling),
            Phase::OpeningCover => Some(Phase::ClosingCover),
            Phase::ReverseRotating => Some(Phase::Rotating),
            Phase::ReverseLifting => Some(Phase::Lifting),
            Phase::Idle
            | Phase::Saving
            | Phase::WaitingForResult
            | Phase::Reversing
            | Phase::ShowingResult => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Invalid phase '{}'", s))
    }
}

/// Token identifying one run of the phase graph.
///
/// Minted by the store, strictly increasing. `SequenceId::NONE` is the value a
/// fresh store carries before any sequence has started.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    pub const NONE: SequenceId = SequenceId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Overall book scale requested from the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleLevel {
    #[default]
    Opened,
    Closed,
}

impl fmt::Display for ScaleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleLevel::Opened => write!(f, "opened"),
            ScaleLevel::Closed => write!(f, "closed"),
        }
    }
}

/// Direction the cover should flip towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverDirection {
    #[default]
    Open,
    Close,
}

impl fmt::Display for CoverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverDirection::Open => write!(f, "open"),
            CoverDirection::Close => write!(f, "close"),
        }
    }
}

/// Fixed-duration timers used as edge triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dwell {
    ScaleTransition,
    CoverFlip,
    MinimumWait,
    ResultDisplay,
}

impl fmt::Display for Dwell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dwell::ScaleTransition => write!(f, "scale transition"),
            Dwell::CoverFlip => write!(f, "cover flip"),
            Dwell::MinimumWait => write!(f, "minimum wait"),
            Dwell::ResultDisplay => write!(f, "result display"),
        }
    }
}

/// Completion signals a visual layer reports when its transform has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settle {
    Rotation,
    Lift,
}

impl fmt::Display for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settle::Rotation => write!(f, "rotation settled"),
            Settle::Lift => write!(f, "lift settled"),
        }
    }
}
