//! The phase graph as a pure transition table.
//!
//! Nothing here sleeps, spawns, or touches the store. [`advance`] maps
//! `(phase, event)` to the next phase plus the work the driver must perform on
//! entry, so the forward/reverse walk can be checked without a clock.
//!
//! | From               | Trigger                 | To                 |
//! |--------------------|-------------------------|--------------------|
//! | idle               | start                   | saving             |
//! | saving             | save resolved           | scaling            |
//! | saving             | save rejected           | idle               |
//! | scaling            | scale-transition dwell  | closing_cover      |
//! | closing_cover      | cover-flip dwell        | rotating           |
//! | rotating           | rotation settled        | lifting            |
//! | lifting            | lift settled            | waiting_for_result |
//! | waiting_for_result | minimum-wait dwell      | reversing          |
//! | waiting_for_result | late failure            | idle               |
//! | reversing          | immediate               | reverse_lifting    |
//! | reverse_lifting    | lift settled            | reverse_rotating   |
//! | reverse_rotating   | rotation settled        | opening_cover      |
//! | opening_cover      | cover-flip dwell        | reverse_scaling    |
//! | reverse_scaling    | scale-transition dwell  | showing_result     |
//! | showing_result     | result-display dwell    | idle               |

use crate::errors::TransitionError;
use crate::phase::{CoverDirection, Dwell, Phase, ScaleLevel, Settle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inputs to the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseEvent {
    Start,
    SaveSucceeded,
    SaveFailed,
    DwellElapsed { dwell: Dwell },
    Settled { settle: Settle },
    /// Follow-up issued by a phase that has no work of its own.
    Proceed,
    /// A failure discovered after the save appeared to succeed.
    LateFailure,
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseEvent::Start => write!(f, "start"),
            PhaseEvent::SaveSucceeded => write!(f, "save succeeded"),
            PhaseEvent::SaveFailed => write!(f, "save failed"),
            PhaseEvent::DwellElapsed { dwell } => write!(f, "{} elapsed", dwell),
            PhaseEvent::Settled { settle } => write!(f, "{}", settle),
            PhaseEvent::Proceed => write!(f, "proceed"),
            PhaseEvent::LateFailure => write!(f, "late failure"),
        }
    }
}

/// How a phase is left on the success path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Start,
    SaveResolved,
    Dwell { dwell: Dwell },
    Settle { settle: Settle },
    Immediate,
}

impl Trigger {
    /// The event that fires this trigger when everything goes well.
    pub fn success_event(&self) -> PhaseEvent {
        match *self {
            Trigger::Start => PhaseEvent::Start,
            Trigger::SaveResolved => PhaseEvent::SaveSucceeded,
            Trigger::Dwell { dwell } => PhaseEvent::DwellElapsed { dwell },
            Trigger::Settle { settle } => PhaseEvent::Settled { settle },
            Trigger::Immediate => PhaseEvent::Proceed,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Start => write!(f, "start()"),
            Trigger::SaveResolved => write!(f, "save resolves"),
            Trigger::Dwell { dwell } => write!(f, "dwell: {}", dwell),
            Trigger::Settle { settle } => write!(f, "callback: {}", settle),
            Trigger::Immediate => write!(f, "immediate"),
        }
    }
}

/// How a sequence ended when it returns to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Completed,
    Failed,
}

/// Work the driver performs on entering a phase, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    InvokeSave,
    RequestScale(ScaleLevel),
    RequestCover(CoverDirection),
    ArmDwell(Dwell),
    AwaitSettle(Settle),
    Proceed,
    Finish(Finish),
}

/// One resolved edge of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub from: Phase,
    pub to: Phase,
    pub event: PhaseEvent,
    pub effects: Vec<Effect>,
}

/// Resolve `event` against `from`.
///
/// Any pair not in the table is an invariant violation and is returned as
/// [`TransitionError::UnexpectedEvent`]; the caller decides whether to drop it.
pub fn advance(from: Phase, event: PhaseEvent) -> Result<Step, TransitionError> {
    use PhaseEvent as E;

    let to = match (from, event) {
        (Phase::Idle, E::Start) => Phase::Saving,
        (Phase::Saving, E::SaveSucceeded) => Phase::Scaling,
        (Phase::Saving, E::SaveFailed) => Phase::Idle,
        (
            Phase::Scaling,
            E::DwellElapsed {
                dwell: Dwell::ScaleTransition,
            },
        ) => Phase::ClosingCover,
        (
            Phase::ClosingCover,
            E::DwellElapsed {
                dwell: Dwell::CoverFlip,
            },
        ) => Phase::Rotating,
        (
            Phase::Rotating,
            E::Settled {
                settle: Settle::Rotation,
            },
        ) => Phase::Lifting,
        (
            Phase::Lifting,
            E::Settled {
                settle: Settle::Lift,
            },
        ) => Phase::WaitingForResult,
        (
            Phase::WaitingForResult,
            E::DwellElapsed {
                dwell: Dwell::MinimumWait,
            },
        ) => Phase::Reversing,
        (Phase::WaitingForResult, E::LateFailure) => Phase::Idle,
        (Phase::Reversing, E::Proceed) => Phase::ReverseLifting,
        (
            Phase::ReverseLifting,
            E::Settled {
                settle: Settle::Lift,
            },
        ) => Phase::ReverseRotating,
        (
            Phase::ReverseRotating,
            E::Settled {
                settle: Settle::Rotation,
            },
        ) => Phase::OpeningCover,
        (
            Phase::OpeningCover,
            E::DwellElapsed {
                dwell: Dwell::CoverFlip,
            },
        ) => Phase::ReverseScaling,
        (
            Phase::ReverseScaling,
            E::DwellElapsed {
                dwell: Dwell::ScaleTransition,
            },
        ) => Phase::ShowingResult,
        (
            Phase::ShowingResult,
            E::DwellElapsed {
                dwell: Dwell::ResultDisplay,
            },
        ) => Phase::Idle,
        (phase, event) => return Err(TransitionError::UnexpectedEvent { phase, event }),
    };

    Ok(Step {
        from,
        to,
        event,
        effects: entry_effects(from, to),
    })
}

/// Work performed on entering `to`.
pub fn entry_effects(from: Phase, to: Phase) -> Vec<Effect> {
    match to {
        Phase::Idle if from == Phase::ShowingResult => vec![Effect::Finish(Finish::Completed)],
        Phase::Idle => vec![Effect::Finish(Finish::Failed)],
        Phase::Saving => vec![Effect::InvokeSave],
        Phase::Scaling => vec![
            Effect::RequestScale(ScaleLevel::Closed),
            Effect::ArmDwell(Dwell::ScaleTransition),
        ],
        Phase::ClosingCover => vec![
            Effect::RequestCover(CoverDirection::Close),
            Effect::ArmDwell(Dwell::CoverFlip),
        ],
        Phase::Rotating => vec![Effect::AwaitSettle(Settle::Rotation)],
        Phase::Lifting => vec![Effect::AwaitSettle(Settle::Lift)],
        Phase::WaitingForResult => vec![Effect::ArmDwell(Dwell::MinimumWait)],
        Phase::Reversing => vec![Effect::Proceed],
        Phase::ReverseLifting => vec![Effect::AwaitSettle(Settle::Lift)],
        Phase::ReverseRotating => vec![Effect::AwaitSettle(Settle::Rotation)],
        Phase::OpeningCover => vec![
            Effect::RequestCover(CoverDirection::Open),
            Effect::ArmDwell(Dwell::CoverFlip),
        ],
        Phase::ReverseScaling => vec![
            Effect::RequestScale(ScaleLevel::Opened),
            Effect::ArmDwell(Dwell::ScaleTransition),
        ],
        Phase::ShowingResult => vec![Effect::ArmDwell(Dwell::ResultDisplay)],
    }
}

/// The trigger that moves the success path out of `phase`.
pub fn exit_trigger(phase: Phase) -> Trigger {
    match phase {
        Phase::Idle => Trigger::Start,
        Phase::Saving => Trigger::SaveResolved,
        Phase::Scaling | Phase::ReverseScaling => Trigger::Dwell {
            dwell: Dwell::ScaleTransition,
        },
        Phase::ClosingCover | Phase::OpeningCover => Trigger::Dwell {
            dwell: Dwell::CoverFlip,
        },
        Phase::Rotating | Phase::ReverseRotating => Trigger::Settle {
            settle: Settle::Rotation,
        },
        Phase::Lifting | Phase::ReverseLifting => Trigger::Settle {
            settle: Settle::Lift,
        },
        Phase::WaitingForResult => Trigger::Dwell {
            dwell: Dwell::MinimumWait,
        },
        Phase::Reversing => Trigger::Immediate,
        Phase::ShowingResult => Trigger::Dwell {
            dwell: Dwell::ResultDisplay,
        },
    }
}

/// Walk the success path from idle back to idle.
///
/// Returns every phase entered, ending with `Idle`.
pub fn happy_path() -> Vec<Phase> {
    let mut trail = Vec::with_capacity(Phase::ALL.len());
    let mut phase = Phase::Idle;
    loop {
        let event = exit_trigger(phase).success_event();
        match advance(phase, event) {
            Ok(step) => {
                trail.push(step.to);
                phase = step.to;
            }
            Err(_) => break,
        }
        if phase.is_idle() {
            break;
        }
    }
    trail
}
