//! Async driver for the phase graph.
//!
//! All orchestration runs on one task that owns a command queue. Public calls,
//! save results, dwell timers and settle callbacks all arrive as commands, so
//! every store mutation happens on a single serialized timeline regardless of
//! which thread delivered the event.
//!
//! Each continuation carries the sequence id it was scheduled under. The driver
//! drops any continuation whose id is not the running sequence; that is the
//! only cancellation mechanism a caller ever needs.

use super::state::{ActiveSequence, Outcome, SequenceReport};
use crate::config::TransitionTimings;
use crate::errors::TransitionError;
use crate::machine::{self, Effect, Finish, PhaseEvent};
use crate::observer::SettleHandle;
use crate::phase::{Dwell, Phase, SequenceId, Settle};
use crate::save::SaveAction;
use crate::store::PhaseStore;
use crate::timer::DwellScheduler;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Command {
    Start {
        save: Box<dyn SaveAction>,
        reply: oneshot::Sender<Result<SequenceHandle, TransitionError>>,
    },
    SaveSettled {
        sequence: SequenceId,
        result: anyhow::Result<()>,
    },
    DwellElapsed {
        sequence: SequenceId,
        dwell: Dwell,
    },
    Settled {
        sequence: SequenceId,
        settle: Settle,
    },
    ReportFailure {
        error: anyhow::Error,
        reply: oneshot::Sender<Result<(), TransitionError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// An accepted sequence. Await [`SequenceHandle::outcome`] for the result.
#[derive(Debug)]
pub struct SequenceHandle {
    id: SequenceId,
    outcome: oneshot::Receiver<Outcome>,
}

impl SequenceHandle {
    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// Wait for the sequence to return to idle.
    ///
    /// Resolves with the report on success, `SaveFailed` with the save
    /// action's own error on failure, or `Aborted` if a reset intervened.
    pub async fn outcome(self) -> Result<SequenceReport, TransitionError> {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(TransitionError::OrchestratorClosed))
    }
}

/// Handle to the running orchestrator.
///
/// Must be created inside a Tokio runtime. Dropping it stops the driver; any
/// outstanding [`SequenceHandle`] then resolves with `OrchestratorClosed`.
pub struct Orchestrator {
    store: PhaseStore,
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
}

impl Orchestrator {
    /// Start the driver. It becomes the only writer of `store`.
    pub fn spawn(store: PhaseStore, timings: TransitionTimings) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            store: store.clone(),
            timings,
            commands: commands.downgrade(),
            timers: DwellScheduler::new(),
            active: None,
            pending_save: None,
        };
        let driver = tokio::spawn(driver.run(rx));
        Self {
            store,
            commands,
            driver,
        }
    }

    pub fn store(&self) -> &PhaseStore {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.store.phase()
    }

    /// Begin a sequence that saves with `save`.
    ///
    /// Rejected with `InvalidStart` unless the phase is `idle`; a rejected call
    /// never touches the running sequence. On acceptance the phase is already
    /// `saving` when this returns.
    pub async fn start<A: SaveAction>(&self, save: A) -> Result<SequenceHandle, TransitionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            save: Box::new(save),
            reply,
        })?;
        rx.await.map_err(|_| TransitionError::OrchestratorClosed)?
    }

    /// Start a sequence and wait for it to finish.
    pub async fn run<A: SaveAction>(&self, save: A) -> Result<SequenceReport, TransitionError> {
        self.start(save).await?.outcome().await
    }

    /// Force the phase back to idle and invalidate the running sequence.
    pub async fn reset(&self) -> Result<(), TransitionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply })?;
        rx.await.map_err(|_| TransitionError::OrchestratorClosed)
    }

    /// Report a save failure discovered after the forward walk finished.
    ///
    /// Only valid in `waiting_for_result`; jumps straight to idle without the
    /// reverse walk.
    pub async fn report_failure(&self, error: anyhow::Error) -> Result<(), TransitionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReportFailure { error, reply })?;
        rx.await.map_err(|_| TransitionError::OrchestratorClosed)?
    }

    /// Completion-callback slots for the visual layers.
    pub fn settle_handle(&self) -> SettleHandle {
        let commands = self.commands.clone();
        SettleHandle::new(move |sequence, settle| {
            commands.send(Command::Settled { sequence, settle }).ok();
        })
    }

    pub fn on_rotation_settled(&self, sequence: SequenceId) {
        self.send(Command::Settled {
            sequence,
            settle: Settle::Rotation,
        })
        .ok();
    }

    pub fn on_lift_settled(&self, sequence: SequenceId) {
        self.send(Command::Settled {
            sequence,
            settle: Settle::Lift,
        })
        .ok();
    }

    fn send(&self, command: Command) -> Result<(), TransitionError> {
        self.commands
            .send(command)
            .map_err(|_| TransitionError::OrchestratorClosed)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct Driver {
    store: PhaseStore,
    timings: TransitionTimings,
    commands: mpsc::WeakUnboundedSender<Command>,
    timers: DwellScheduler,
    active: Option<ActiveSequence>,
    pending_save: Option<Box<dyn SaveAction>>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("orchestrator command queue closed");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { save, reply } => self.start(save, reply),
            Command::SaveSettled { sequence, result } => {
                if !self.is_live(sequence) {
                    debug!(sequence = %sequence, "discarding stale save result");
                    return;
                }
                let event = match result {
                    Ok(()) => PhaseEvent::SaveSucceeded,
                    Err(error) => {
                        warn!(sequence = %sequence, error = %error, "save action failed");
                        if let Some(active) = self.active.as_mut() {
                            active.failure = Some(error);
                        }
                        PhaseEvent::SaveFailed
                    }
                };
                self.drive(event);
            }
            Command::DwellElapsed { sequence, dwell } => {
                self.continue_if_live(sequence, PhaseEvent::DwellElapsed { dwell })
            }
            Command::Settled { sequence, settle } => {
                self.continue_if_live(sequence, PhaseEvent::Settled { settle })
            }
            Command::ReportFailure { error, reply } => {
                let result = self.report_failure(error);
                reply.send(result).ok();
            }
            Command::Reset { reply } => {
                self.reset();
                reply.send(()).ok();
            }
        }
    }

    fn start(
        &mut self,
        save: Box<dyn SaveAction>,
        reply: oneshot::Sender<Result<SequenceHandle, TransitionError>>,
    ) {
        let phase = self.store.phase();
        if !phase.is_idle() || self.active.is_some() {
            debug!(phase = %phase, "rejecting start while a sequence is running");
            reply.send(Err(TransitionError::InvalidStart { phase })).ok();
            return;
        }

        let sequence = self.store.new_sequence();
        self.timers.begin(sequence);
        let (outcome, outcome_rx) = oneshot::channel();
        self.active = Some(ActiveSequence::new(sequence, outcome));
        self.pending_save = Some(save);

        info!(sequence = %sequence, "starting transition sequence");
        let handle = SequenceHandle {
            id: sequence,
            outcome: outcome_rx,
        };
        self.drive(PhaseEvent::Start);
        if reply.send(Ok(handle)).is_err() {
            debug!(sequence = %sequence, "start caller went away, sequence continues");
        }
    }

    fn is_live(&self, sequence: SequenceId) -> bool {
        self.store.is_current(sequence) && self.active.as_ref().is_some_and(|a| a.id == sequence)
    }

    fn continue_if_live(&mut self, sequence: SequenceId, event: PhaseEvent) {
        if !self.is_live(sequence) {
            debug!(sequence = %sequence, event = %event, "discarding stale continuation");
            return;
        }
        self.drive(event);
    }

    /// Apply `first` and any immediate follow-ups.
    fn drive(&mut self, first: PhaseEvent) {
        let mut next = Some(first);
        while let Some(event) = next.take() {
            let step = match machine::advance(self.store.phase(), event) {
                Ok(step) => step,
                Err(error) => {
                    warn!(error = %error, "dropping event the phase graph does not expect");
                    return;
                }
            };

            if step.to.is_idle() {
                self.store.return_to_idle(false);
            } else {
                self.store.set_phase(step.to);
            }
            if let Some(active) = self.active.as_mut() {
                let at = active.record(step.to);
                debug!(
                    sequence = %active.id,
                    from = %step.from,
                    to = %step.to,
                    event = %step.event,
                    at_ms = at.as_millis() as u64,
                    "phase transition"
                );
            }

            for effect in step.effects {
                match effect {
                    Effect::InvokeSave => self.invoke_save(),
                    Effect::RequestScale(level) => {
                        self.store.request_scale(level);
                    }
                    Effect::RequestCover(direction) => {
                        self.store.request_cover_direction(direction);
                    }
                    Effect::ArmDwell(dwell) => self.arm(dwell),
                    Effect::AwaitSettle(settle) => {
                        debug!(awaiting = %settle, "waiting on visual layer")
                    }
                    Effect::Proceed => next = Some(PhaseEvent::Proceed),
                    Effect::Finish(finish) => self.finish(finish),
                }
            }
        }
    }

    fn invoke_save(&mut self) {
        let (Some(save), Some(sequence)) =
            (self.pending_save.take(), self.active.as_ref().map(|a| a.id))
        else {
            warn!("entered saving without a save action");
            return;
        };

        let commands = self.commands.clone();
        tokio::spawn(async move {
            let result = save.save().await;
            if let Some(commands) = commands.upgrade() {
                commands.send(Command::SaveSettled { sequence, result }).ok();
            }
        });
    }

    fn arm(&mut self, dwell: Dwell) {
        let Some(sequence) = self.active.as_ref().map(|a| a.id) else {
            return;
        };
        let delay = self.timings.dwell(dwell);
        let commands = self.commands.clone();
        let armed = self.timers.schedule(sequence, delay, move || {
            if let Some(commands) = commands.upgrade() {
                commands.send(Command::DwellElapsed { sequence, dwell }).ok();
            }
        });
        if !armed {
            warn!(sequence = %sequence, dwell = %dwell, "dwell timer not armed for inactive sequence");
        }
    }

    fn finish(&mut self, finish: Finish) {
        self.timers.cancel();
        let Some(mut active) = self.active.take() else {
            warn!("sequence finished with nothing active");
            return;
        };

        match finish {
            Finish::Completed => {
                let report = active.complete();
                info!(
                    sequence = %report.sequence,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "transition sequence completed"
                );
            }
            Finish::Failed => {
                let error = active
                    .failure
                    .take()
                    .unwrap_or_else(|| anyhow::anyhow!("sequence failed without an error"));
                info!(sequence = %active.id, "transition sequence failed");
                active.fail(TransitionError::SaveFailed(error));
            }
        }
    }

    fn report_failure(&mut self, error: anyhow::Error) -> Result<(), TransitionError> {
        let phase = self.store.phase();
        if phase != Phase::WaitingForResult {
            return Err(TransitionError::InvalidFailureReport { phase });
        }
        warn!(error = %error, "late save failure reported");
        if let Some(active) = self.active.as_mut() {
            active.failure = Some(error);
        }
        self.drive(PhaseEvent::LateFailure);
        Ok(())
    }

    fn reset(&mut self) {
        self.timers.cancel();
        self.pending_save = None;
        let sequence = self.store.return_to_idle(true).sequence;

        if let Some(active) = self.active.take() {
            info!(sequence = %active.id, "transition sequence aborted by reset");
            let aborted = active.id;
            active.fail(TransitionError::Aborted { sequence: aborted });
        }
        debug!(sequence = %sequence, "orchestrator reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn timings() -> TransitionTimings {
        TransitionTimings {
            scale_transition_duration_ms: 300,
            cover_flip_duration_ms: 400,
            minimum_wait_after_lift_ms: 1000,
            result_display_duration_ms: 1000,
        }
    }

    fn save_after(ms: u64) -> impl SaveAction {
        move || async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            anyhow::Ok(())
        }
    }

    fn phases(rx: &mut broadcast::Receiver<crate::store::PhaseSnapshot>) -> Vec<Phase> {
        let mut out = Vec::new();
        let mut last = Phase::Idle;
        while let Ok(s) = rx.try_recv() {
            if s.phase != last {
                out.push(s.phase);
                last = s.phase;
            }
        }
        out
    }

    /// Wait until the store reaches `phase`.
    async fn reach(orch: &Orchestrator, phase: Phase) {
        let mut rx = orch.store().watch();
        rx.wait_for(|s| s.phase == phase).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_enters_saving_immediately() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let handle = orch.start(save_after(50)).await.unwrap();
        assert_eq!(orch.phase(), Phase::Saving);
        assert_eq!(orch.store().sequence_id(), handle.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_goes_straight_back_to_idle() {
        let store = PhaseStore::new();
        let mut rx = store.subscribe();
        let orch = Orchestrator::spawn(store, timings());

        let handle = orch
            .start(|| async { Err::<(), _>(anyhow::anyhow!("disk full")) })
            .await
            .unwrap();
        let err = handle.outcome().await.unwrap_err();

        assert!(err.is_save_failure());
        assert!(err.to_string().contains("disk full"));
        assert_eq!(orch.phase(), Phase::Idle);
        assert_eq!(phases(&mut rx), vec![Phase::Saving, Phase::Idle]);
        assert!(orch.store().snapshot().is_resting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected_without_side_effects() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let first = orch.start(save_after(50)).await.unwrap();
        reach(&orch, Phase::Scaling).await;

        let before = orch.store().snapshot();
        let err = orch.start(save_after(1)).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidStart {
                phase: Phase::Scaling
            }
        ));
        assert_eq!(orch.store().snapshot(), before);
        assert_eq!(orch.store().sequence_id(), first.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_callbacks_drive_full_walk() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let handle = orch.start(save_after(10)).await.unwrap();
        let seq = handle.id();

        reach(&orch, Phase::Rotating).await;
        orch.on_rotation_settled(seq);
        reach(&orch, Phase::Lifting).await;
        orch.on_lift_settled(seq);
        reach(&orch, Phase::ReverseLifting).await;
        orch.on_lift_settled(seq);
        reach(&orch, Phase::ReverseRotating).await;
        orch.on_rotation_settled(seq);

        let report = handle.outcome().await.unwrap();
        assert_eq!(report.phases(), machine::happy_path());
        assert!(orch.store().snapshot().is_resting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_settle_is_ignored() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let handle = orch.start(save_after(10)).await.unwrap();
        reach(&orch, Phase::Rotating).await;

        orch.on_lift_settled(handle.id());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orch.phase(), Phase::Rotating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_failure_outside_wait_window_is_rejected() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let err = orch
            .report_failure(anyhow::anyhow!("too early"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidFailureReport { phase: Phase::Idle }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_aborts_running_sequence() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let handle = orch.start(save_after(10)).await.unwrap();
        let seq = handle.id();
        reach(&orch, Phase::Rotating).await;

        orch.reset().await.unwrap();
        assert_eq!(orch.phase(), Phase::Idle);
        assert!(orch.store().sequence_id() > seq);
        assert!(orch.store().snapshot().is_resting());

        let err = handle.outcome().await.unwrap_err();
        assert!(matches!(err, TransitionError::Aborted { sequence } if sequence == seq));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_orchestrator_closes_handle() {
        let orch = Orchestrator::spawn(PhaseStore::new(), timings());
        let handle = orch.start(save_after(10)).await.unwrap();
        drop(orch);
        let err = handle.outcome().await.unwrap_err();
        assert!(matches!(err, TransitionError::OrchestratorClosed));
    }
}
