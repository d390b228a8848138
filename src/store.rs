//! Phase Store: the single writable source of truth for the sequence.
//!
//! The store is a passive bulletin board. It holds the current phase, the
//! running sequence id, and the two visual parameters, and broadcasts a full
//! snapshot on every mutation. It knows nothing about the phase graph.
//!
//! Two read paths are offered:
//! - [`PhaseStore::subscribe`]: every update, in order (lossless unless a
//!   receiver lags more than the buffer)
//! - [`PhaseStore::watch`]: latest value only, for consumers that just render
//!   "now"

use crate::phase::{CoverDirection, Phase, ScaleLevel, SequenceId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

/// Number of updates a slow subscriber may fall behind before it lags.
const UPDATE_BUFFER: usize = 256;

/// Everything an observer needs to render, captured atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    pub sequence: SequenceId,
    pub scale: ScaleLevel,
    pub direction: CoverDirection,
    /// Bumped on every cover request, including repeats of the same direction.
    pub direction_trigger: u64,
}

impl PhaseSnapshot {
    /// The pair observers must diff on to detect a new cover request.
    pub fn cover_intent(&self) -> (CoverDirection, u64) {
        (self.direction, self.direction_trigger)
    }

    /// Check if the visual parameters are back at rest.
    pub fn is_resting(&self) -> bool {
        self.phase.is_idle()
            && self.scale == ScaleLevel::Opened
            && self.direction == CoverDirection::Open
    }
}

struct StoreInner {
    state: Mutex<PhaseSnapshot>,
    latest: watch::Sender<PhaseSnapshot>,
    updates: broadcast::Sender<PhaseSnapshot>,
}

/// Shared handle to a phase store. Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct PhaseStore {
    inner: Arc<StoreInner>,
}

impl PhaseStore {
    pub fn new() -> Self {
        let initial = PhaseSnapshot::default();
        let (latest, _) = watch::channel(initial);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                latest,
                updates,
            }),
        }
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        *self.lock()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.lock().sequence
    }

    /// Check if `sequence` is still the one the store considers current.
    pub fn is_current(&self, sequence: SequenceId) -> bool {
        self.lock().sequence == sequence
    }

    /// Receive every subsequent update in order.
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Receive only the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<PhaseSnapshot> {
        self.inner.latest.subscribe()
    }

    /// Set the phase unconditionally.
    pub fn set_phase(&self, phase: Phase) -> PhaseSnapshot {
        self.update(|s| s.phase = phase)
    }

    /// Set the desired scale. Independent of phase.
    pub fn request_scale(&self, level: ScaleLevel) -> PhaseSnapshot {
        self.update(|s| s.scale = level)
    }

    /// Set the cover direction and bump the trigger id in one update.
    ///
    /// Requesting the same direction twice still yields two distinct events.
    pub fn request_cover_direction(&self, direction: CoverDirection) -> PhaseSnapshot {
        self.update(|s| {
            s.direction = direction;
            s.direction_trigger += 1;
        })
    }

    /// Mint a fresh sequence id and make it current.
    ///
    /// Anything still tagged with an older id becomes inert.
    pub fn new_sequence(&self) -> SequenceId {
        self.update(|s| s.sequence = s.sequence.next()).sequence
    }

    /// Put the store back at rest in one update.
    ///
    /// Phase becomes `idle` and the visuals return to opened/open. The cover
    /// trigger is bumped only if the cover was not already open. With
    /// `invalidate`, a fresh sequence id is minted in the same update.
    pub fn return_to_idle(&self, invalidate: bool) -> PhaseSnapshot {
        self.update(|s| {
            s.phase = Phase::Idle;
            if invalidate {
                s.sequence = s.sequence.next();
            }
            s.scale = ScaleLevel::Opened;
            if s.direction != CoverDirection::Open {
                s.direction = CoverDirection::Open;
                s.direction_trigger += 1;
            }
        })
    }

    fn update(&self, apply: impl FnOnce(&mut PhaseSnapshot)) -> PhaseSnapshot {
        let mut state = self.lock();
        apply(&mut state);
        let snapshot = *state;
        // Published under the lock so subscribers never see updates out of order.
        self.inner.latest.send_replace(snapshot);
        self.inner.updates.send(snapshot).ok();
        snapshot
    }

    fn lock(&self) -> MutexGuard<'_, PhaseSnapshot> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PhaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseStore")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<PhaseSnapshot>) -> Vec<PhaseSnapshot> {
        let mut out = Vec::new();
        while let Ok(s) = rx.try_recv() {
            out.push(s);
        }
        out
    }

    #[test]
    fn test_new_store_is_resting() {
        let store = PhaseStore::new();
        let snap = store.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.sequence, SequenceId::NONE);
        assert_eq!(snap.direction_trigger, 0);
        assert!(snap.is_resting());
    }

    #[test]
    fn test_repeated_cover_requests_are_distinct_events() {
        let store = PhaseStore::new();
        let mut rx = store.subscribe();

        store.request_cover_direction(CoverDirection::Close);
        store.request_cover_direction(CoverDirection::Close);

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].cover_intent(), (CoverDirection::Close, 1));
        assert_eq!(updates[1].cover_intent(), (CoverDirection::Close, 2));
        assert_ne!(updates[0], updates[1]);
    }

    #[test]
    fn test_new_sequence_strictly_increases() {
        let store = PhaseStore::new();
        let a = store.new_sequence();
        let b = store.new_sequence();
        let c = store.new_sequence();
        assert!(a < b && b < c);
        assert!(store.is_current(c));
        assert!(!store.is_current(a));
    }

    #[test]
    fn test_set_phase_broadcasts_even_when_unchanged() {
        let store = PhaseStore::new();
        let mut rx = store.subscribe();
        store.set_phase(Phase::Idle);
        store.set_phase(Phase::Idle);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_scale_is_independent_of_phase() {
        let store = PhaseStore::new();
        store.set_phase(Phase::Rotating);
        store.request_scale(ScaleLevel::Closed);
        let snap = store.snapshot();
        assert_eq!(snap.phase, Phase::Rotating);
        assert_eq!(snap.scale, ScaleLevel::Closed);
        assert_eq!(snap.direction_trigger, 0);
    }

    #[test]
    fn test_subscribers_see_updates_in_order() {
        let store = PhaseStore::new();
        let mut rx = store.subscribe();
        store.set_phase(Phase::Saving);
        store.set_phase(Phase::Scaling);
        store.request_scale(ScaleLevel::Closed);

        let phases: Vec<_> = drain(&mut rx).iter().map(|s| (s.phase, s.scale)).collect();
        assert_eq!(
            phases,
            vec![
                (Phase::Saving, ScaleLevel::Opened),
                (Phase::Scaling, ScaleLevel::Opened),
                (Phase::Scaling, ScaleLevel::Closed),
            ]
        );
    }

    #[test]
    fn test_watch_holds_latest() {
        let store = PhaseStore::new();
        let rx = store.watch();
        store.set_phase(Phase::Saving);
        store.set_phase(Phase::Scaling);
        assert_eq!(rx.borrow().phase, Phase::Scaling);
    }

    #[test]
    fn test_return_to_idle_is_a_single_resting_update() {
        let store = PhaseStore::new();
        let seq = store.new_sequence();
        store.set_phase(Phase::Lifting);
        store.request_scale(ScaleLevel::Closed);
        store.request_cover_direction(CoverDirection::Close);
        let mut rx = store.subscribe();

        let snap = store.return_to_idle(true);

        let updates = drain(&mut rx);
        assert_eq!(updates, vec![snap]);
        assert!(snap.is_resting());
        assert!(snap.sequence > seq);
        assert_eq!(snap.cover_intent(), (CoverDirection::Open, 2));
    }

    #[test]
    fn test_return_to_idle_leaves_open_cover_trigger_alone() {
        let store = PhaseStore::new();
        let seq = store.new_sequence();
        store.set_phase(Phase::Saving);

        let snap = store.return_to_idle(false);
        assert!(snap.is_resting());
        assert_eq!(snap.sequence, seq);
        assert_eq!(snap.direction_trigger, 0);
    }

    #[test]
    fn test_clones_share_state() {
        let store = PhaseStore::new();
        let other = store.clone();
        other.set_phase(Phase::Lifting);
        assert_eq!(store.phase(), Phase::Lifting);
    }
}
