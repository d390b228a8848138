//! Dwell-timer scheduling keyed by sequence id.
//!
//! Every timer armed for a sequence shares that sequence's cancellation token.
//! Beginning a new sequence or cancelling the current one stops all of them at
//! once. The driver still re-checks the sequence id when a timer fires, so a
//! timer that raced past cancellation is harmless.

use crate::phase::SequenceId;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DwellScheduler {
    current: Option<(SequenceId, CancellationToken)>,
}

impl DwellScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `sequence` the one timers may be armed for, cancelling any previous one.
    pub fn begin(&mut self, sequence: SequenceId) {
        self.cancel();
        self.current = Some((sequence, CancellationToken::new()));
    }

    /// Cancel every outstanding timer.
    pub fn cancel(&mut self) {
        if let Some((sequence, token)) = self.current.take() {
            debug!(sequence = %sequence, "cancelling dwell timers");
            token.cancel();
        }
    }

    #[cfg(test)]
    pub fn active(&self) -> Option<SequenceId> {
        self.current.as_ref().map(|(sequence, _)| *sequence)
    }

    /// Run `fire` after `delay` unless the sequence is cancelled first.
    ///
    /// Returns `false` without scheduling anything if `sequence` is not the
    /// active one.
    pub fn schedule<F>(&self, sequence: SequenceId, delay: Duration, fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let token = match &self.current {
            Some((active, token)) if *active == sequence => token.clone(),
            _ => return false,
        };

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => fire(),
            }
        });
        true
    }
}

impl Drop for DwellScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(AtomicU32::new(0));
        let c = fired.clone();
        (fired, move || {
            let c = c.clone();
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (fired, make) = counter();
        let mut timers = DwellScheduler::new();
        let seq = SequenceId::new(1);
        timers.begin(seq);

        assert!(timers.schedule(seq, Duration::from_millis(300), make()));
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_cancels_previous_sequence() {
        let (fired, make) = counter();
        let mut timers = DwellScheduler::new();
        timers.begin(SequenceId::new(1));
        timers.schedule(SequenceId::new(1), Duration::from_millis(100), make());

        timers.begin(SequenceId::new(2));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.active(), Some(SequenceId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_rejects_inactive_sequence() {
        let (fired, make) = counter();
        let mut timers = DwellScheduler::new();
        timers.begin(SequenceId::new(4));

        assert!(!timers.schedule(SequenceId::new(3), Duration::from_millis(1), make()));
        timers.cancel();
        assert!(!timers.schedule(SequenceId::new(4), Duration::from_millis(1), make()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.active(), None);
    }
}
