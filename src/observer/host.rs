//! Mounting a visual layer on a phase store.

use super::{SettleHandle, VisualLayer};
use crate::phase::{SequenceId, Settle};
use crate::store::{PhaseSnapshot, PhaseStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct ObserverHost;

impl ObserverHost {
    /// Mount `layer` on `store`.
    ///
    /// The layer renders the current snapshot immediately, so mounting in the
    /// middle of a sequence resumes the phase that is already running.
    pub fn mount<L: VisualLayer>(
        store: &PhaseStore,
        settle: SettleHandle,
        layer: L,
    ) -> MountedObserver<L> {
        let name = layer.name().to_string();
        let layer = Arc::new(Mutex::new(layer));
        // Subscribe before reading the snapshot so no update falls in between.
        let updates = store.subscribe();
        let task = tokio::spawn(run_layer(
            name.clone(),
            store.clone(),
            updates,
            layer.clone(),
            settle,
        ));
        MountedObserver { name, layer, task }
    }
}

/// A mounted layer. Dropping it unmounts the layer.
pub struct MountedObserver<L> {
    name: String,
    layer: Arc<Mutex<L>>,
    task: JoinHandle<()>,
}

impl<L> MountedObserver<L> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the layer's presentation state.
    pub fn inspect<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        f(&lock(&self.layer))
    }

    pub fn is_mounted(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop rendering. Pending completion callbacks never fire.
    pub fn unmount(self) {}
}

impl<L> Drop for MountedObserver<L> {
    fn drop(&mut self) {
        debug!(layer = %self.name, "unmounting visual layer");
        self.task.abort();
    }
}

struct PendingMotion {
    sequence: SequenceId,
    settle: Settle,
    deadline: Instant,
}

async fn run_layer<L: VisualLayer>(
    name: String,
    store: PhaseStore,
    mut updates: tokio::sync::broadcast::Receiver<PhaseSnapshot>,
    layer: Arc<Mutex<L>>,
    settle: SettleHandle,
) {
    let mut pending = render(&layer, &store.snapshot());

    loop {
        let deadline = pending.as_ref().map(|p| p.deadline);
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if let Some(motion) = render(&layer, &snapshot) {
                        pending = Some(motion);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(layer = %name, skipped, "visual layer lagged, resyncing from store");
                    if let Some(motion) = render(&layer, &store.snapshot()) {
                        pending = Some(motion);
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(motion) = pending.take() {
                    debug!(layer = %name, sequence = %motion.sequence, settle = %motion.settle, "motion settled");
                    settle.notify(motion.sequence, motion.settle);
                }
            }
        }
    }
}

fn render<L: VisualLayer>(layer: &Mutex<L>, snapshot: &PhaseSnapshot) -> Option<PendingMotion> {
    lock(layer).render(snapshot).map(|motion| PendingMotion {
        sequence: snapshot.sequence,
        settle: motion.settle,
        deadline: Instant::now() + motion.duration,
    })
}

fn lock<L>(layer: &Mutex<L>) -> MutexGuard<'_, L> {
    layer.lock().unwrap_or_else(PoisonError::into_inner)
}
