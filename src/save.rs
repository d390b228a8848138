//! Save Action adapter.
//!
//! A save action wraps the real persistence call as a no-argument async
//! function. The orchestrator invokes it exactly once per sequence, on entering
//! `saving`, and never retries it. Any closure returning a
//! `Future<Output = anyhow::Result<()>>` is a save action.

use crate::errors::TransitionError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// One-shot persistence call gating the `saving -> scaling` edge.
#[async_trait]
pub trait SaveAction: Send + 'static {
    async fn save(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> SaveAction for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn save(self: Box<Self>) -> anyhow::Result<()> {
        (*self)().await
    }
}

/// Bound a save action's latency.
///
/// The orchestrator itself never times a save out; a caller that needs bounded
/// latency wraps the action before handing it over. On expiry the wrapped
/// action rejects with [`TransitionError::StuckSequence`].
pub fn with_timeout<A: SaveAction>(action: A, limit: Duration) -> impl SaveAction {
    move || async move {
        match tokio::time::timeout(limit, Box::new(action).save()).await {
            Ok(result) => result,
            Err(_) => Err(TransitionError::StuckSequence { waited: limit }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_closure_is_a_save_action() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let action = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        };

        Box::new(action).save().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let action = || async { Err::<(), _>(anyhow::anyhow!("quota exceeded")) };
        let err = Box::new(action).save().await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_rejects_stuck_save() {
        let stuck = || async {
            std::future::pending::<()>().await;
            anyhow::Ok(())
        };
        let bounded = with_timeout(stuck, Duration::from_secs(2));

        let err = Box::new(bounded).save().await.unwrap_err();
        match err.downcast_ref::<TransitionError>() {
            Some(TransitionError::StuckSequence { waited }) => {
                assert_eq!(*waited, Duration::from_secs(2))
            }
            other => panic!("Expected StuckSequence, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_passes_fast_save() {
        let quick = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            anyhow::Ok(())
        };
        let bounded = with_timeout(quick, Duration::from_secs(1));
        assert!(Box::new(bounded).save().await.is_ok());
    }
}
