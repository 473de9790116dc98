//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that long-running work checks between steps.
///
/// Clones observe the same flag. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_spawned_task_observes_cancel() {
        tokio_test::block_on(async {
            let token = CancellationToken::new();
            let worker = token.clone();
            let handle = tokio::spawn(async move {
                let mut spins = 0usize;
                while !worker.is_cancelled() {
                    spins += 1;
                    tokio::task::yield_now().await;
                }
                spins
            });
            token.cancel();
            assert!(handle.await.is_ok());
        });
    }
}
