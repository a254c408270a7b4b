//! Global concurrency semaphore bounding in-flight Process Runner
//! invocations across the entire Run, including fan-out sub-tasks.

use crate::cancellation::Cancellation;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    pub permits: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self { permits: 10 }
    }
}

/// A held permit. Dropping it releases the slot back to the Governor.
pub struct Permit(#[allow(dead_code)] OwnedSemaphorePermit);

#[derive(Clone)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.permits)),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire one slot, or return `None` if `cancellation` fires first.
    /// A stopping Run must not let pending Stages stall on acquisition.
    pub async fn acquire(&self, cancellation: &Cancellation) -> Option<Permit> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => {
                permit.ok().map(Permit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquires_up_to_permit_count_concurrently() {
        let governor = Governor::new(GovernorConfig { permits: 2 });
        let cancellation = Cancellation::new();
        let p1 = governor.acquire(&cancellation).await.unwrap();
        let p2 = governor.acquire(&cancellation).await.unwrap();
        assert_eq!(governor.available_permits(), 0);
        drop(p1);
        assert_eq!(governor.available_permits(), 1);
        drop(p2);
    }

    #[tokio::test]
    async fn cancellation_releases_a_waiting_acquirer() {
        let governor = Governor::new(GovernorConfig { permits: 1 });
        let cancellation = Cancellation::new();
        let _held = governor.acquire(&cancellation).await.unwrap();

        let waiter_cancellation = cancellation.clone();
        let waiter_governor = governor.clone();
        let handle = tokio::spawn(async move { waiter_governor.acquire(&waiter_cancellation).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancellation.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancellation should unblock the waiter promptly")
            .unwrap();
        assert!(result.is_none());
    }
}
