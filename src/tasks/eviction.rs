//! Eviction Task
//!
//! Background task that periodically enforces the runtime cache budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::worker::LifecycleController;

/// Spawns a background task that periodically evicts least recently used
/// runtime entries once the cache is over budget.
///
/// Eviction also runs opportunistically on the write path; this task covers
/// quiet periods. The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_eviction_task(controller.clone(), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_eviction_task(
    controller: Arc<LifecycleController>,
    eviction_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(eviction_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting eviction task with interval of {} seconds",
            eviction_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match controller.enforce_budget().await {
                Ok(0) => debug!("Eviction: runtime cache within budget"),
                Ok(evicted) => info!("Eviction: removed {} runtime entries", evicted),
                Err(e) => warn!("Eviction run failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, ManualClock, MemoryCacheStorage, Request, Response};
    use crate::error::{OfflineError, Result};
    use crate::storage::{Database, DatabaseSchema, MemoryBackend};
    use crate::worker::{Network, WorkerConfig};
    use async_trait::async_trait;
    use url::Url;

    struct Unreachable;

    #[async_trait]
    impl Network for Unreachable {
        async fn fetch(&self, _request: &Request) -> Result<Response> {
            Err(OfflineError::NetworkFailure("unreachable".into()))
        }
    }

    async fn controller(max_bytes: u64) -> (Arc<LifecycleController>, Arc<MemoryCacheStorage>) {
        let db = Database::open(Arc::new(MemoryBackend::new()), DatabaseSchema::default())
            .await
            .unwrap();
        let caches = Arc::new(MemoryCacheStorage::new());
        let config = WorkerConfig::new("1", Url::parse("http://localhost:3000").unwrap())
            .with_max_runtime_bytes(max_bytes);
        let controller = LifecycleController::new(
            config,
            caches.clone(),
            Arc::new(Unreachable),
            db,
            Arc::new(ManualClock::new(1)),
        );
        (Arc::new(controller), caches)
    }

    #[tokio::test]
    async fn test_eviction_task_trims_runtime_cache() {
        let (controller, caches) = controller(10).await;
        for key in ["GET /a.js", "GET /b.js", "GET /c.js"] {
            caches
                .put("runtime-v1", key, Response::new(200, vec![0u8; 8]))
                .await
                .unwrap();
        }

        let handle = spawn_eviction_task(controller.clone(), 1);

        // Wait for at least one eviction run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let keys = caches.keys("runtime-v1").await.unwrap();
        assert_eq!(keys, vec!["GET /c.js".to_string()]);
        assert_eq!(controller.stats().await.evictions, 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_eviction_task_leaves_cache_within_budget() {
        let (controller, caches) = controller(1024).await;
        caches
            .put("runtime-v1", "GET /a.js", Response::new(200, vec![0u8; 8]))
            .await
            .unwrap();

        let handle = spawn_eviction_task(controller.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(caches.keys("runtime-v1").await.unwrap().len(), 1);
        assert_eq!(controller.stats().await.evictions, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_eviction_task_can_be_aborted() {
        let (controller, _) = controller(1024).await;

        let handle = spawn_eviction_task(controller, 1);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
