use std::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::{AirdropError, Result};
use crate::executor::{Executor, ExecutorSpawner};

/// RemoteSpawner
///
/// Connects executors to mini-tree workers that are already running, typically on other machines.
/// Executors are assigned to `worker_node_url` round-robin, so asking for more executors than there
/// are workers shares workers between executors. Workers are never stopped by this spawner.
pub struct RemoteSpawner {
    worker_counter: AtomicUsize,
    worker_node_url: Vec<String>,
}

impl RemoteSpawner {
    pub fn new(worker_node_url: Vec<String>) -> Result<Self> {
        if worker_node_url.is_empty() {
            return Err(AirdropError::WorkerUnavailable(
                "worker node url list is empty".to_string(),
            ));
        }
        Ok(RemoteSpawner {
            worker_counter: AtomicUsize::new(0),
            worker_node_url,
        })
    }

    fn normalize_url(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }
}

impl ExecutorSpawner for RemoteSpawner {
    fn spawn_executor(&self) -> Pin<Box<dyn Future<Output = Result<Executor>> + Send>> {
        let id = self.worker_counter.fetch_add(1, Ordering::SeqCst);
        let url = Self::normalize_url(&self.worker_node_url[id % self.worker_node_url.len()]);

        Box::pin(async move { Ok(Executor::new(url, Some(format!("worker_{}", id)))) })
    }

    fn terminate_executors(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            // Remote workers outlive the orchestration run
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_robin_urls() {
        let spawner = RemoteSpawner::new(vec![
            "10.0.0.1:4000".to_string(),
            "https://worker.example:4000".to_string(),
        ])
        .unwrap();

        let executor_1 = spawner.spawn_executor().await.unwrap();
        let executor_2 = spawner.spawn_executor().await.unwrap();
        let executor_3 = spawner.spawn_executor().await.unwrap();

        assert_eq!(executor_1.get_url(), "http://10.0.0.1:4000");
        assert_eq!(executor_2.get_url(), "https://worker.example:4000");
        assert_eq!(executor_3.get_url(), "http://10.0.0.1:4000");
        assert_eq!(executor_3.get_name(), Some("worker_2".to_string()));
    }

    #[test]
    fn test_empty_urls() {
        assert!(matches!(
            RemoteSpawner::new(vec![]),
            Err(AirdropError::WorkerUnavailable(_))
        ));
    }
}
