use axum::{routing::post, Router};
use parking_lot::Mutex;
use std::{
    future::Future,
    net::{SocketAddr, TcpListener},
    pin::Pin,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::error;

use crate::error::{AirdropError, Result};
use crate::executor::{Executor, ExecutorSpawner};
use crate::mini_tree_generator::create_mini_tree;

/// MockSpawner
///
/// Runs mini-tree workers inside the current process, each on its own ephemeral local port.
/// When `urls` is given, the first executors connect to those addresses instead and only
/// the remaining ones get an in-process worker.
pub struct MockSpawner {
    urls: Option<Vec<String>>,
    worker_counter: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MockSpawner {
    pub fn new(urls: Option<Vec<String>>) -> Self {
        MockSpawner {
            urls,
            worker_counter: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
        }
    }
}

impl ExecutorSpawner for MockSpawner {
    fn spawn_executor(&self) -> Pin<Box<dyn Future<Output = Result<Executor>> + Send>> {
        let id = self.worker_counter.fetch_add(1, Ordering::SeqCst);

        // If urls is not None, use the urls to spawn executors
        if let Some(url) = self.urls.as_ref().and_then(|urls| urls.get(id)) {
            let worker_url = format!("http://{}", url);
            return Box::pin(async move { Ok(Executor::new(worker_url, None)) });
        }

        // if there is no url or already used all urls, spawn a new worker
        let (tx, rx) = oneshot::channel();
        let worker = tokio::spawn(async move {
            let app = Router::new().route("/", post(create_mini_tree));

            let server = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
                .and_then(|listener| Ok((listener.local_addr()?, listener)))
                .map_err(|e| e.to_string())
                .and_then(|(addr, listener)| {
                    axum::Server::from_tcp(listener)
                        .map(|builder| (addr, builder))
                        .map_err(|e| e.to_string())
                });
            let (addr, builder) = match server {
                Ok(server) => server,
                Err(e) => {
                    error!("Mock worker {}: failed to bind: {}", id, e);
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            // send worker address to rx
            let _ = tx.send(Ok(addr));

            if let Err(e) = builder.serve(app.into_make_service()).await {
                error!("Mock worker {}: server stopped: {}", id, e);
            }
        });
        self.workers.lock().push(worker);

        // Return a Future that resolves to Executor
        Box::pin(async move {
            let addr = rx
                .await
                .map_err(|_| {
                    AirdropError::WorkerUnavailable(format!(
                        "mock worker {} exited before binding",
                        id
                    ))
                })?
                .map_err(|e| {
                    AirdropError::WorkerUnavailable(format!("mock worker {}: {}", id, e))
                })?;
            Ok(Executor::new(
                format!("http://{}", addr),
                Some(format!("mock_worker_{}", id)),
            ))
        })
    }

    fn terminate_executors(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let workers = std::mem::take(&mut *self.workers.lock());
        Box::pin(async move {
            for worker in workers {
                worker.abort();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_urls() {
        let spawner = MockSpawner::new(None);

        // Spawn 2 executors
        let executor_1 = spawner.spawn_executor().await.unwrap();
        let executor_2 = spawner.spawn_executor().await.unwrap();

        assert!(executor_1.get_url().starts_with("http://127.0.0.1:"));
        assert_ne!(executor_1.get_url(), executor_2.get_url());
        assert_eq!(executor_2.get_name(), Some("mock_worker_1".to_string()));

        spawner.terminate_executors().await;
    }

    #[tokio::test]
    async fn test_with_given_url() {
        let urls = vec!["127.0.0.1:7878".to_string()];
        let spawner = MockSpawner::new(Some(urls));

        // Spawn 2 executors
        let executor_1 = spawner.spawn_executor().await.unwrap();
        let executor_2 = spawner.spawn_executor().await.unwrap();

        assert_eq!(executor_1.get_url(), "http://127.0.0.1:7878");
        assert_eq!(executor_1.get_name(), None);
        assert!(executor_2.get_url().starts_with("http://127.0.0.1:"));
        assert_ne!(executor_2.get_url(), "http://127.0.0.1:7878");

        spawner.terminate_executors().await;
    }
}
