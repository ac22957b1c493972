use std::{future::Future, pin::Pin};

use crate::error::Result;
use crate::executor::Executor;

/// Provides the executors an `Orchestrator` hands chunks to.
///
/// `spawn_executor` resolves once the worker behind the executor is reachable, or with
/// `WorkerUnavailable` if no worker could be provided.
/// `terminate_executors` releases every worker this spawner started; workers it
/// only connected to are left running.
pub trait ExecutorSpawner: Send + Sync {
    fn spawn_executor(&self) -> Pin<Box<dyn Future<Output = Result<Executor>> + Send>>;

    fn terminate_executors(&self) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}
