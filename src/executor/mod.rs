mod executor;
mod mock_spawner;
mod remote_spawner;
mod spawner;

pub use executor::Executor;
pub use mock_spawner::MockSpawner;
pub use remote_spawner::RemoteSpawner;
pub use spawner::ExecutorSpawner;
