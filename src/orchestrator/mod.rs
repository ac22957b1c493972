mod allocation_csv_parser;

pub use allocation_csv_parser::{allocation_parser, parse_units, DEFAULT_DECIMALS};

use futures::future::join_all;
use std::{cmp::min, error::Error};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::aggregation_merkle_tree::AggregationMerkleTree;
use crate::executor::ExecutorSpawner;
use crate::json_tree::JsonAllocation;
use crate::merkle_tree::MerkleTree;

pub struct Orchestrator {
    executor_spawner: Box<dyn ExecutorSpawner>,
    allocation_csvs: Vec<String>,
    decimals: u32,
}

impl Orchestrator {
    pub fn new(executor_spawner: Box<dyn ExecutorSpawner>, allocation_csvs: Vec<String>) -> Self {
        Self {
            executor_spawner,
            allocation_csvs,
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Sets the number of decimals used to scale the CSV amounts into base units.
    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    // Calculate the range of tasks to be assigned to a executor.
    //
    // * `executor_index` - The index of the executor.
    // * `total_executors` - The total number of executor.
    //
    // A tuple representing the start and end indices of the tasks assigned to the executor
    fn calculate_task_range(
        &self,
        executor_index: usize,
        total_executors: usize,
    ) -> (usize, usize) {
        let total_tasks = self.allocation_csvs.len();
        let base_tasks_per_executor = total_tasks / total_executors;
        let extra_tasks = total_tasks % total_executors;

        let start = executor_index * base_tasks_per_executor + min(executor_index, extra_tasks);
        let end =
            (executor_index + 1) * base_tasks_per_executor + min(executor_index + 1, extra_tasks);

        (start, min(end, total_tasks))
    }

    /// Processes a list of allocation CSV files concurrently using executors and aggregates the results.
    ///
    /// * `executor_count` - The number of executors to use.
    ///
    /// Data flow
    ///
    /// 1. Splits the list of CSV files into contiguous segments, one per executor.
    /// 2. A distribution task parses each CSV file of its segment into allocations and sends them to `allocations_tx`.
    /// 3. Each executor receives allocations from `allocations_rx`, requests a mini tree from its worker, and sends it back through `tree_tx`.
    /// 4. The mini trees, collected from `tree_rx` in CSV order, are aggregated into an `AggregationMerkleTree`.
    /// 5. After processing, executors are terminated to release resources.
    ///
    /// Any parse or worker failure cancels every task and the call returns an error.
    pub async fn create_aggregation_tree(
        self,
        executor_count: usize,
    ) -> Result<AggregationMerkleTree, Box<dyn Error>> {
        if self.allocation_csvs.is_empty() {
            return Err("No allocation CSV files given".into());
        }
        if executor_count == 0 {
            return Err("Executor count must be at least one".into());
        }

        let mut executors = Vec::new();
        let mut result_collectors = Vec::new();

        let channel_size = std::env::var("CHANNEL_SIZE")
            .unwrap_or_default()
            .parse::<usize>()
            .unwrap_or(32);

        let cancel_token = CancellationToken::new();
        let actual_number_of_workers = min(executor_count, self.allocation_csvs.len());
        for i in 0..actual_number_of_workers {
            // Declare channels for communication
            //
            // - `allocations_tx` carries parsed chunks from the distribution task to the executor.
            // - `tree_tx` carries the mini trees built by the executor's worker.
            //
            let (allocations_tx, mut allocations_rx) =
                mpsc::channel::<Vec<JsonAllocation>>(channel_size);
            let (tree_tx, tree_rx) = mpsc::channel::<MerkleTree>(channel_size);

            let executor = match self.executor_spawner.spawn_executor().await {
                Ok(executor) => executor,
                Err(e) => {
                    error!("Executor_{}: failed to spawn: {}", i, e);
                    // stop the executors and distributors already running
                    cancel_token.cancel();
                    self.executor_spawner.terminate_executors().await;
                    return Err(e.into());
                }
            };
            debug!("Executor_{}: connected to {}", i, executor.get_url());

            // Each executor owns a contiguous range of CSV files; its results start at `start`.
            let (start, end) = self.calculate_task_range(i, actual_number_of_workers);
            result_collectors.push((start, end, tree_rx));

            let cloned_cancel_token = cancel_token.clone();
            executors.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        allocations_data = allocations_rx.recv() => {
                            // When the distribution task is finished, the channel will be closed.
                            let allocations = match allocations_data {
                                Some(allocations) => allocations,
                                None => break,
                            };
                            let mini_tree = match executor.generate_tree(allocations).await {
                                Ok(mini_tree) => mini_tree,
                                Err(e) => {
                                    error!("Executor_{}: error while processing allocations: {}", i, e);
                                    cloned_cancel_token.cancel();
                                    break;
                                }
                            };
                            if tree_tx.send(mini_tree).await.is_err() {
                                error!("Executor_{}: error while sending tree result", i);
                                cloned_cancel_token.cancel();
                                break;
                            }
                        },
                        _ = cloned_cancel_token.cancelled() => {
                            warn!("Executor_{}: cancel signal received, terminating.", i);
                            break;
                        },
                    }
                }
            }));

            // Distributing Tasks
            //
            // - Loads each CSV file of the range.
            // - Parses it into allocations.
            // - Sends them to the executor via `allocations_tx`.
            //
            let allocation_csvs_slice = self.allocation_csvs[start..end].to_vec();
            let decimals = self.decimals;

            let cloned_cancel_token = cancel_token.clone();
            tokio::spawn(async move {
                for file_path in allocation_csvs_slice.iter() {
                    let allocations = match allocation_parser(file_path, decimals) {
                        Ok(allocations) => allocations
                            .iter()
                            .map(JsonAllocation::from_allocation)
                            .collect::<Vec<JsonAllocation>>(),
                        Err(e) => {
                            error!(
                                "Executor_{}: error while processing file {}: {}",
                                i, file_path, e
                            );
                            cloned_cancel_token.cancel();
                            break;
                        }
                    };

                    tokio::select! {
                        _ = cloned_cancel_token.cancelled() => {
                            warn!("Executor_{}: cancel signal received, terminating distributor.", i);
                            break;
                        },
                        send_allocations = allocations_tx.send(allocations) => {
                            if let Err(e) = send_allocations {
                                error!("Executor_{}: error while sending allocations: {}", i, e);
                                cloned_cancel_token.cancel();
                                break;
                            }
                        }
                    }
                }
                drop(allocations_tx);
            });
        }

        // Collecting Results
        //
        //  - Receives mini trees from each `tree_rx` channel.
        //  - Places them at the position of the CSV file they were built from.
        //
        let mut all_tree_responses = Vec::new();
        for (start, end, mut tree_rx) in result_collectors {
            let executor_results = tokio::spawn(async move {
                let mut trees = Vec::new();
                while let Some(result) = tree_rx.recv().await {
                    trees.push(result);
                }
                (start, end, trees)
            });
            all_tree_responses.push(executor_results);
        }

        let all_tree_results = join_all(all_tree_responses).await;

        // Terminate executors
        self.executor_spawner.terminate_executors().await;

        if cancel_token.is_cancelled() {
            return Err("Building mini trees was cancelled, see the executor logs".into());
        }

        let mut ordered_tree_results = vec![None; self.allocation_csvs.len()];
        for result in all_tree_results {
            let (start, end, worker_results) = result?;
            if worker_results.len() != end - start {
                return Err(format!(
                    "Executor for CSV files {}..{} returned {} mini trees",
                    start,
                    end,
                    worker_results.len()
                )
                .into());
            }
            for (i, tree) in worker_results.into_iter().enumerate() {
                ordered_tree_results[start + i] = Some(tree);
            }
        }

        let all_merkle_tree: Vec<MerkleTree> = ordered_tree_results.into_iter().flatten().collect();

        // Occur error if the number of mini_tree in 'all_merkle_tree' is not equal to the number of allocation_csvs.
        if all_merkle_tree.len() != self.allocation_csvs.len() {
            return Err("Mismatch in generated mini tree counts and given CSV counts".into());
        }

        Ok(AggregationMerkleTree::new(all_merkle_tree)?)
    }
}
