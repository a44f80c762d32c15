//! Parallel execution of transcripts using Rayon.
//!
//! Each transcript runs its own pipeline on a worker thread. Chunks inside
//! one transcript are still processed in sequence order; only whole calls
//! are spread across workers.
//!
//! # Design
//!
//! - `WorkerScaler` calculates the worker count from the number of transcripts
//! - `ParallelExecutor` runs a closure per transcript on a dedicated pool
//! - Progress is reported via `ProgressReporter` callback

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for worker scaling.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Minimum number of workers
    pub min_workers: usize,
    /// Maximum number of workers
    pub max_workers: usize,
    /// User override for worker count (takes precedence over CPU count)
    pub user_override: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 16,
            user_override: None,
        }
    }
}

/// Calculates the worker count for a batch of transcripts.
#[derive(Debug)]
pub struct WorkerScaler {
    config: WorkerConfig,
}

impl WorkerScaler {
    /// Create a new worker scaler with the given configuration.
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Create a worker scaler with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(WorkerConfig::default())
    }

    /// Workers for `transcript_count` transcripts.
    ///
    /// `min(transcripts, override or CPU count, max_workers)`, never below
    /// `min_workers`.
    pub fn calculate_workers(&self, transcript_count: usize) -> usize {
        let available = self.config.user_override.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

        transcript_count
            .min(available)
            .min(self.config.max_workers)
            .max(self.config.min_workers)
    }
}

/// Progress reporter for parallel analysis.
///
/// Thread-safe progress tracking using atomic operations.
pub struct ProgressReporter {
    /// Current count of completed transcripts
    completed: Arc<AtomicUsize>,
    /// Total number of transcripts
    total: usize,
    /// Optional callback for progress updates
    callback: Option<Box<dyn Fn(usize, usize) + Send + Sync>>,
}

impl ProgressReporter {
    /// Create a new progress reporter.
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
            callback: None,
        }
    }

    /// Create a progress reporter with a callback.
    pub fn with_callback<F>(total: usize, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
            callback: Some(Box::new(callback)),
        }
    }

    /// Report that one more transcript has been completed.
    ///
    /// Returns the new count of completed transcripts.
    pub fn report_progress(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(ref callback) = self.callback {
            callback(completed, self.total);
        }

        completed
    }

    /// Get current progress (completed, total).
    pub fn get_progress(&self) -> (usize, usize) {
        (self.completed.load(Ordering::SeqCst), self.total)
    }

    /// Get a clone of the completed counter for sharing across threads.
    pub fn completed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }
}

/// Runs one job per item on a dedicated thread pool.
pub struct ParallelExecutor {
    worker_count: usize,
}

impl ParallelExecutor {
    /// Create a new parallel executor.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Run `job` over every item. Results keep the input order.
    ///
    /// A single item or a single worker runs on the calling thread.
    pub fn execute<T, R, F>(&self, items: Vec<T>, progress: &ProgressReporter, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        if items.len() == 1 || self.worker_count == 1 {
            return Self::execute_sequential(items, progress, &job);
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .thread_name(|i| format!("analyzer-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create thread pool, processing sequentially");
                return Self::execute_sequential(items, progress, &job);
            }
        };

        pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let result = job(item);
                    progress.report_progress();
                    result
                })
                .collect()
        })
    }

    fn execute_sequential<T, R, F>(items: Vec<T>, progress: &ProgressReporter, job: &F) -> Vec<R>
    where
        F: Fn(T) -> R,
    {
        items
            .into_iter()
            .map(|item| {
                let result = job(item);
                progress.report_progress();
                result
            })
            .collect()
    }
}
