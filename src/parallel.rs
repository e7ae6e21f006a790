//! Parallel processing configuration
//!
//! Column work within a row is sharded across a Rayon pool. A run either uses
//! the global pool or a dedicated pool of a fixed size.

use crate::errors::{Result, SeriesError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Build a dedicated pool, or `None` to run on the global pool
    ///
    /// # Errors
    ///
    /// Returns an error if the thread count is zero or the pool cannot start.
    pub fn build_pool(&self) -> Result<Option<ThreadPool>> {
        let Some(num_threads) = self.num_threads else {
            debug!(
                "using the global thread pool ({} threads)",
                rayon::current_num_threads()
            );
            return Ok(None);
        };
        if num_threads == 0 {
            return Err(SeriesError::ThreadPool(
                "thread count must be at least 1".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("rseries-{i}"))
            .build()
            .map_err(|e| {
                SeriesError::ThreadPool(format!(
                    "failed to initialize thread pool with {num_threads} threads: {e}"
                ))
            })?;
        debug!("configured parallel processing with {} threads", num_threads);
        Ok(Some(pool))
    }
}

/// Run `op` inside `pool` if there is one
pub fn in_pool<R, F>(pool: Option<&ThreadPool>, op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_global_pool() {
        let pool = ParallelConfig::default().build_pool().unwrap();
        assert!(pool.is_none());
    }

    #[test]
    fn dedicated_pool_has_requested_size() {
        let pool = ParallelConfig::with_threads(2).build_pool().unwrap().unwrap();
        let threads = in_pool(Some(&pool), rayon::current_num_threads);
        assert_eq!(threads, 2);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(ParallelConfig::with_threads(0).build_pool().is_err());
    }

    #[test]
    fn parallel_info_is_positive() {
        let info = get_parallel_info();
        assert!(info.current_threads > 0);
        assert!(info.available_cores > 0);
    }
}
