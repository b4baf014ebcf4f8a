use std::sync::OnceLock;

use crate::env::env_count;

/// A wrapper around the Rayon thread pool used for parallel block access.
///
/// If the pool could not be created, operations run directly on the calling
/// thread.
pub struct ThreadPool {
    /// The wrapped thread pool, or None if we failed to construct one.
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPool {
    /// Run a function in the thread pool.
    ///
    /// This corresponds to [`rayon::ThreadPool::install`]. Parallel iterators
    /// used inside `op` run on this pool's threads.
    pub fn run<R: Send, Op: FnOnce() -> R + Send>(&self, op: Op) -> R {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(op)
        } else {
            op()
        }
    }

    /// Create a thread pool with a given number of threads.
    pub fn with_num_threads(num_threads: usize) -> ThreadPool {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("rten-blocks-{}", index))
            .build();
        if let Err(err) = &pool {
            tracing::warn!(%err, "failed to create thread pool, blocks will be accessed serially");
        }
        ThreadPool { pool: pool.ok() }
    }

    /// Return the number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or(1)
    }
}

/// Return the number of threads to use when `RTEN_BLOCKS_NUM_THREADS` is not
/// set.
fn default_thread_count() -> usize {
    num_cpus::get_physical().max(1)
}

/// Return the [Rayon][rayon] thread pool used to fetch and write blocks when
/// [`AccessOptions::parallel`](crate::AccessOptions::parallel) is set.
///
/// The thread count defaults to the number of physical cores. It can be
/// overridden by setting the `RTEN_BLOCKS_NUM_THREADS` environment variable,
/// whose value is clamped to the logical core count.
///
/// [rayon]: https://github.com/rayon-rs/rayon
pub fn thread_pool() -> &'static ThreadPool {
    static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();
    THREAD_POOL.get_or_init(|| {
        let num_threads = env_count("RTEN_BLOCKS_NUM_THREADS")
            .map(|n| n.min(num_cpus::get().max(1)))
            .unwrap_or_else(default_thread_count);
        tracing::debug!(num_threads, "creating block access thread pool");
        ThreadPool::with_num_threads(num_threads)
    })
}

#[cfg(test)]
mod tests {
    use super::{default_thread_count, thread_pool, ThreadPool};

    #[test]
    fn test_default_thread_count() {
        let count = default_thread_count();
        assert!(count >= 1 && count <= num_cpus::get_physical().max(1));
    }

    #[test]
    fn test_thread_pool_run() {
        let pool = ThreadPool::with_num_threads(2);
        assert_eq!(pool.num_threads(), 2);

        let name = pool.run(|| std::thread::current().name().map(|s| s.to_string()));
        assert!(name.is_some_and(|name| name.starts_with("rten-blocks-")));

        assert!(thread_pool().num_threads() >= 1);
    }
}
