use crate::env::env_flag;

/// Options that control how a view reads and writes blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessOptions {
    /// Fetch or write the blocks touched by an operation in parallel, using
    /// the pool returned by [`thread_pool`](crate::thread_pool).
    ///
    /// The result of an operation is the same in either mode. When a write
    /// fails, the set of blocks that were already written may differ.
    ///
    /// The default is read from the `RTEN_BLOCKS_PARALLEL` environment
    /// variable, and is false if that is unset.
    pub parallel: bool,
}

impl AccessOptions {
    /// Return options which access one block at a time, in row-major order of
    /// block coordinates.
    pub fn sequential() -> AccessOptions {
        AccessOptions { parallel: false }
    }

    /// Return options which access blocks in parallel.
    pub fn parallel() -> AccessOptions {
        AccessOptions { parallel: true }
    }
}

impl Default for AccessOptions {
    fn default() -> AccessOptions {
        AccessOptions {
            parallel: env_flag("RTEN_BLOCKS_PARALLEL", false),
        }
    }
}
