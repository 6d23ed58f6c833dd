use crate::{Result, SchedulerError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio_util::sync::CancellationToken;

/// Default number of concurrent node evaluations per request
pub const DEFAULT_PARALLELISM: usize = 16;

/// Build the worker pool shared by every request
pub fn build_pool(workers: usize) -> Result<ThreadPool> {
    let workers = workers.max(1);
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("loadgate-worker-{}", index))
        .build()
        .map_err(|e| SchedulerError::worker_pool(workers, e.to_string()))
}

/// Run `do_work(0..pieces)` on `pool`.
///
/// Once `token` is cancelled, pieces not yet started are skipped; pieces
/// already running finish normally. Returns when every piece is done or
/// skipped.
pub fn parallelize_until<F>(
    pool: &ThreadPool,
    token: Option<&CancellationToken>,
    pieces: usize,
    do_work: F,
) where
    F: Fn(usize) + Sync,
{
    pool.install(|| {
        (0..pieces).into_par_iter().for_each(|piece| {
            if token.is_some_and(|t| t.is_cancelled()) {
                return;
            }
            do_work(piece);
        });
    });
}

/// Map every index in `0..pieces` on `pool`, keeping index order in the output
pub fn parallel_map<R, F>(pool: &ThreadPool, pieces: usize, map: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    pool.install(|| (0..pieces).into_par_iter().map(map).collect())
}
