/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

use std::thread;

use log::debug;

/// Maps data-parallel kernels across an index range.
///
/// The viewshed algorithms are fleets of independent rays or ring cells;
/// everything they need from the platform is "run this kernel once per
/// index". Kernels read the elevation grid and write shared grids whose
/// stores are either idempotent under race or cell-unique, so an executor
/// is free to run them in any order and on any number of workers.
///
/// Both dispatch methods return only after every index has run, which is
/// the happens-before edge the ring-by-ring wavefront relies on: writes
/// from one dispatch are visible to the next.
pub trait Executor: Sync {
    /// Runs `kernel(i)` for each `i` in `[0, n)`, in no guaranteed order.
    fn dispatch_1d(&self, n: usize, kernel: &(dyn Fn(usize) + Sync));

    /// As `dispatch_1d`, but the index range is grouped into tiles of at
    /// most `tile_size` indices. Each tile runs on a single worker as one
    /// `kernel(tile_start, tile_len)` call and iterates its indices
    /// sequentially, so the kernel may stage shared reads into a
    /// tile-local scratch buffer before evaluating.
    fn dispatch_1d_tiled(&self, n: usize, tile_size: usize, kernel: &(dyn Fn(usize, usize) + Sync));

    /// Blocks until all previously dispatched work is complete. The
    /// built-in executors dispatch synchronously, so this is a no-op for
    /// them; call sites that require the ordering still say so explicitly.
    fn barrier(&self) {}
}

/// Executor backed by scoped worker threads. Indices are striped across
/// workers (`i % num_procs == tid`), which keeps neighbouring rays on
/// different workers and the per-worker load even without a work queue.
pub struct ThreadPoolExecutor {
    num_procs: usize,
}

impl ThreadPoolExecutor {
    pub fn new(num_procs: usize) -> ThreadPoolExecutor {
        let num_procs = num_procs.max(1);
        debug!("thread-pool executor with {} workers", num_procs);
        ThreadPoolExecutor { num_procs }
    }

    pub fn num_procs(&self) -> usize {
        self.num_procs
    }
}

impl Default for ThreadPoolExecutor {
    fn default() -> ThreadPoolExecutor {
        ThreadPoolExecutor::new(num_cpus::get())
    }
}

impl Executor for ThreadPoolExecutor {
    fn dispatch_1d(&self, n: usize, kernel: &(dyn Fn(usize) + Sync)) {
        let num_procs = self.num_procs;
        if n == 0 {
            return;
        }
        if num_procs == 1 || n == 1 {
            for i in 0..n {
                kernel(i);
            }
            return;
        }
        thread::scope(|s| {
            for tid in 0..num_procs.min(n) {
                s.spawn(move || {
                    for i in (0..n).filter(|i| i % num_procs == tid) {
                        kernel(i);
                    }
                });
            }
        });
    }

    fn dispatch_1d_tiled(&self, n: usize, tile_size: usize, kernel: &(dyn Fn(usize, usize) + Sync)) {
        assert!(tile_size > 0, "tile size must be non-zero");
        let num_procs = self.num_procs;
        let num_tiles = (n + tile_size - 1) / tile_size;
        if num_tiles == 0 {
            return;
        }
        if num_procs == 1 || num_tiles == 1 {
            for t in 0..num_tiles {
                let start = t * tile_size;
                kernel(start, tile_size.min(n - start));
            }
            return;
        }
        thread::scope(|s| {
            for tid in 0..num_procs.min(num_tiles) {
                s.spawn(move || {
                    for t in (0..num_tiles).filter(|t| t % num_procs == tid) {
                        let start = t * tile_size;
                        kernel(start, tile_size.min(n - start));
                    }
                });
            }
        });
    }
}

/// Runs every kernel on the calling thread, in index order. This is the
/// deterministic fixed schedule: use it in tests, and for R2 when a
/// reproducible result matters more than throughput.
#[derive(Default)]
pub struct SingleThreadExecutor;

impl Executor for SingleThreadExecutor {
    fn dispatch_1d(&self, n: usize, kernel: &(dyn Fn(usize) + Sync)) {
        for i in 0..n {
            kernel(i);
        }
    }

    fn dispatch_1d_tiled(&self, n: usize, tile_size: usize, kernel: &(dyn Fn(usize, usize) + Sync)) {
        assert!(tile_size > 0, "tile size must be non-zero");
        let mut start = 0;
        while start < n {
            kernel(start, tile_size.min(n - start));
            start += tile_size;
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Executor, SingleThreadExecutor, ThreadPoolExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn run_counts(executor: &dyn Executor, n: usize) -> Vec<usize> {
        let counts: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
        executor.dispatch_1d(n, &|i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });
        counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    #[test]
    fn test_dispatch_runs_each_index_once() {
        for executor in [
            &ThreadPoolExecutor::new(4) as &dyn Executor,
            &SingleThreadExecutor as &dyn Executor,
        ] {
            assert!(run_counts(executor, 100).iter().all(|&c| c == 1));
            assert!(run_counts(executor, 1).iter().all(|&c| c == 1));
            assert!(run_counts(executor, 0).is_empty());
        }
    }

    #[test]
    fn test_worker_count_is_clamped_to_at_least_one() {
        assert_eq!(ThreadPoolExecutor::new(0).num_procs(), 1);
        assert_eq!(ThreadPoolExecutor::new(8).num_procs(), 8);
    }

    #[test]
    fn test_dispatch_with_more_workers_than_indices() {
        let executor = ThreadPoolExecutor::new(16);
        assert!(run_counts(&executor, 3).iter().all(|&c| c == 1));
    }

    #[test]
    fn test_tiled_dispatch_covers_range_with_bounded_tiles() {
        for executor in [
            &ThreadPoolExecutor::new(4) as &dyn Executor,
            &SingleThreadExecutor as &dyn Executor,
        ] {
            let n = 103;
            let tile_size = 8;
            let seen: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
            let tiles = Mutex::new(vec![]);
            executor.dispatch_1d_tiled(n, tile_size, &|start, len| {
                assert!(len > 0 && len <= tile_size);
                assert_eq!(start % tile_size, 0);
                tiles.lock().unwrap().push((start, len));
                for local in 0..len {
                    seen[start + local].fetch_add(1, Ordering::Relaxed);
                }
            });
            assert!(seen.iter().all(|c| c.load(Ordering::Relaxed) == 1));
            assert_eq!(tiles.lock().unwrap().len(), 13);
        }
    }

    #[test]
    fn test_single_thread_runs_in_index_order() {
        let order = Mutex::new(vec![]);
        SingleThreadExecutor.dispatch_1d(10, &|i| {
            order.lock().unwrap().push(i);
        });
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }
}
