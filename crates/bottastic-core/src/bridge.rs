//! Worker pool that turns blocking transport calls into awaitable futures.
//!
//! Bot schedulers never call the transport directly. Each call is handed to
//! the blocking pool of a small multi-thread tokio runtime owned by the
//! pool, and the scheduler awaits the resulting `JoinHandle`. A `JoinHandle`
//! can be awaited from any runtime, so bots running on separate
//! current-thread schedulers share one pool.

use std::sync::{Arc, OnceLock};

use bottastic_types::config::default_worker_threads;
use bottastic_types::error::{BridgeError, TransportError};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinError;
use tracing::{debug, error};

/// Process-wide pool used by bots that are not given their own.
static SHARED_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// Bounded pool of threads for blocking calls.
///
/// Cloning the pool shares the same runtime. The runtime shuts down in the
/// background once every clone has been dropped.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    runtime: Option<Runtime>,
    workers: usize,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // The last clone may be dropped from async code, where a blocking
        // runtime shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl WorkerPool {
    /// Start a pool that runs at most `workers` blocking calls at once
    /// (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("bottastic-worker")
            .enable_all()
            .build();

        let runtime = match runtime {
            Ok(runtime) => {
                debug!(workers, "started worker pool");
                Some(runtime)
            }
            // Every submission then fails with PoolClosed instead of hanging.
            Err(err) => {
                error!(workers, "failed to start worker pool: {err}");
                None
            }
        };

        Self {
            inner: Arc::new(PoolInner { runtime, workers }),
        }
    }

    /// The process-wide pool, created on first use.
    ///
    /// Sized by [`WorkerPool::configure_shared`] if that ran first, otherwise
    /// by [`default_worker_threads`].
    pub fn shared() -> Self {
        SHARED_POOL
            .get_or_init(|| WorkerPool::new(default_worker_threads()))
            .clone()
    }

    /// Size the process-wide pool before anything uses it.
    ///
    /// Returns `false` if the shared pool already exists.
    pub fn configure_shared(workers: usize) -> bool {
        SHARED_POOL.set(WorkerPool::new(workers)).is_ok()
    }

    /// Maximum number of blocking calls running at once.
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Run a blocking closure on the pool and await its result.
    ///
    /// A panic inside `f` is reported as [`BridgeError::Panicked`]; the pool
    /// keeps serving calls.
    pub async fn run<F, T>(&self, f: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let Some(runtime) = self.inner.runtime.as_ref() else {
            return Err(BridgeError::PoolClosed);
        };
        runtime.spawn_blocking(f).await.map_err(join_failure)
    }

    /// Run a blocking transport call, flattening pool and transport failures
    /// into the caller's error type.
    pub async fn run_transport<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, TransportError> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + From<TransportError>,
    {
        self.run(f).await?.map_err(E::from)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.inner.workers)
            .finish()
    }
}

fn join_failure(err: JoinError) -> BridgeError {
    match err.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|msg| (*msg).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            BridgeError::Panicked(message)
        }
        // Cancelled: the runtime shut down under the call.
        Err(_) => BridgeError::PoolClosed,
    }
}
