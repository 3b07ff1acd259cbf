//! Bounded blocking executor pool.
//!
//! Implements: REQ-WKR-001 (Executor Pool)
//!
//! Every activity body, plain or governed, runs inside this pool so
//! in-flight accounting covers all of them. Capacity is enforced with
//! a semaphore: when the pool is saturated, submissions wait rather
//! than spawning extra work.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use actgate_core::error::{ActGateError, ActivityError};

/// Bounded pool for CPU-bound and blocking activity bodies.
///
/// Wraps tokio's blocking thread pool with a hard upper bound on
/// concurrent activity executions.
pub struct ExecutorPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

impl ExecutorPool {
    /// Create a pool with the given capacity.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::InvalidConfig` for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self, ActGateError> {
        if capacity == 0 {
            return Err(ActGateError::InvalidConfig {
                details: "executor pool capacity must be at least 1".to_string(),
            });
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of activity bodies currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a blocking activity body on the pool.
    ///
    /// Waits for a permit when the pool is saturated (backpressure),
    /// then executes `body` on the blocking thread pool. The permit is
    /// held for the full duration of the body and released on every
    /// exit path, including panics.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError::ShuttingDown` if the pool has been
    /// closed, or `ActivityError::Execution` if the body panicked.
    pub async fn run<T, F>(&self, body: F) -> Result<T, ActivityError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ActivityError> + Send + 'static,
    {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return Err(ActivityError::ShuttingDown),
        };

        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        let result = tokio::task::spawn_blocking(move || {
            // Permit and counter travel into the closure so accounting
            // reflects actual execution, not queueing.
            let _permit = permit;
            let outcome = body();
            in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(join_err) => {
                // A panicking body decrements nothing inside the
                // closure, so repair the counter here.
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                warn!(error = %join_err, "Activity body panicked");
                Err(ActivityError::execution(format!(
                    "activity panicked: {join_err}"
                )))
            }
        }
    }

    /// Stop accepting new work. In-flight bodies run to completion.
    pub fn close(&self) {
        debug!(
            in_flight = self.in_flight(),
            "Closing executor pool to new submissions"
        );
        self.permits.close();
    }
}
