//! Worker lifecycle state machine.
//!
//! Implements: REQ-OPS-001 (Worker Lifecycle)
//!
//! A strictly forward-moving state machine guards dispatch: tasks are
//! accepted only while `Running`, and shutdown drains in-flight
//! dispatches before resources are torn down. State reads are
//! lock-free so the hot path never contends with shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Worker lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Before bootstrap has started.
    Uninitialized,
    /// Resources are being created; dispatch is not yet allowed.
    Initializing,
    /// Accepting and dispatching tasks.
    Running,
    /// Draining in-flight dispatches; no new tasks accepted.
    ShuttingDown,
    /// All resources released.
    Stopped,
}

impl WorkerState {
    /// Whether moving to `next` is a legal forward transition.
    #[must_use]
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Running)
                // Init failure and cancellation skip Running entirely.
                | (Initializing, ShuttingDown)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Drain
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of waiting for in-flight dispatches at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainResult {
    /// All in-flight dispatches finished within the budget.
    Complete,
    /// The budget expired with dispatches still running.
    TimedOut { remaining: usize },
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Shared lifecycle coordinator.
pub struct LifecycleManager {
    state: ArcSwap<WorkerState>,
    in_flight: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(WorkerState::Uninitialized),
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current state (lock-free read).
    #[must_use]
    pub fn state(&self) -> WorkerState {
        **self.state.load()
    }

    /// Attempt a forward transition. Illegal transitions are logged
    /// and refused rather than panicking; the caller decides whether
    /// that is fatal.
    pub fn transition_to(&self, next: WorkerState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            warn!(
                from = %current,
                to = %next,
                "Refusing illegal lifecycle transition"
            );
            return false;
        }
        self.state.store(Arc::new(next));
        info!(from = %current, to = %next, "Lifecycle transition");
        true
    }

    /// Token cancelled when shutdown begins.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal shutdown. Safe to call from any state and multiple times.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Begin a dispatch, returning a guard that tracks it in-flight.
    ///
    /// Returns `None` unless the worker is `Running`; the caller must
    /// then fail the task rather than execute it.
    #[must_use]
    pub fn begin_dispatch(&self) -> Option<DispatchGuard> {
        if self.state() != WorkerState::Running {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(DispatchGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Number of dispatches currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for in-flight dispatches to finish, bounded by `budget`.
    pub async fn drain(&self, budget: Duration) -> DrainResult {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let remaining = self.in_flight();
            if remaining == 0 {
                return DrainResult::Complete;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining = remaining, "Drain budget expired");
                return DrainResult::TimedOut { remaining };
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

/// RAII guard for one in-flight dispatch. Decrements on every exit
/// path, including panics unwinding through the dispatch.
pub struct DispatchGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        let lifecycle = LifecycleManager::new();
        assert!(lifecycle.transition_to(WorkerState::Initializing));
        assert!(lifecycle.transition_to(WorkerState::Running));
        assert!(lifecycle.transition_to(WorkerState::ShuttingDown));
        assert!(lifecycle.transition_to(WorkerState::Stopped));
        assert_eq!(lifecycle.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_init_failure_can_skip_running() {
        let lifecycle = LifecycleManager::new();
        assert!(lifecycle.transition_to(WorkerState::Initializing));
        assert!(lifecycle.transition_to(WorkerState::ShuttingDown));
        assert!(lifecycle.transition_to(WorkerState::Stopped));
    }

    #[test]
    fn test_backward_and_skipping_transitions_refused() {
        let lifecycle = LifecycleManager::new();
        assert!(!lifecycle.transition_to(WorkerState::Running));
        assert!(!lifecycle.transition_to(WorkerState::Stopped));
        lifecycle.transition_to(WorkerState::Initializing);
        lifecycle.transition_to(WorkerState::Running);
        assert!(!lifecycle.transition_to(WorkerState::Initializing));
        assert_eq!(lifecycle.state(), WorkerState::Running);
    }

    #[test]
    fn test_dispatch_only_while_running() {
        let lifecycle = LifecycleManager::new();
        assert!(lifecycle.begin_dispatch().is_none());

        lifecycle.transition_to(WorkerState::Initializing);
        assert!(lifecycle.begin_dispatch().is_none());

        lifecycle.transition_to(WorkerState::Running);
        let guard = lifecycle.begin_dispatch();
        assert!(guard.is_some());
        assert_eq!(lifecycle.in_flight(), 1);
        drop(guard);
        assert_eq!(lifecycle.in_flight(), 0);

        lifecycle.transition_to(WorkerState::ShuttingDown);
        assert!(lifecycle.begin_dispatch().is_none());
    }

    #[tokio::test]
    async fn test_drain_completes_when_guards_drop() {
        let lifecycle = Arc::new(LifecycleManager::new());
        lifecycle.transition_to(WorkerState::Initializing);
        lifecycle.transition_to(WorkerState::Running);

        let guard = lifecycle.begin_dispatch().unwrap();
        let drainer = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.drain(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        assert_eq!(drainer.await.unwrap(), DrainResult::Complete);
    }

    #[tokio::test]
    async fn test_drain_times_out_with_remaining_count() {
        let lifecycle = LifecycleManager::new();
        lifecycle.transition_to(WorkerState::Initializing);
        lifecycle.transition_to(WorkerState::Running);

        let _guard = lifecycle.begin_dispatch().unwrap();
        let result = lifecycle.drain(Duration::from_millis(100)).await;
        assert_eq!(result, DrainResult::TimedOut { remaining: 1 });
    }

    #[test]
    fn test_shutdown_request_is_idempotent() {
        let lifecycle = LifecycleManager::new();
        assert!(!lifecycle.is_shutting_down());
        lifecycle.request_shutdown();
        lifecycle.request_shutdown();
        assert!(lifecycle.is_shutting_down());
        assert!(lifecycle.shutdown_token().is_cancelled());
    }
}
