//! Activity call instrumentation.
//!
//! Implements: REQ-OBS-001 (Instrumentation Hooks)
//!
//! Observation wrappers for database and file I/O calls made inside
//! activity bodies. Wrappers are transparent: identical return values,
//! identical errors, no retry, no mutation. Enabling a target twice
//! has no additional effect, so activities behave the same whether
//! instrumentation was switched on once or many times.
//!
//! No per-call state is retained; each observed call emits one
//! structured event carrying the target, operation, duration, and
//! success flag, and is then forgotten. A call that panics or is
//! cancelled mid-flight is recorded as a failure because its timer is
//! dropped without an explicit success finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::debug;

use crate::config::WorkerConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Targets
// ─────────────────────────────────────────────────────────────────────────────

/// Categories of calls the worker can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentTarget {
    /// Database client calls (queries, transactions).
    Databases,
    /// File read/write calls.
    FileIo,
}

impl InstrumentTarget {
    fn label(self) -> &'static str {
        match self {
            Self::Databases => "database",
            Self::FileIo => "file_io",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Instrumentation Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Per-worker instrumentation switchboard.
///
/// Implements: REQ-OBS-001/§6.1
#[derive(Debug, Default)]
pub struct Instrumentation {
    databases: AtomicBool,
    file_io: AtomicBool,
}

impl Instrumentation {
    /// Fresh registry with all targets disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with targets pre-enabled per the worker config.
    #[must_use]
    pub fn from_config(config: &WorkerConfig) -> Self {
        let instrumentation = Self::new();
        if config.instrument_databases {
            instrumentation.enable(InstrumentTarget::Databases);
        }
        if config.instrument_file_io {
            instrumentation.enable(InstrumentTarget::FileIo);
        }
        instrumentation
    }

    fn flag(&self, target: InstrumentTarget) -> &AtomicBool {
        match target {
            InstrumentTarget::Databases => &self.databases,
            InstrumentTarget::FileIo => &self.file_io,
        }
    }

    /// Enable observation for a target.
    ///
    /// Idempotent: returns `true` only on the transition from disabled
    /// to enabled, `false` when the target was already enabled.
    pub fn enable(&self, target: InstrumentTarget) -> bool {
        let newly_enabled = !self.flag(target).swap(true, Ordering::SeqCst);
        if newly_enabled {
            debug!(target = target.label(), "Instrumentation enabled");
        }
        newly_enabled
    }

    /// Whether a target is currently being observed.
    #[must_use]
    pub fn is_enabled(&self, target: InstrumentTarget) -> bool {
        self.flag(target).load(Ordering::SeqCst)
    }

    /// Observe an infallible synchronous call.
    ///
    /// Implements: REQ-OBS-001/§6.2
    ///
    /// The closure's return value passes through untouched. A normal
    /// return records success; a panic unwinding out of the closure
    /// records failure. When the target is disabled this is a direct
    /// call with no timing at all.
    pub fn observe<T>(&self, target: InstrumentTarget, operation: &str, f: impl FnOnce() -> T) -> T {
        if !self.is_enabled(target) {
            return f();
        }
        let timer = IoTimer::start(target, operation);
        let value = f();
        timer.finish_success();
        value
    }

    /// Observe a fallible synchronous call, recording `Ok` as success
    /// and `Err` as failure. The result passes through untouched.
    pub fn observe_result<T, E>(
        &self,
        target: InstrumentTarget,
        operation: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if !self.is_enabled(target) {
            return f();
        }
        let timer = IoTimer::start(target, operation);
        let result = f();
        if result.is_ok() {
            timer.finish_success();
        }
        result
    }

    /// Observe an infallible async call, transparent in the same way
    /// as [`Instrumentation::observe`]. Cancellation before the future
    /// completes records failure.
    pub async fn observe_async<T, F>(
        &self,
        target: InstrumentTarget,
        operation: &str,
        fut: F,
    ) -> T
    where
        F: std::future::Future<Output = T>,
    {
        if !self.is_enabled(target) {
            return fut.await;
        }
        let timer = IoTimer::start(target, operation);
        let value = fut.await;
        timer.finish_success();
        value
    }

    /// Observe a fallible async call, recording the result's outcome
    /// like [`Instrumentation::observe_result`].
    pub async fn observe_result_async<T, E, F>(
        &self,
        target: InstrumentTarget,
        operation: &str,
        fut: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        if !self.is_enabled(target) {
            return fut.await;
        }
        let timer = IoTimer::start(target, operation);
        let result = fut.await;
        if result.is_ok() {
            timer.finish_success();
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// I/O Timer
// ─────────────────────────────────────────────────────────────────────────────

/// RAII timer emitting one event per observed call.
///
/// [`IoTimer::finish_success`] records success; dropping the timer
/// without finishing records failure, so panics, errors, and
/// cancellation all land on the failure path without extra wiring.
struct IoTimer {
    target: InstrumentTarget,
    operation: String,
    started: Instant,
    finished: bool,
}

impl IoTimer {
    fn start(target: InstrumentTarget, operation: &str) -> Self {
        Self {
            target,
            operation: operation.to_string(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Finish with success, consuming the timer.
    fn finish_success(mut self) {
        self.finished = true;
        self.emit(true);
    }

    fn emit(&self, success: bool) {
        debug!(
            target = self.target.label(),
            operation = %self.operation,
            duration_us = self.started.elapsed().as_micros() as u64,
            success = success,
            "Observed call completed"
        );
    }
}

impl Drop for IoTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(false);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    /// Collects emitted log lines so tests can assert on event fields.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let value = tracing::subscriber::with_default(subscriber, f);
        (value, logs.contents())
    }

    #[test]
    fn test_enable_is_idempotent() {
        let instrumentation = Instrumentation::new();
        assert!(instrumentation.enable(InstrumentTarget::Databases));
        assert!(!instrumentation.enable(InstrumentTarget::Databases));
        assert!(instrumentation.is_enabled(InstrumentTarget::Databases));
        // Other targets are unaffected
        assert!(!instrumentation.is_enabled(InstrumentTarget::FileIo));
    }

    #[test]
    fn test_observe_passes_through_return_value() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::FileIo);

        let result = instrumentation.observe(InstrumentTarget::FileIo, "read_config", || 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_observe_result_passes_through_errors() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::Databases);

        let result: Result<(), String> =
            instrumentation.observe_result(InstrumentTarget::Databases, "insert_row", || {
                Err("duplicate key".to_string())
            });
        assert_eq!(result, Err("duplicate key".to_string()));
    }

    #[test]
    fn test_observe_when_disabled_still_calls() {
        let instrumentation = Instrumentation::new();

        let result = instrumentation.observe(InstrumentTarget::Databases, "select", || "rows");
        assert_eq!(result, "rows");
    }

    #[test]
    fn test_successful_call_recorded_as_success() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::Databases);

        let (result, logs) = capture(|| {
            instrumentation.observe_result(InstrumentTarget::Databases, "select", || {
                Ok::<_, String>(3)
            })
        });
        assert_eq!(result, Ok(3));
        assert!(logs.contains("Observed call completed"));
        assert!(logs.contains("success=true"));
        assert!(logs.contains("operation=select"));
    }

    #[test]
    fn test_failed_call_recorded_as_failure() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::FileIo);

        let (result, logs) = capture(|| {
            instrumentation.observe_result(InstrumentTarget::FileIo, "read_note", || {
                Err::<(), _>("no such file".to_string())
            })
        });
        assert!(result.is_err());
        assert!(logs.contains("success=false"));
        assert!(!logs.contains("success=true"));
    }

    #[test]
    fn test_panicking_call_recorded_as_failure() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::Databases);

        let ((), logs) = capture(|| {
            let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                instrumentation.observe(InstrumentTarget::Databases, "explode", || {
                    panic!("connection torn down")
                })
            }));
            assert!(panicked.is_err());
        });
        assert!(logs.contains("success=false"));
    }

    #[tokio::test]
    async fn test_observe_async_passes_through() {
        let instrumentation = Instrumentation::new();
        instrumentation.enable(InstrumentTarget::Databases);

        let result = instrumentation
            .observe_result_async(InstrumentTarget::Databases, "fetch", async {
                Ok::<_, String>(7)
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_from_config_respects_toggles() {
        let config = WorkerConfig {
            instrument_databases: true,
            instrument_file_io: false,
            ..WorkerConfig::default()
        };
        let instrumentation = Instrumentation::from_config(&config);
        assert!(instrumentation.is_enabled(InstrumentTarget::Databases));
        assert!(!instrumentation.is_enabled(InstrumentTarget::FileIo));
    }
}
