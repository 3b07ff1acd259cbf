//! Worker configuration.
//!
//! Implements: REQ-CFG-001 (Configuration)
//!
//! All configuration is environment-first with validated defaults.
//! Required values produce [`ActGateError::InvalidConfig`]; malformed
//! optional values log a warning and fall back to the default rather
//! than refusing to start.

use std::time::Duration;

use tracing::warn;

use crate::error::ActGateError;

// ─────────────────────────────────────────────────────────────────────────────
// Fallback Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Behavior when a governance decision cannot be obtained.
///
/// Implements: REQ-GOV-002/F-002 (Fallback Resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Treat unreachable governance as non-blocking; proceed and log
    /// the degraded condition.
    #[default]
    FailOpen,
    /// Block the invocation when governance is unreachable.
    FailClosed,
}

impl FallbackMode {
    /// Parse from the configuration surface (`fail_open` | `fail_closed`).
    ///
    /// Unknown values fall back to `FailOpen` with a warning, matching
    /// the permissive handling of other optional settings.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "fail_closed" => Self::FailClosed,
            "fail_open" => Self::FailOpen,
            other => {
                warn!(
                    value = %other,
                    "Unknown governance policy mode, defaulting to fail_open"
                );
                Self::FailOpen
            }
        }
    }
}

impl std::fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailOpen => write!(f, "fail_open"),
            Self::FailClosed => write!(f, "fail_closed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Governance Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable governance configuration, shared read-only by all
/// concurrent dispatches.
///
/// Implements: REQ-GOV-001/§5.1
#[derive(Debug, Clone)]
pub struct GovernancePolicy {
    /// Decision endpoint base URL (e.g. "https://governance:8443")
    pub endpoint: String,
    /// Bearer credential sent with each decision request
    pub api_key: Option<String>,
    /// Deadline for a single decision request
    pub timeout: Duration,
    /// Behavior when the decision cannot be obtained
    pub fallback: FallbackMode,
}

impl GovernancePolicy {
    /// Default decision timeout (seconds, float-valued in the env).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Load governance configuration from environment variables.
    ///
    /// Implements: REQ-CFG-001/§5.1
    ///
    /// Returns `None` when `ACTGATE_GOVERNANCE_URL` is unset — the
    /// worker then refuses to register governed activities.
    ///
    /// # Environment Variables
    ///
    /// - `ACTGATE_GOVERNANCE_URL` — decision endpoint
    /// - `ACTGATE_GOVERNANCE_API_KEY` — bearer credential (optional)
    /// - `ACTGATE_GOVERNANCE_TIMEOUT_SECS` — float seconds (default: 30.0)
    /// - `ACTGATE_GOVERNANCE_POLICY` — "fail_open" | "fail_closed"
    ///   (default: fail_open)
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("ACTGATE_GOVERNANCE_URL").ok()?;

        let api_key = std::env::var("ACTGATE_GOVERNANCE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let timeout = parse_secs_f64_env("ACTGATE_GOVERNANCE_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT);

        let fallback = std::env::var("ACTGATE_GOVERNANCE_POLICY")
            .ok()
            .map(|s| FallbackMode::parse_lenient(&s))
            .unwrap_or_default();

        Some(Self {
            endpoint,
            api_key,
            timeout,
            fallback,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Config
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level worker configuration.
///
/// Implements: REQ-CFG-001
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Governance gate configuration; `None` disables governed dispatch.
    pub governance: Option<GovernancePolicy>,
    /// Capacity of the blocking executor pool.
    pub executor_pool_size: usize,
    /// Task queue identifier handed to the orchestration engine.
    pub task_queue: String,
    /// Orchestration engine worker API base URL.
    pub engine_url: Option<String>,
    /// Wrap database calls made inside activities with instrumentation.
    pub instrument_databases: bool,
    /// Wrap file I/O made inside activities with instrumentation.
    pub instrument_file_io: bool,
    /// Local inference endpoint to warm up before accepting tasks.
    pub warmup_url: Option<String>,
    /// Model name to pre-load during warm-up.
    pub warmup_model: String,
    /// Budget for draining in-flight dispatches at shutdown.
    pub drain_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            governance: None,
            executor_pool_size: 100,
            task_queue: "agent-task-queue".to_string(),
            engine_url: None,
            instrument_databases: true,
            instrument_file_io: true,
            warmup_url: None,
            warmup_model: "llama3".to_string(),
            drain_timeout: Duration::from_secs(25),
        }
    }
}

impl WorkerConfig {
    /// Load the full worker configuration from environment variables.
    ///
    /// Implements: REQ-CFG-001
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::InvalidConfig` if `ACTGATE_EXECUTOR_POOL_SIZE`
    /// is set to zero or is not a valid integer.
    pub fn from_env() -> Result<Self, ActGateError> {
        let default = Self::default();

        let executor_pool_size = match std::env::var("ACTGATE_EXECUTOR_POOL_SIZE") {
            Ok(val) => {
                let size: usize =
                    val.parse()
                        .map_err(|_| ActGateError::InvalidConfig {
                            details: format!(
                                "ACTGATE_EXECUTOR_POOL_SIZE must be a positive integer, got: '{val}'"
                            ),
                        })?;
                if size == 0 {
                    return Err(ActGateError::InvalidConfig {
                        details: "ACTGATE_EXECUTOR_POOL_SIZE must be at least 1".to_string(),
                    });
                }
                size
            }
            Err(_) => default.executor_pool_size,
        };

        let task_queue =
            std::env::var("ACTGATE_TASK_QUEUE").unwrap_or_else(|_| default.task_queue.clone());

        let engine_url = std::env::var("ACTGATE_ENGINE_URL").ok();

        let instrument_databases =
            parse_bool_env("ACTGATE_INSTRUMENT_DATABASES", default.instrument_databases);
        let instrument_file_io =
            parse_bool_env("ACTGATE_INSTRUMENT_FILE_IO", default.instrument_file_io);

        let warmup_url = std::env::var("ACTGATE_WARMUP_URL").ok();
        let warmup_model =
            std::env::var("ACTGATE_WARMUP_MODEL").unwrap_or_else(|_| default.warmup_model.clone());

        let drain_timeout = parse_secs_f64_env("ACTGATE_DRAIN_TIMEOUT_SECS", default.drain_timeout);

        Ok(Self {
            governance: GovernancePolicy::from_env(),
            executor_pool_size,
            task_queue,
            engine_url,
            instrument_databases,
            instrument_file_io,
            warmup_url,
            warmup_model,
            drain_timeout,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parse Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a float-seconds duration env var with warning on invalid values.
fn parse_secs_f64_env(var_name: &str, default: Duration) -> Duration {
    match std::env::var(var_name) {
        Ok(value) => match value.parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
            _ => {
                warn!(
                    var = var_name,
                    value = %value,
                    default_secs = default.as_secs_f64(),
                    "Invalid value for environment variable, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a boolean env var ("true"/"1" vs "false"/"0"), warning on noise.
fn parse_bool_env(var_name: &str, default: bool) -> bool {
    match std::env::var(var_name) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                warn!(
                    var = var_name,
                    value = %other,
                    default = default,
                    "Invalid value for environment variable, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// RAII guard that saves and restores env var state around a test.
    struct EnvVarGuard {
        vars: Vec<(&'static str, Option<String>)>,
    }

    impl EnvVarGuard {
        fn new(var_names: &[&'static str]) -> Self {
            let vars = var_names
                .iter()
                .map(|&name| (name, std::env::var(name).ok()))
                .collect();
            // SAFETY: tests mutating the environment run under #[serial]
            for name in var_names {
                unsafe { std::env::remove_var(name) };
            }
            Self { vars }
        }

        fn set(&self, name: &str, value: &str) {
            // SAFETY: tests mutating the environment run under #[serial]
            unsafe { std::env::set_var(name, value) };
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            for (name, original) in &self.vars {
                // SAFETY: tests mutating the environment run under #[serial]
                unsafe {
                    match original {
                        Some(val) => std::env::set_var(name, val),
                        None => std::env::remove_var(name),
                    }
                }
            }
        }
    }

    const ALL_VARS: &[&'static str] = &[
        "ACTGATE_GOVERNANCE_URL",
        "ACTGATE_GOVERNANCE_API_KEY",
        "ACTGATE_GOVERNANCE_TIMEOUT_SECS",
        "ACTGATE_GOVERNANCE_POLICY",
        "ACTGATE_EXECUTOR_POOL_SIZE",
        "ACTGATE_TASK_QUEUE",
        "ACTGATE_ENGINE_URL",
        "ACTGATE_INSTRUMENT_DATABASES",
        "ACTGATE_INSTRUMENT_FILE_IO",
        "ACTGATE_WARMUP_URL",
        "ACTGATE_WARMUP_MODEL",
        "ACTGATE_DRAIN_TIMEOUT_SECS",
    ];

    #[test]
    fn test_fallback_mode_parse() {
        assert_eq!(FallbackMode::parse_lenient("fail_open"), FallbackMode::FailOpen);
        assert_eq!(
            FallbackMode::parse_lenient("FAIL_CLOSED"),
            FallbackMode::FailClosed
        );
        // Unknown values are permissive, not fatal
        assert_eq!(FallbackMode::parse_lenient("bogus"), FallbackMode::FailOpen);
    }

    #[test]
    fn test_fallback_mode_display_roundtrip() {
        for mode in [FallbackMode::FailOpen, FallbackMode::FailClosed] {
            assert_eq!(FallbackMode::parse_lenient(&mode.to_string()), mode);
        }
    }

    #[test]
    #[serial]
    fn test_worker_config_defaults() {
        let _guard = EnvVarGuard::new(ALL_VARS);

        let config = WorkerConfig::from_env().expect("defaults should load");
        assert!(config.governance.is_none());
        assert_eq!(config.executor_pool_size, 100);
        assert_eq!(config.task_queue, "agent-task-queue");
        assert!(config.instrument_databases);
        assert!(config.instrument_file_io);
        assert_eq!(config.drain_timeout, Duration::from_secs(25));
    }

    #[test]
    #[serial]
    fn test_governance_policy_from_env() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_GOVERNANCE_URL", "http://governance:9000");
        guard.set("ACTGATE_GOVERNANCE_API_KEY", "secret-key");
        guard.set("ACTGATE_GOVERNANCE_TIMEOUT_SECS", "2.5");
        guard.set("ACTGATE_GOVERNANCE_POLICY", "fail_closed");

        let policy = GovernancePolicy::from_env().expect("policy should load");
        assert_eq!(policy.endpoint, "http://governance:9000");
        assert_eq!(policy.api_key.as_deref(), Some("secret-key"));
        assert_eq!(policy.timeout, Duration::from_secs_f64(2.5));
        assert_eq!(policy.fallback, FallbackMode::FailClosed);
    }

    #[test]
    #[serial]
    fn test_governance_timeout_accepts_float_seconds() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_GOVERNANCE_URL", "http://governance:9000");
        guard.set("ACTGATE_GOVERNANCE_TIMEOUT_SECS", "0.25");

        let policy = GovernancePolicy::from_env().unwrap();
        assert_eq!(policy.timeout, Duration::from_millis(250));
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_falls_back_to_default() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_GOVERNANCE_URL", "http://governance:9000");
        guard.set("ACTGATE_GOVERNANCE_TIMEOUT_SECS", "not-a-number");

        let policy = GovernancePolicy::from_env().unwrap();
        assert_eq!(policy.timeout, GovernancePolicy::DEFAULT_TIMEOUT);
    }

    #[test]
    #[serial]
    fn test_negative_timeout_falls_back_to_default() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_GOVERNANCE_URL", "http://governance:9000");
        guard.set("ACTGATE_GOVERNANCE_TIMEOUT_SECS", "-3");

        let policy = GovernancePolicy::from_env().unwrap();
        assert_eq!(policy.timeout, GovernancePolicy::DEFAULT_TIMEOUT);
    }

    #[test]
    #[serial]
    fn test_zero_pool_size_rejected() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_EXECUTOR_POOL_SIZE", "0");

        let result = WorkerConfig::from_env();
        assert!(matches!(result, Err(ActGateError::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_non_numeric_pool_size_rejected() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_EXECUTOR_POOL_SIZE", "many");

        let result = WorkerConfig::from_env();
        assert!(matches!(result, Err(ActGateError::InvalidConfig { details })
            if details.contains("ACTGATE_EXECUTOR_POOL_SIZE")));
    }

    #[test]
    #[serial]
    fn test_instrumentation_toggles() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_INSTRUMENT_DATABASES", "false");
        guard.set("ACTGATE_INSTRUMENT_FILE_IO", "0");

        let config = WorkerConfig::from_env().unwrap();
        assert!(!config.instrument_databases);
        assert!(!config.instrument_file_io);
    }

    #[test]
    #[serial]
    fn test_empty_api_key_treated_as_absent() {
        let guard = EnvVarGuard::new(ALL_VARS);
        guard.set("ACTGATE_GOVERNANCE_URL", "http://governance:9000");
        guard.set("ACTGATE_GOVERNANCE_API_KEY", "");

        let policy = GovernancePolicy::from_env().unwrap();
        assert!(policy.api_key.is_none());
    }
}
