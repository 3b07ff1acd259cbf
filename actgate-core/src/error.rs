//! Error handling for ActGate.
//!
//! Implements: REQ-ERR-001 (Error Taxonomy)
//!
//! Two error families live here:
//!
//! - [`ActGateError`]: worker-level faults covering configuration,
//!   resource initialization, registration, and cleanup. These decide
//!   whether the worker starts, runs, or how it exits.
//! - [`ActivityError`]: dispatch-visible failures returned to the
//!   orchestration engine for a single invocation. The distinguished
//!   [`ActivityError::GovernanceBlocked`] variant is the only way a
//!   governance outcome surfaces to a caller; governance timeouts and
//!   transport faults are resolved into proceed/block before this layer
//!   and never propagate raw.

use thiserror::Error;

/// Worker-level error conditions.
///
/// Implements: REQ-ERR-001/§6.1
#[derive(Debug, Error)]
pub enum ActGateError {
    /// Configuration is missing or malformed.
    #[error("Invalid configuration: {details}")]
    InvalidConfig {
        /// Description of the validation failure
        details: String,
    },

    /// A required resource could not be constructed at startup.
    ///
    /// Fatal: the worker never enters `Running`.
    #[error("Resource initialization failed during {stage}: {reason}")]
    ResourceInit {
        /// Which startup stage failed ("executor", "tools", "registry", ...)
        stage: &'static str,
        /// Underlying failure description
        reason: String,
    },

    /// An activity name was registered twice.
    ///
    /// Fatal at startup: the registry refuses ambiguous dispatch tables.
    #[error("Activity '{name}' is already registered")]
    DuplicateActivity {
        /// The conflicting activity name
        name: String,
    },

    /// The orchestration engine's run loop failed.
    #[error("Engine runner failed: {reason}")]
    Runner {
        /// Failure description from the runner
        reason: String,
    },

    /// Resource release failed during shutdown.
    ///
    /// Logged only; never overrides the worker's actual exit cause.
    #[error("Cleanup failed: {reason}")]
    Cleanup {
        /// Failure description
        reason: String,
    },
}

/// Per-invocation failures visible to the orchestration engine.
///
/// Implements: REQ-ERR-001/§6.2
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// Governance blocked the invocation; the activity body never ran.
    #[error("Activity '{activity}' blocked by governance: {reason}")]
    GovernanceBlocked {
        /// The activity that was blocked
        activity: String,
        /// Human-readable block reason (deny reason, or
        /// "governance unavailable" under fail_closed)
        reason: String,
    },

    /// The activity body itself failed.
    ///
    /// Propagated unchanged through the governed dispatch path: the
    /// wrapper must not alter, swallow, or retry it.
    #[error("{message}")]
    Execution {
        /// The failure message raised by the activity body
        message: String,
    },

    /// The activity name is not present in the registry.
    #[error("Activity '{activity}' is not registered")]
    NotRegistered {
        /// The unknown activity name
        activity: String,
    },

    /// The worker is shutting down; no new dispatches accepted.
    #[error("Worker is shutting down")]
    ShuttingDown,
}

impl ActivityError {
    /// Shorthand for an execution failure raised inside an activity body.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Returns `true` if this failure came from the governance gate
    /// rather than the activity body.
    #[must_use]
    pub fn is_governance_blocked(&self) -> bool {
        matches!(self, Self::GovernanceBlocked { .. })
    }
}
