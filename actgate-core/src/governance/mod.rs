//! Governance decision types and resolution.
//!
//! Implements: REQ-GOV-001 (Decision Client), REQ-GOV-002 (Policy Resolution)
//!
//! Every governed activity invocation is described by an
//! [`ActivityInvocation`], submitted to a decision point, and the
//! resulting [`GovernanceDecision`] is reduced to a [`Resolution`]
//! by the configured fallback mode. Transport failures and timeouts
//! are decisions, not errors: nothing past the resolver ever sees a
//! raw network failure.

pub mod client;
pub mod resolver;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::{DecisionPoint, HttpDecisionPoint};
pub use resolver::resolve;

// ─────────────────────────────────────────────────────────────────────────────
// Invocation Descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Description of an activity invocation submitted for a governance
/// decision.
///
/// Implements: REQ-GOV-001/§4.1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityInvocation {
    /// Registered activity name (the governance subject).
    pub activity: String,
    /// Invocation arguments, forwarded verbatim for policy matching.
    pub args: serde_json::Value,
    /// Unique id for this invocation attempt.
    pub invocation_id: String,
    /// Task queue the invocation arrived on.
    pub task_queue: String,
    /// Owning workflow execution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl ActivityInvocation {
    /// Build a descriptor with a fresh invocation id.
    #[must_use]
    pub fn new(activity: impl Into<String>, args: serde_json::Value, task_queue: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            args,
            invocation_id: uuid::Uuid::new_v4().to_string(),
            task_queue: task_queue.into(),
            workflow_id: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single governance decision request.
///
/// Implements: REQ-GOV-001/§4.2
///
/// `Timeout` and `TransportError` are first-class outcomes so the
/// resolver can apply the fallback mode uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceDecision {
    /// The decision point explicitly permitted the invocation.
    Allow,
    /// The decision point explicitly blocked the invocation.
    Deny {
        /// Human-readable reason supplied by the decision point.
        reason: String,
    },
    /// No verdict arrived within the configured deadline.
    Timeout,
    /// The decision request could not complete (connect failure,
    /// malformed response, non-success status).
    TransportError {
        /// Classified description of the failure.
        reason: String,
    },
}

impl GovernanceDecision {
    /// Whether this decision represents an explicit verdict from the
    /// decision point (as opposed to a degraded condition).
    #[must_use]
    pub fn is_verdict(&self) -> bool {
        matches!(self, Self::Allow | Self::Deny { .. })
    }
}

/// A decision together with how long it took to obtain.
#[derive(Debug, Clone)]
pub struct TimedDecision {
    pub decision: GovernanceDecision,
    pub latency: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Final dispatch verdict after the fallback mode has been applied.
///
/// Implements: REQ-GOV-002/§4.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Execute the activity body.
    Proceed,
    /// Do not execute; fail the invocation with the given reason.
    Block {
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body sent to the decision endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct DecisionRequest<'a> {
    pub activity: &'a str,
    pub args: &'a serde_json::Value,
    pub invocation_id: &'a str,
    pub task_queue: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<&'a str>,
}

/// Response body returned by the decision endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct DecisionResponse {
    /// "allow" or "deny"
    pub decision: String,
    /// Populated on deny.
    #[serde(default)]
    pub reason: Option<String>,
}
