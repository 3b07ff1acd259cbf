//! Activity trait and registry.
//!
//! Implements: REQ-WKR-002 (Activity Registry)
//!
//! Activities are named blocking bodies registered before the worker
//! starts accepting tasks. Registration mode decides whether the
//! dispatcher consults governance first (`Governed`) or executes
//! directly on the pool (`Plain`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use actgate_core::error::{ActGateError, ActivityError};
use actgate_core::instrument::Instrumentation;

// ─────────────────────────────────────────────────────────────────────────────
// Activity Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to every activity body.
///
/// Carries invocation identity and the instrumentation switchboard so
/// bodies can wrap their own database and file I/O calls.
pub struct InvocationContext {
    /// Unique id for this invocation attempt.
    pub invocation_id: String,
    /// Task queue the invocation arrived on.
    pub task_queue: String,
    /// Owning workflow execution, when known.
    pub workflow_id: Option<String>,
    /// Shared instrumentation switchboard.
    pub instrumentation: Arc<Instrumentation>,
}

/// A blocking unit of work hosted by the worker.
///
/// Bodies run on the executor pool's blocking threads; they may block
/// freely but must not assume a tokio runtime context.
pub trait Activity: Send + Sync {
    /// Registered name, unique within a worker.
    fn name(&self) -> &str;

    /// Execute the activity.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError::Execution` for domain failures; the
    /// dispatcher propagates them verbatim.
    fn run(&self, ctx: &InvocationContext, args: Value) -> Result<Value, ActivityError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// How an activity participates in dispatch.
#[derive(Clone)]
pub enum RegisteredActivity {
    /// Executes directly on the pool, no governance check.
    Plain(Arc<dyn Activity>),
    /// Governance decision precedes every execution.
    Governed(Arc<dyn Activity>),
}

impl RegisteredActivity {
    /// The underlying activity regardless of mode.
    #[must_use]
    pub fn activity(&self) -> &Arc<dyn Activity> {
        match self {
            Self::Plain(activity) | Self::Governed(activity) => activity,
        }
    }

    /// Whether dispatch must obtain a governance decision first.
    #[must_use]
    pub fn is_governed(&self) -> bool {
        matches!(self, Self::Governed(_))
    }
}

/// Name-keyed activity collection, built once at bootstrap and
/// immutable afterwards.
#[derive(Default)]
pub struct ActivityRegistry {
    activities: HashMap<String, RegisteredActivity>,
}

impl ActivityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activity that runs without a governance check.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::DuplicateActivity` if the name is taken.
    /// Duplicate names are a programming error and abort bootstrap.
    pub fn register_plain(&mut self, activity: Arc<dyn Activity>) -> Result<(), ActGateError> {
        self.insert(RegisteredActivity::Plain(activity))
    }

    /// Register an activity gated by governance.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::DuplicateActivity` if the name is taken.
    pub fn register_governed(&mut self, activity: Arc<dyn Activity>) -> Result<(), ActGateError> {
        self.insert(RegisteredActivity::Governed(activity))
    }

    fn insert(&mut self, registered: RegisteredActivity) -> Result<(), ActGateError> {
        let name = registered.activity().name().to_string();
        if self.activities.contains_key(&name) {
            return Err(ActGateError::DuplicateActivity { name });
        }
        self.activities.insert(name, registered);
        Ok(())
    }

    /// Look up an activity by registered name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredActivity> {
        self.activities.get(name)
    }

    /// Number of registered activities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Registered names of governed activities, for startup logging.
    #[must_use]
    pub fn governed_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .activities
            .values()
            .filter(|r| r.is_governed())
            .map(|r| r.activity().name())
            .collect();
        names.sort_unstable();
        names
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
