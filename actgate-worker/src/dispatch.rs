//! Governed dispatch.
//!
//! Implements: REQ-DSP-001 (Governed Dispatch)
//!
//! One path for every invocation: look up the activity, obtain and
//! resolve a governance decision when the registration is governed,
//! then execute the body on the pool. A blocked invocation never
//! touches the body; an executed body's result and errors propagate
//! verbatim.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use actgate_core::config::FallbackMode;
use actgate_core::error::ActivityError;
use actgate_core::governance::{ActivityInvocation, DecisionPoint, Resolution, resolve};
use actgate_core::instrument::Instrumentation;

use crate::activity::{ActivityRegistry, InvocationContext, RegisteredActivity};
use crate::executor::ExecutorPool;

/// Governance wiring for the dispatcher, present only when a
/// governance endpoint is configured.
pub struct GovernanceGate {
    pub decision_point: Arc<dyn DecisionPoint>,
    pub fallback: FallbackMode,
}

/// Routes invocations through the governance gate and onto the
/// executor pool.
pub struct GovernedDispatcher {
    registry: Arc<ActivityRegistry>,
    pool: Arc<ExecutorPool>,
    instrumentation: Arc<Instrumentation>,
    gate: Option<GovernanceGate>,
}

impl GovernedDispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<ActivityRegistry>,
        pool: Arc<ExecutorPool>,
        instrumentation: Arc<Instrumentation>,
        gate: Option<GovernanceGate>,
    ) -> Self {
        Self {
            registry,
            pool,
            instrumentation,
            gate,
        }
    }

    /// Dispatch a single invocation.
    ///
    /// Implements: REQ-DSP-001/§7.1
    ///
    /// # Errors
    ///
    /// - `ActivityError::NotRegistered` for unknown activity names
    /// - `ActivityError::GovernanceBlocked` when the resolved verdict
    ///   is a block; the activity body is not invoked
    /// - `ActivityError::Execution` propagated verbatim from the body
    /// - `ActivityError::ShuttingDown` when the pool is closed
    pub async fn dispatch(&self, invocation: ActivityInvocation) -> Result<Value, ActivityError> {
        let registered = self.registry.get(&invocation.activity).ok_or_else(|| {
            ActivityError::NotRegistered {
                activity: invocation.activity.clone(),
            }
        })?;

        if registered.is_governed() {
            self.check_governance(&invocation).await?;
        }

        self.execute(registered, invocation).await
    }

    /// Obtain and resolve the governance decision, erroring on block.
    async fn check_governance(&self, invocation: &ActivityInvocation) -> Result<(), ActivityError> {
        // Bootstrap refuses governed registrations without a configured
        // gate, so a missing gate here is treated as unavailable
        // governance with nothing to fall back on.
        let Some(gate) = &self.gate else {
            return Err(ActivityError::GovernanceBlocked {
                activity: invocation.activity.clone(),
                reason: "governance not configured".to_string(),
            });
        };

        let timed = gate.decision_point.decide(invocation).await;

        match resolve(&timed.decision, gate.fallback) {
            Resolution::Proceed => {
                debug!(
                    activity = %invocation.activity,
                    invocation_id = %invocation.invocation_id,
                    latency_ms = timed.latency.as_millis() as u64,
                    "Governance check passed"
                );
                Ok(())
            }
            Resolution::Block { reason } => {
                info!(
                    activity = %invocation.activity,
                    invocation_id = %invocation.invocation_id,
                    reason = %reason,
                    "Invocation blocked by governance"
                );
                Err(ActivityError::GovernanceBlocked {
                    activity: invocation.activity.clone(),
                    reason,
                })
            }
        }
    }

    /// Execute the body on the pool; plain and governed bodies share
    /// this path so pool accounting covers both.
    async fn execute(
        &self,
        registered: &RegisteredActivity,
        invocation: ActivityInvocation,
    ) -> Result<Value, ActivityError> {
        let activity = Arc::clone(registered.activity());
        let ctx = InvocationContext {
            invocation_id: invocation.invocation_id,
            task_queue: invocation.task_queue,
            workflow_id: invocation.workflow_id,
            instrumentation: Arc::clone(&self.instrumentation),
        };
        let args = invocation.args;

        self.pool.run(move || activity.run(&ctx, args)).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
