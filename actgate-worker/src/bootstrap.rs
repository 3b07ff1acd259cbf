//! Worker bootstrap and teardown.
//!
//! Implements: REQ-OPS-002 (Bootstrap and Cleanup)
//!
//! Owns the full worker lifetime: resource creation in order, the
//! serve loop, and teardown. Teardown runs on every exit path
//! (normal shutdown, initialization failure, cancellation) and tool
//! client cleanup happens exactly once because the manager itself is
//! idempotent.

use std::sync::Arc;

use tracing::{error, info, warn};

use actgate_core::config::WorkerConfig;
use actgate_core::error::ActGateError;
use actgate_core::governance::HttpDecisionPoint;
use actgate_core::instrument::Instrumentation;

use crate::activity::ActivityRegistry;
use crate::dispatch::{GovernanceGate, GovernedDispatcher};
use crate::executor::ExecutorPool;
use crate::lifecycle::{LifecycleManager, WorkerState};
use crate::runner::{self, LongPollRunner, Runner};
use crate::tools::ToolClientManager;
use crate::warmup;

/// The assembled worker, ready to run once activities are registered.
pub struct Worker {
    config: WorkerConfig,
    registry: ActivityRegistry,
    tools: Arc<ToolClientManager>,
    lifecycle: Arc<LifecycleManager>,
}

impl Worker {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            registry: ActivityRegistry::new(),
            tools: Arc::new(ToolClientManager::new()),
            lifecycle: Arc::new(LifecycleManager::new()),
        }
    }

    /// Activity registry, populated before [`Worker::run`].
    pub fn registry_mut(&mut self) -> &mut ActivityRegistry {
        &mut self.registry
    }

    /// Tool client manager shared with activities.
    #[must_use]
    pub fn tools(&self) -> Arc<ToolClientManager> {
        Arc::clone(&self.tools)
    }

    /// Lifecycle handle, used by signal handlers to request shutdown.
    #[must_use]
    pub fn lifecycle(&self) -> Arc<LifecycleManager> {
        Arc::clone(&self.lifecycle)
    }

    /// Run against the engine configured in `ACTGATE_ENGINE_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::InvalidConfig` when no engine URL is
    /// configured, plus anything [`Worker::run`] can return.
    pub async fn run_configured(self) -> Result<(), ActGateError> {
        let engine_url =
            self.config
                .engine_url
                .clone()
                .ok_or_else(|| ActGateError::InvalidConfig {
                    details: "ACTGATE_ENGINE_URL must be set".to_string(),
                })?;
        let runner = LongPollRunner::new(&engine_url, &self.config.task_queue)?;
        self.run(Arc::new(runner)).await
    }

    /// Run the worker until shutdown is requested.
    ///
    /// Implements: REQ-OPS-002/§9.1
    ///
    /// # Errors
    ///
    /// Initialization failures abort before any task is accepted.
    /// Whatever the outcome, tool clients are cleaned up before this
    /// returns.
    pub async fn run(self, runner: Arc<dyn Runner>) -> Result<(), ActGateError> {
        let Self {
            config,
            registry,
            tools,
            lifecycle,
        } = self;

        lifecycle.transition_to(WorkerState::Initializing);

        let result = Self::init_and_serve(&config, registry, &lifecycle, runner).await;

        // Teardown runs regardless of how init_and_serve exited.
        lifecycle.transition_to(WorkerState::ShuttingDown);
        if let Err(e) = tools.cleanup().await {
            // Cleanup failure is reported but does not mask the run's
            // own outcome.
            error!(error = %e, "Tool client cleanup reported failures");
        }
        lifecycle.transition_to(WorkerState::Stopped);
        info!("Worker stopped");

        result
    }

    async fn init_and_serve(
        config: &WorkerConfig,
        registry: ActivityRegistry,
        lifecycle: &Arc<LifecycleManager>,
        runner: Arc<dyn Runner>,
    ) -> Result<(), ActGateError> {
        // Governed registrations are refused outright when no
        // governance endpoint is configured; silently running them
        // ungoverned would defeat the gate.
        if config.governance.is_none() && !registry.governed_names().is_empty() {
            return Err(ActGateError::ResourceInit {
                stage: "governance-client",
                reason: format!(
                    "governed activities registered ({}) but ACTGATE_GOVERNANCE_URL is unset",
                    registry.governed_names().join(", ")
                ),
            });
        }

        let pool = Arc::new(ExecutorPool::new(config.executor_pool_size).map_err(|e| {
            ActGateError::ResourceInit {
                stage: "executor-pool",
                reason: e.to_string(),
            }
        })?);

        let gate = match &config.governance {
            Some(policy) => {
                info!(
                    endpoint = %policy.endpoint,
                    fallback = %policy.fallback,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    governed = ?registry.governed_names(),
                    "Governance gate enabled"
                );
                let point = HttpDecisionPoint::new(policy.clone()).map_err(|e| {
                    ActGateError::ResourceInit {
                        stage: "governance-client",
                        reason: e.to_string(),
                    }
                })?;
                Some(GovernanceGate {
                    decision_point: Arc::new(point),
                    fallback: policy.fallback,
                })
            }
            None => {
                info!("No governance endpoint configured, all activities run ungoverned");
                None
            }
        };

        let instrumentation = Arc::new(Instrumentation::from_config(config));

        let dispatcher = Arc::new(GovernedDispatcher::new(
            Arc::new(registry),
            Arc::clone(&pool),
            instrumentation,
            gate,
        ));

        // Best-effort: a failed warm-up never stops the worker.
        warmup::warm_up(config.warmup_url.as_deref(), &config.warmup_model).await;

        if !lifecycle.transition_to(WorkerState::Running) {
            // Shutdown was requested during initialization.
            return Ok(());
        }

        runner::serve(
            runner,
            dispatcher,
            Arc::clone(lifecycle),
            config.task_queue.clone(),
        )
        .await;

        // Poll loop exited; stop taking pool work and drain dispatches.
        pool.close();
        match lifecycle.drain(config.drain_timeout).await {
            crate::lifecycle::DrainResult::Complete => {
                info!("All in-flight dispatches drained");
            }
            crate::lifecycle::DrainResult::TimedOut { remaining } => {
                warn!(remaining = remaining, "Shutdown drain timed out");
            }
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
