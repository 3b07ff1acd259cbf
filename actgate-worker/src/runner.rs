//! Task runner: the engine-facing side of the worker.
//!
//! Implements: REQ-OPS-001/§10 (Task Consumption)
//!
//! The [`Runner`] trait abstracts the orchestration engine's worker
//! API so the serve loop and its tests never depend on a live engine.
//! [`LongPollRunner`] is the production implementation, long-polling
//! the engine over HTTP for activity tasks and reporting outcomes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use actgate_core::error::{ActGateError, ActivityError};
use actgate_core::governance::ActivityInvocation;

use crate::dispatch::GovernedDispatcher;
use crate::lifecycle::LifecycleManager;

/// Client-side budget for one long-poll round trip. The engine holds
/// the poll for less than this and answers 204 when idle.
const POLL_TIMEOUT: Duration = Duration::from_secs(70);

/// Pause after a failed poll before retrying, so a down engine does
/// not turn the loop into a busy spin.
const POLL_BACKOFF: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// One activity task handed out by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEnvelope {
    /// Opaque token used to report the outcome.
    pub task_token: String,
    /// Registered activity name to dispatch.
    pub activity: String,
    /// Invocation arguments.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Owning workflow execution, when the engine provides it.
    #[serde(default)]
    pub workflow_id: Option<String>,
}

/// Outcome reported back to the engine for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { result: serde_json::Value },
    Failed { error: String },
}

impl From<Result<serde_json::Value, ActivityError>> for TaskOutcome {
    fn from(result: Result<serde_json::Value, ActivityError>) -> Self {
        match result {
            Ok(value) => Self::Completed { result: value },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Engine transport seam.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Wait for the next task. `Ok(None)` means the poll expired with
    /// no work, which is the steady-state idle outcome.
    async fn poll(&self) -> Result<Option<TaskEnvelope>, ActGateError>;

    /// Report a task outcome to the engine.
    async fn report(&self, task_token: &str, outcome: &TaskOutcome) -> Result<(), ActGateError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Long-Poll Runner
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP long-poll implementation of [`Runner`].
pub struct LongPollRunner {
    client: reqwest::Client,
    poll_url: String,
    report_base: String,
}

impl LongPollRunner {
    /// Build a runner for the given engine URL and task queue.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::InvalidConfig` if the HTTP client cannot
    /// be constructed.
    pub fn new(engine_url: &str, task_queue: &str) -> Result<Self, ActGateError> {
        let client = reqwest::Client::builder()
            .timeout(POLL_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ActGateError::InvalidConfig {
                details: format!("failed to build engine HTTP client: {e}"),
            })?;

        let base = engine_url.trim_end_matches('/');
        Ok(Self {
            client,
            poll_url: format!("{base}/v1/task-queues/{task_queue}/poll"),
            report_base: format!("{base}/v1/tasks"),
        })
    }
}

#[async_trait]
impl Runner for LongPollRunner {
    async fn poll(&self) -> Result<Option<TaskEnvelope>, ActGateError> {
        let response = match self.client.get(&self.poll_url).send().await {
            Ok(response) => response,
            // A client-side poll timeout is an idle cycle, not a fault.
            Err(e) if e.is_timeout() => return Ok(None),
            Err(e) => {
                return Err(ActGateError::Runner {
                    reason: format!("task poll failed: {e}"),
                });
            }
        };

        match response.status() {
            status if status == reqwest::StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let envelope: TaskEnvelope =
                    response.json().await.map_err(|e| ActGateError::Runner {
                        reason: format!("malformed task envelope: {e}"),
                    })?;
                Ok(Some(envelope))
            }
            status => Err(ActGateError::Runner {
                reason: format!("task poll returned {status}"),
            }),
        }
    }

    async fn report(&self, task_token: &str, outcome: &TaskOutcome) -> Result<(), ActGateError> {
        let url = format!("{}/{task_token}/complete", self.report_base);
        let response = self
            .client
            .post(&url)
            .json(outcome)
            .send()
            .await
            .map_err(|e| ActGateError::Runner {
                reason: format!("task report failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(ActGateError::Runner {
                reason: format!("task report returned {}", response.status()),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serve Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Poll-dispatch-report loop. Runs until the lifecycle's shutdown
/// token fires; each task is dispatched concurrently under an
/// in-flight guard so drain can account for it.
pub async fn serve(
    runner: Arc<dyn Runner>,
    dispatcher: Arc<GovernedDispatcher>,
    lifecycle: Arc<LifecycleManager>,
    task_queue: String,
) {
    let shutdown = lifecycle.shutdown_token();
    info!(task_queue = %task_queue, "Worker polling for tasks");

    loop {
        let polled = tokio::select! {
            () = shutdown.cancelled() => break,
            polled = runner.poll() => polled,
        };

        let envelope = match polled {
            Ok(Some(envelope)) => envelope,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Task poll failed, backing off");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(POLL_BACKOFF) => continue,
                }
            }
        };

        let Some(guard) = lifecycle.begin_dispatch() else {
            // Not Running (still initializing or already draining).
            report_or_log(
                &*runner,
                &envelope.task_token,
                &TaskOutcome::Failed {
                    error: ActivityError::ShuttingDown.to_string(),
                },
            )
            .await;
            continue;
        };

        let runner = Arc::clone(&runner);
        let dispatcher = Arc::clone(&dispatcher);
        let task_queue = task_queue.clone();
        tokio::spawn(async move {
            // Guard lives for the whole dispatch, including reporting.
            let _guard = guard;
            let invocation = ActivityInvocation {
                activity: envelope.activity,
                args: envelope.args,
                invocation_id: uuid::Uuid::new_v4().to_string(),
                task_queue,
                workflow_id: envelope.workflow_id,
            };
            debug!(
                activity = %invocation.activity,
                invocation_id = %invocation.invocation_id,
                "Dispatching task"
            );
            let outcome = TaskOutcome::from(dispatcher.dispatch(invocation).await);
            report_or_log(&*runner, &envelope.task_token, &outcome).await;
        });
    }

    info!("Worker poll loop stopped");
}

async fn report_or_log(runner: &dyn Runner, task_token: &str, outcome: &TaskOutcome) {
    if let Err(e) = runner.report(task_token, outcome).await {
        error!(task_token = %task_token, error = %e, "Failed to report task outcome");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
