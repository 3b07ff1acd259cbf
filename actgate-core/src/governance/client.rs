//! HTTP decision client.
//!
//! Implements: REQ-GOV-001 (Decision Client)
//!
//! A single decision request per invocation, bounded by the configured
//! deadline. There is no retry: a slow or unreachable decision point
//! surfaces as `Timeout` or `TransportError` and the fallback mode
//! decides what happens next.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::GovernancePolicy;
use crate::error::ActGateError;

use super::{ActivityInvocation, DecisionRequest, DecisionResponse, GovernanceDecision, TimedDecision};

/// Path of the decision endpoint, relative to the configured base URL.
const DECISION_PATH: &str = "/v1/decisions";

// ─────────────────────────────────────────────────────────────────────────────
// Decision Point Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Seam for obtaining governance decisions.
///
/// The dispatcher depends on this trait rather than a concrete HTTP
/// client so tests can substitute scripted decision points.
#[async_trait]
pub trait DecisionPoint: Send + Sync {
    /// Obtain a decision for the given invocation.
    ///
    /// Implementations must return within approximately the policy
    /// deadline and must never panic; degraded conditions are encoded
    /// in the returned [`GovernanceDecision`].
    async fn decide(&self, invocation: &ActivityInvocation) -> TimedDecision;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Decision Point
// ─────────────────────────────────────────────────────────────────────────────

/// Decision point backed by an HTTP governance service.
///
/// Implements: REQ-GOV-001/§5.2
pub struct HttpDecisionPoint {
    client: reqwest::Client,
    policy: GovernancePolicy,
    decision_url: String,
}

impl HttpDecisionPoint {
    /// Build an HTTP decision point from the governance policy.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::InvalidConfig` if the HTTP client cannot
    /// be constructed (e.g. TLS backend initialization failure).
    pub fn new(policy: GovernancePolicy) -> Result<Self, ActGateError> {
        // Connect deadline is a fraction of the decision deadline so a
        // dead endpoint fails fast instead of eating the whole budget.
        let connect_timeout = policy.timeout.min(Duration::from_secs(5));

        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ActGateError::InvalidConfig {
                details: format!("failed to build governance HTTP client: {e}"),
            })?;

        let decision_url = format!(
            "{}{DECISION_PATH}",
            policy.endpoint.trim_end_matches('/')
        );

        Ok(Self {
            client,
            policy,
            decision_url,
        })
    }

    /// Classify a reqwest failure into a decision outcome.
    fn classify_error(err: &reqwest::Error) -> GovernanceDecision {
        if err.is_timeout() {
            GovernanceDecision::Timeout
        } else if err.is_connect() {
            GovernanceDecision::TransportError {
                reason: "connection failed".to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            GovernanceDecision::TransportError {
                reason: "malformed decision response".to_string(),
            }
        } else {
            GovernanceDecision::TransportError {
                reason: format!("request failed: {err}"),
            }
        }
    }

    async fn request_decision(&self, invocation: &ActivityInvocation) -> GovernanceDecision {
        let body = DecisionRequest {
            activity: &invocation.activity,
            args: &invocation.args,
            invocation_id: &invocation.invocation_id,
            task_queue: &invocation.task_queue,
            workflow_id: invocation.workflow_id.as_deref(),
        };

        let mut request = self.client.post(&self.decision_url).json(&body);
        if let Some(key) = &self.policy.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return Self::classify_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            return GovernanceDecision::TransportError {
                reason: format!("decision endpoint returned {status}"),
            };
        }

        let parsed: DecisionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Self::classify_error(&e),
        };

        match parsed.decision.as_str() {
            "allow" => GovernanceDecision::Allow,
            "deny" => GovernanceDecision::Deny {
                reason: parsed
                    .reason
                    .unwrap_or_else(|| "denied by policy".to_string()),
            },
            other => GovernanceDecision::TransportError {
                reason: format!("unrecognized decision value: '{other}'"),
            },
        }
    }
}

#[async_trait]
impl DecisionPoint for HttpDecisionPoint {
    async fn decide(&self, invocation: &ActivityInvocation) -> TimedDecision {
        let started = Instant::now();

        // Outer deadline covers serialization and response parsing, not
        // just the socket, so the dispatcher's wait is strictly bounded.
        let decision = match tokio::time::timeout(
            self.policy.timeout,
            self.request_decision(invocation),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => GovernanceDecision::Timeout,
        };

        let latency = started.elapsed();

        match &decision {
            GovernanceDecision::Allow | GovernanceDecision::Deny { .. } => {
                debug!(
                    activity = %invocation.activity,
                    invocation_id = %invocation.invocation_id,
                    decision = ?decision,
                    latency_ms = latency.as_millis() as u64,
                    "Governance decision received"
                );
            }
            GovernanceDecision::Timeout => {
                warn!(
                    activity = %invocation.activity,
                    invocation_id = %invocation.invocation_id,
                    timeout_ms = self.policy.timeout.as_millis() as u64,
                    "Governance decision timed out"
                );
            }
            GovernanceDecision::TransportError { reason } => {
                warn!(
                    activity = %invocation.activity,
                    invocation_id = %invocation.invocation_id,
                    reason = %reason,
                    "Governance decision request failed"
                );
            }
        }

        TimedDecision { decision, latency }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackMode;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn policy_for(server: &MockServer, timeout: Duration) -> GovernancePolicy {
        GovernancePolicy {
            endpoint: server.uri(),
            api_key: Some("test-key".to_string()),
            timeout,
            fallback: FallbackMode::FailOpen,
        }
    }

    fn sample_invocation() -> ActivityInvocation {
        ActivityInvocation::new(
            "send_email",
            serde_json::json!({"to": "ops@example.com"}),
            "agent-task-queue",
        )
    }

    #[tokio::test]
    async fn test_allow_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"activity": "send_email"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "decision": "allow"
            })))
            .mount(&server)
            .await;

        let point = HttpDecisionPoint::new(policy_for(&server, Duration::from_secs(5))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert_eq!(timed.decision, GovernanceDecision::Allow);
    }

    #[tokio::test]
    async fn test_deny_decision_carries_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "decision": "deny",
                "reason": "rate limited"
            })))
            .mount(&server)
            .await;

        let point = HttpDecisionPoint::new(policy_for(&server, Duration::from_secs(5))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert_eq!(
            timed.decision,
            GovernanceDecision::Deny {
                reason: "rate limited".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_endpoint_yields_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"decision": "allow"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let point =
            HttpDecisionPoint::new(policy_for(&server, Duration::from_millis(100))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert_eq!(timed.decision, GovernanceDecision::Timeout);
        // The wait is bounded by the deadline, not by the server.
        assert!(timed.latency < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_transport_error() {
        // Bind-then-drop leaves a port with nothing listening.
        let server = MockServer::start().await;
        let policy = policy_for(&server, Duration::from_secs(2));
        drop(server);

        let point = HttpDecisionPoint::new(policy).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert!(matches!(
            timed.decision,
            GovernanceDecision::TransportError { .. } | GovernanceDecision::Timeout
        ));
    }

    #[tokio::test]
    async fn test_server_error_yields_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let point = HttpDecisionPoint::new(policy_for(&server, Duration::from_secs(5))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert!(matches!(
            timed.decision,
            GovernanceDecision::TransportError { reason } if reason.contains("503")
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_yields_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let point = HttpDecisionPoint::new(policy_for(&server, Duration::from_secs(5))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert!(matches!(
            timed.decision,
            GovernanceDecision::TransportError { .. }
        ));
    }

    #[tokio::test]
    async fn test_unrecognized_verdict_yields_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decisions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "decision": "maybe"
            })))
            .mount(&server)
            .await;

        let point = HttpDecisionPoint::new(policy_for(&server, Duration::from_secs(5))).unwrap();
        let timed = point.decide(&sample_invocation()).await;
        assert!(matches!(
            timed.decision,
            GovernanceDecision::TransportError { reason } if reason.contains("maybe")
        ));
    }
}
