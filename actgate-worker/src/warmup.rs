//! Cold-start warm-up.
//!
//! Implements: REQ-OPS-003 (Cold-Start Warm-Up)
//!
//! Pre-loads the local inference model before the worker starts
//! polling so the first real activity does not pay the model load
//! cost. Strictly best-effort: every failure is logged and folded
//! into the report, never propagated. The worker starts either way.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

/// Budget for the warm-up request. Model loads are slow, but a worker
/// should not stall startup indefinitely on one.
const WARMUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of the warm-up attempt, for startup logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmUpReport {
    /// No warm-up endpoint configured.
    Skipped,
    /// The model responded within the budget.
    Warmed { model: String, elapsed_ms: u64 },
    /// The attempt failed; the worker proceeds cold.
    Failed { model: String, reason: String },
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Issue a single generation request to pre-load the model.
///
/// Never returns an error: a cold model is a latency problem, not a
/// startup problem.
pub async fn warm_up(url: Option<&str>, model: &str) -> WarmUpReport {
    let Some(url) = url else {
        return WarmUpReport::Skipped;
    };

    let started = Instant::now();
    let report = attempt(url, model).await;
    match &report {
        WarmUpReport::Warmed { elapsed_ms, .. } => {
            info!(model = model, elapsed_ms = elapsed_ms, "Model warm-up complete");
        }
        WarmUpReport::Failed { reason, .. } => {
            warn!(
                model = model,
                reason = %reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Model warm-up failed, starting cold"
            );
        }
        WarmUpReport::Skipped => {}
    }
    report
}

async fn attempt(url: &str, model: &str) -> WarmUpReport {
    let client = match reqwest::Client::builder().timeout(WARMUP_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            return WarmUpReport::Failed {
                model: model.to_string(),
                reason: format!("failed to build warm-up client: {e}"),
            };
        }
    };

    let endpoint = format!("{}/api/generate", url.trim_end_matches('/'));
    let body = GenerateRequest {
        model,
        prompt: "ok",
        stream: false,
    };

    let started = Instant::now();
    match client.post(&endpoint).json(&body).send().await {
        Ok(response) if response.status().is_success() => WarmUpReport::Warmed {
            model: model.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        Ok(response) => WarmUpReport::Failed {
            model: model.to_string(),
            reason: format!("warm-up endpoint returned {}", response.status()),
        },
        Err(e) => WarmUpReport::Failed {
            model: model.to_string(),
            reason: format!("warm-up request failed: {e}"),
        },
    }
}
