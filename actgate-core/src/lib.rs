//! ActGate core: transport-agnostic governance library.
//!
//! This library provides the governance decision client, policy
//! resolution, configuration, I/O instrumentation hooks, and error types
//! used by the activity worker (`actgate-worker`).
//!
//! # Traceability
//! - Implements: REQ-GOV-001 (Governance Decision Client)
//! - Implements: REQ-GOV-002 (Policy Resolution)
//! - Implements: REQ-CFG-001 (Configuration)
//! - Implements: REQ-OBS-001 (I/O Instrumentation Hooks)
//! - Implements: REQ-ERR-001 (Error Taxonomy)

pub mod config;
pub mod error;
pub mod governance;
pub mod instrument;

pub use config::{FallbackMode, GovernancePolicy, WorkerConfig};
pub use error::{ActGateError, ActivityError};
pub use governance::{
    ActivityInvocation, DecisionPoint, GovernanceDecision, HttpDecisionPoint, Resolution,
    TimedDecision, resolve,
};
pub use instrument::{InstrumentTarget, Instrumentation};
