//! Fallback resolution.
//!
//! Implements: REQ-GOV-002 (Policy Resolution)
//!
//! A pure function from (decision, fallback mode) to a dispatch
//! verdict. Explicit verdicts are honored regardless of mode; only
//! degraded conditions (timeout, transport failure) consult the mode.

use tracing::warn;

use crate::config::FallbackMode;

use super::{GovernanceDecision, Resolution};

/// Reason string attached to blocks caused by an unreachable decision
/// point under fail_closed.
pub const UNAVAILABLE_REASON: &str = "governance unavailable";

/// Reduce a governance decision to a dispatch verdict.
///
/// Implements: REQ-GOV-002/§4.3
///
/// | decision        | fail_open | fail_closed |
/// |-----------------|-----------|-------------|
/// | Allow           | Proceed   | Proceed     |
/// | Deny            | Block     | Block       |
/// | Timeout         | Proceed   | Block       |
/// | TransportError  | Proceed   | Block       |
#[must_use]
pub fn resolve(decision: &GovernanceDecision, fallback: FallbackMode) -> Resolution {
    match decision {
        GovernanceDecision::Allow => Resolution::Proceed,
        GovernanceDecision::Deny { reason } => Resolution::Block {
            reason: reason.clone(),
        },
        GovernanceDecision::Timeout | GovernanceDecision::TransportError { .. } => match fallback {
            FallbackMode::FailOpen => {
                warn!(
                    decision = ?decision,
                    "Governance unreachable, proceeding under fail_open"
                );
                Resolution::Proceed
            }
            FallbackMode::FailClosed => Resolution::Block {
                reason: UNAVAILABLE_REASON.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny(reason: &str) -> GovernanceDecision {
        GovernanceDecision::Deny {
            reason: reason.to_string(),
        }
    }

    fn transport(reason: &str) -> GovernanceDecision {
        GovernanceDecision::TransportError {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_allow_proceeds_in_both_modes() {
        for mode in [FallbackMode::FailOpen, FallbackMode::FailClosed] {
            assert_eq!(resolve(&GovernanceDecision::Allow, mode), Resolution::Proceed);
        }
    }

    #[test]
    fn test_deny_blocks_in_both_modes() {
        for mode in [FallbackMode::FailOpen, FallbackMode::FailClosed] {
            assert_eq!(
                resolve(&deny("rate limited"), mode),
                Resolution::Block {
                    reason: "rate limited".to_string()
                }
            );
        }
    }

    #[test]
    fn test_timeout_proceeds_under_fail_open() {
        assert_eq!(
            resolve(&GovernanceDecision::Timeout, FallbackMode::FailOpen),
            Resolution::Proceed
        );
    }

    #[test]
    fn test_timeout_blocks_under_fail_closed() {
        assert_eq!(
            resolve(&GovernanceDecision::Timeout, FallbackMode::FailClosed),
            Resolution::Block {
                reason: UNAVAILABLE_REASON.to_string()
            }
        );
    }

    #[test]
    fn test_transport_error_proceeds_under_fail_open() {
        assert_eq!(
            resolve(&transport("connection failed"), FallbackMode::FailOpen),
            Resolution::Proceed
        );
    }

    #[test]
    fn test_transport_error_blocks_under_fail_closed() {
        assert_eq!(
            resolve(&transport("connection failed"), FallbackMode::FailClosed),
            Resolution::Block {
                reason: UNAVAILABLE_REASON.to_string()
            }
        );
    }
}
