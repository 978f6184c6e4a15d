//! Parameter-change validation and versioned, delayed activation.
//!
//! Governance rejections are expected control flow, so the proposal entry
//! point never returns an error: callers branch on the outcome variant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::pricing::PricingTable;

/// Cool-down between proposal and effect, preventing instant parameter
/// changes. Simulation scale, like the fraud review block.
pub const ACTIVATION_DELAY_SECONDS: i64 = 30;

/// Platform roles relevant to governance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Borrower,
    Supporter,
    Provider,
    Operator,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Borrower => "borrower",
            Role::Supporter => "supporter",
            Role::Provider => "provider",
            Role::Operator => "operator",
        }
    }
}

/// The mutable system parameters a proposal may change. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterChanges {
    pub pricing_table: Option<PricingTable>,
    pub late_tolerance_seconds: Option<i64>,
    pub installment_period_seconds: Option<i64>,
}

/// An accepted, versioned parameter update awaiting activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub version: String,
    pub changes: ParameterChanges,
    pub proposed_by: String,
    pub proposed_at: DateTime<Utc>,
    pub activates_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Outcome of a parameter proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalOutcome {
    Accepted(ParameterUpdate),
    Rejected { reason: String },
}

impl ProposalOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProposalOutcome::Accepted(_))
    }

    pub fn summary(&self) -> String {
        match self {
            ProposalOutcome::Accepted(update) => {
                format!("accepted as {} activating {}", update.version, update.activates_at)
            }
            ProposalOutcome::Rejected { reason } => format!("rejected: {reason}"),
        }
    }
}

/// Validate a proposed parameter change and, when acceptable, mint the next
/// patch version with a delayed activation time.
pub fn propose_parameter_update(
    current_version: &str,
    changes: &ParameterChanges,
    proposer_role: Role,
    proposer_id: &str,
    now: DateTime<Utc>,
) -> ProposalOutcome {
    if proposer_role != Role::Operator {
        return ProposalOutcome::Rejected {
            reason: format!(
                "role '{}' may not change system parameters",
                proposer_role.label()
            ),
        };
    }

    if let Some(tolerance) = changes.late_tolerance_seconds {
        if tolerance <= 0 {
            return ProposalOutcome::Rejected {
                reason: format!("late tolerance must be positive, got {tolerance}"),
            };
        }
    }
    if let Some(period) = changes.installment_period_seconds {
        if period <= 0 {
            return ProposalOutcome::Rejected {
                reason: format!("installment period must be positive, got {period}"),
            };
        }
    }
    if let Some(table) = &changes.pricing_table {
        if let Err(violation) = table.validate() {
            return ProposalOutcome::Rejected {
                reason: format!("invalid pricing table: {violation}"),
            };
        }
    }

    let Some(version) = next_patch_version(current_version) else {
        return ProposalOutcome::Rejected {
            reason: format!("current version '{current_version}' is not a vMAJOR.MINOR.PATCH string"),
        };
    };

    ProposalOutcome::Accepted(ParameterUpdate {
        version,
        changes: changes.clone(),
        proposed_by: proposer_id.to_string(),
        proposed_at: now,
        activates_at: now + Duration::seconds(ACTIVATION_DELAY_SECONDS),
        is_active: false,
    })
}

/// Whether a version whose activation time has been reached is in effect.
pub fn is_version_active(activates_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= activates_at
}

fn next_patch_version(current: &str) -> Option<String> {
    let rest = current.strip_prefix('v')?;
    let mut parts = rest.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    let patch: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("v{major}.{minor}.{}", patch + 1))
}
