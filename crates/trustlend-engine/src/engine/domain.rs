use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money;

/// Lifecycle state of a loan as recorded by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    Requested,
    Active,
    Repaid,
    Defaulted,
    Liquidated,
}

impl LoanState {
    pub const fn label(self) -> &'static str {
        match self {
            LoanState::Requested => "requested",
            LoanState::Active => "active",
            LoanState::Repaid => "repaid",
            LoanState::Defaulted => "defaulted",
            LoanState::Liquidated => "liquidated",
        }
    }

    /// States counted as a default when rebuilding a borrower's history.
    pub const fn is_default(self) -> bool {
        matches!(self, LoanState::Defaulted | LoanState::Liquidated)
    }
}

/// Status of a single installment.
///
/// `Paid` is terminal; `Open` moves to `Late` once the due date (plus any
/// tolerance) passes, and `Late` never reverts to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Open,
    Paid,
    Late,
}

impl InstallmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InstallmentStatus::Open => "open",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Late => "late",
        }
    }
}

/// One scheduled repayment slice of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub index: u32,
    pub amount_micro: i64,
    pub due_at: DateTime<Utc>,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A supporter's pledge of social collateral against someone else's loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndorsementInfo {
    pub supporter_id: String,
    pub stake_amount_micro: i64,
    pub created_at: DateTime<Utc>,
}

/// The fraud-check view of a loan: its principal and current endorsements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInfo {
    pub id: String,
    pub total_amount_micro: i64,
    pub endorsements: Vec<EndorsementInfo>,
}

impl LoanInfo {
    pub fn total_stake_micro(&self) -> i64 {
        self.endorsements
            .iter()
            .map(|endorsement| endorsement.stake_amount_micro)
            .sum()
    }

    /// Sum of stakes over principal, expressed 0..=100.
    pub fn coverage_pct(&self) -> f64 {
        money::coverage_pct(self.total_stake_micro(), self.total_amount_micro)
    }
}

/// Minimal user view consumed by the multi-account heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
}
