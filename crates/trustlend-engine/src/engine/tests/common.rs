use chrono::{DateTime, Utc};

use crate::engine::domain::{
    EndorsementInfo, Installment, InstallmentStatus, LoanInfo, UserInfo,
};
use crate::engine::pricing::PricingTable;
use crate::engine::waterfall::StakeInfo;

/// Simulated-time helper anchored at the Unix epoch.
pub(super) fn ts(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).expect("valid timestamp")
}

pub(super) fn standard_table() -> PricingTable {
    PricingTable::standard()
}

pub(super) fn installment(
    index: u32,
    amount_micro: i64,
    due_seconds: i64,
    status: InstallmentStatus,
) -> Installment {
    Installment {
        index,
        amount_micro,
        due_at: ts(due_seconds),
        status,
        paid_at: None,
    }
}

pub(super) fn endorsement(
    supporter_id: &str,
    stake_amount_micro: i64,
    created_seconds: i64,
) -> EndorsementInfo {
    EndorsementInfo {
        supporter_id: supporter_id.to_string(),
        stake_amount_micro,
        created_at: ts(created_seconds),
    }
}

pub(super) fn loan(total_amount_micro: i64, endorsements: Vec<EndorsementInfo>) -> LoanInfo {
    LoanInfo {
        id: "loan-001".to_string(),
        total_amount_micro,
        endorsements,
    }
}

pub(super) fn user(id: &str, created_seconds: i64) -> UserInfo {
    UserInfo {
        id: id.to_string(),
        created_at: ts(created_seconds),
    }
}

pub(super) fn stake(supporter_id: &str, stake_micro: i64) -> StakeInfo {
    StakeInfo {
        supporter_id: supporter_id.to_string(),
        stake_micro,
    }
}
