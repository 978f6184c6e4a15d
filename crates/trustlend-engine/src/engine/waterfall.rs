//! Loss distribution on default: collateral, then supporter stakes
//! proportionally, then the mutual fund.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money;

/// One supporter's active stake at liquidation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub supporter_id: String,
    pub stake_micro: i64,
}

/// Per-supporter split of stake into absorbed cut and released remainder.
///
/// Invariant: `cut_micro + released_micro == original_stake_micro` and
/// `cut_micro >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterCut {
    pub supporter_id: String,
    pub original_stake_micro: i64,
    pub cut_micro: i64,
    pub released_micro: i64,
}

/// Outcome of one waterfall execution.
///
/// `total_recovered_micro` equals collateral plus all cuts plus the mutual
/// fund draw, and never exceeds the requested loss. Anything beyond the
/// three sources is an unrecovered shortfall the caller computes as
/// `total_loss − total_recovered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub collateral_used_micro: i64,
    pub supporter_cuts: Vec<SupporterCut>,
    pub mutual_fund_used_micro: i64,
    pub total_recovered_micro: i64,
}

/// Distribute a realized loss across the three absorption stages in order.
///
/// Each stage only sees the loss remaining after the prior stage. Supporter
/// cuts are proportional to stake and individually capped at the stake, so
/// no supporter ever loses more than they pledged and no cut borrows from
/// another supporter. Shares floor-divide, so rounding dust falls through
/// to the mutual fund stage instead of being over-collected.
pub fn execute_waterfall(
    total_loss_micro: i64,
    borrower_collateral_micro: i64,
    stakes: &[StakeInfo],
    mutual_fund_available_micro: i64,
) -> Result<WaterfallResult, EngineError> {
    for (field, value) in [
        ("total_loss_micro", total_loss_micro),
        ("borrower_collateral_micro", borrower_collateral_micro),
        ("mutual_fund_available_micro", mutual_fund_available_micro),
    ] {
        if value < 0 {
            return Err(EngineError::NegativeAmount { field, value });
        }
    }
    for stake in stakes {
        if stake.stake_micro <= 0 {
            return Err(EngineError::NonPositiveAmount {
                field: "stake_micro",
                value: stake.stake_micro,
            });
        }
    }

    let mut remaining = total_loss_micro;

    let collateral_used_micro = remaining.min(borrower_collateral_micro);
    remaining -= collateral_used_micro;

    let total_stakes: i64 = stakes.iter().map(|stake| stake.stake_micro).sum();
    let mut supporter_cuts = Vec::with_capacity(stakes.len());
    let mut cuts_total = 0i64;
    for stake in stakes {
        let cut_micro = if remaining > 0 && total_stakes > 0 {
            money::mul_div_floor(remaining, stake.stake_micro, total_stakes)?
                .min(stake.stake_micro)
        } else {
            0
        };
        cuts_total += cut_micro;
        supporter_cuts.push(SupporterCut {
            supporter_id: stake.supporter_id.clone(),
            original_stake_micro: stake.stake_micro,
            cut_micro,
            released_micro: stake.stake_micro - cut_micro,
        });
    }
    remaining -= cuts_total;

    let mutual_fund_used_micro = remaining.min(mutual_fund_available_micro);

    Ok(WaterfallResult {
        collateral_used_micro,
        supporter_cuts,
        mutual_fund_used_micro,
        total_recovered_micro: collateral_used_micro + cuts_total + mutual_fund_used_micro,
    })
}

/// Non-mutating preview of a waterfall run with derived recovery metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallPreview {
    pub result: WaterfallResult,
    /// Recovered fraction of the requested loss; 1.0 for a zero loss.
    pub recovery_rate: f64,
    pub shortfall_micro: i64,
}

pub fn simulate_waterfall(
    total_loss_micro: i64,
    borrower_collateral_micro: i64,
    stakes: &[StakeInfo],
    mutual_fund_available_micro: i64,
) -> Result<WaterfallPreview, EngineError> {
    let result = execute_waterfall(
        total_loss_micro,
        borrower_collateral_micro,
        stakes,
        mutual_fund_available_micro,
    )?;
    let shortfall_micro = total_loss_micro - result.total_recovered_micro;
    let recovery_rate = if total_loss_micro == 0 {
        1.0
    } else {
        result.total_recovered_micro as f64 / total_loss_micro as f64
    };
    Ok(WaterfallPreview {
        result,
        recovery_rate,
        shortfall_micro,
    })
}
