//! Credit score computation from payment history.
//!
//! The score is a fixed additive rule set, not a probabilistic model:
//! identical inputs always produce the identical 0..=100 value, which is
//! what lets stored decision hashes be re-verified later.

use serde::{Deserialize, Serialize};

use super::domain::{Installment, InstallmentStatus, LoanState};

const ON_TIME_BONUS: i64 = 2;
const LATE_PENALTY: i64 = 3;
const DEFAULT_PENALTY: i64 = 10;
const HIGH_COVERAGE_BONUS: i64 = 1;
const HIGH_COVERAGE_THRESHOLD_PCT: f64 = 80.0;
const UNDER_REVIEW_PENALTY: i64 = 5;

/// Inputs to one score recalculation.
///
/// Built fresh from the borrower's full history every time a recalculation
/// triggers; the engine never caches or defaults any field (the nominal
/// base of 50 is the caller's convention, not ours).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub base: i64,
    pub on_time_payments: u32,
    pub late_count: u32,
    pub has_defaulted: bool,
    pub coverage_pct: f64,
    pub under_review: bool,
}

/// Apply the additive rule set and clamp to 0..=100.
///
/// +2 per on-time payment, −3 per late payment, −10 once on default,
/// +1 when coverage is at least 80%, −5 while under fraud review.
pub fn compute_score(inputs: &ScoreInputs) -> u8 {
    let mut score = inputs.base;
    score += ON_TIME_BONUS * i64::from(inputs.on_time_payments);
    score -= LATE_PENALTY * i64::from(inputs.late_count);
    if inputs.has_defaulted {
        score -= DEFAULT_PENALTY;
    }
    if inputs.coverage_pct >= HIGH_COVERAGE_THRESHOLD_PCT {
        score += HIGH_COVERAGE_BONUS;
    }
    if inputs.under_review {
        score -= UNDER_REVIEW_PENALTY;
    }
    score.clamp(0, 100) as u8
}

/// Derive [`ScoreInputs`] from a borrower's full installment and loan-state
/// history. This is the standard way callers build the inputs.
pub fn score_inputs_from_history(
    base: i64,
    installments: &[Installment],
    loan_states: &[LoanState],
    coverage_pct: f64,
    under_review: bool,
) -> ScoreInputs {
    let on_time_payments = installments
        .iter()
        .filter(|installment| installment.status == InstallmentStatus::Paid)
        .count() as u32;
    let late_count = installments
        .iter()
        .filter(|installment| installment.status == InstallmentStatus::Late)
        .count() as u32;
    let has_defaulted = loan_states.iter().any(|state| state.is_default());

    ScoreInputs {
        base,
        on_time_payments,
        late_count,
        has_defaulted,
        coverage_pct,
        under_review,
    }
}
