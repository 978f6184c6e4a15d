//! Installment schedule generation, overdue detection, and FIFO payment
//! application.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money;

use super::domain::{Installment, InstallmentStatus};

const BPS_SCALE: i64 = 10_000;
const DAYS_PER_YEAR: i64 = 365;

/// Total owed under simple interest, rounded once at the total.
///
/// `principal * (1 + apr/10000 * term/365)`, computed as a single rounded
/// integer division so per-installment splitting never compounds rounding
/// drift.
pub fn total_repayable(
    principal_micro: i64,
    apr_bps: i64,
    term_days: u32,
) -> Result<i64, EngineError> {
    let year_scale = BPS_SCALE * DAYS_PER_YEAR;
    money::mul_div_round(
        principal_micro,
        year_scale + apr_bps * i64::from(term_days),
        year_scale,
    )
}

/// Generate the full installment schedule for a newly originated loan.
///
/// The total splits into equal rounded parts; the last installment absorbs
/// the remainder so the schedule sums exactly to the total. Due dates are
/// spaced `interval` apart starting one interval after `start`, so nothing
/// is ever due immediately.
pub fn generate_installments(
    principal_micro: i64,
    apr_bps: i64,
    term_days: u32,
    num_installments: u32,
    interval: Duration,
    start: DateTime<Utc>,
) -> Result<Vec<Installment>, EngineError> {
    if principal_micro <= 0 {
        return Err(EngineError::NonPositiveAmount {
            field: "principal_micro",
            value: principal_micro,
        });
    }
    if num_installments == 0 {
        return Err(EngineError::ZeroInstallments);
    }
    if interval <= Duration::zero() {
        return Err(EngineError::NonPositiveInterval);
    }

    let total = total_repayable(principal_micro, apr_bps, term_days)?;
    let count = i64::from(num_installments);
    let per_installment = money::mul_div_round(total, 1, count)?;
    let last = total - per_installment * (count - 1);

    let mut schedule = Vec::with_capacity(num_installments as usize);
    for index in 0..num_installments {
        let amount_micro = if index + 1 == num_installments {
            last
        } else {
            per_installment
        };
        schedule.push(Installment {
            index,
            amount_micro,
            due_at: start + interval * (index as i32 + 1),
            status: InstallmentStatus::Open,
            paid_at: None,
        });
    }
    Ok(schedule)
}

/// Re-evaluate overdue state against the current time.
///
/// Paid installments never change; an open installment turns late once
/// `now` passes its due date plus the governance late tolerance; a late
/// installment never reverts to open.
pub fn update_installment_status(
    installments: &[Installment],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Vec<Installment> {
    installments
        .iter()
        .map(|installment| {
            let mut updated = installment.clone();
            if updated.status == InstallmentStatus::Open && now > updated.due_at + tolerance {
                updated.status = InstallmentStatus::Late;
            }
            updated
        })
        .collect()
}

/// Portion of a payment applied to one installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPayment {
    pub index: u32,
    pub amount_micro: i64,
}

/// Result of applying one incoming payment across a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// The schedule after application, ordered by ascending index.
    pub installments: Vec<Installment>,
    /// Indices fully covered (and marked paid) by this payment.
    pub paid_indices: Vec<u32>,
    /// Per-installment application ledger, including any partial portion.
    pub applied: Vec<AppliedPayment>,
    /// `max(0, total owed across non-paid installments − payment)`.
    pub remaining_balance_micro: i64,
}

/// Apply a payment strictly FIFO by ascending index across non-paid
/// installments.
///
/// An installment is marked paid only when this single pass covers its full
/// amount. A partial portion consumes the payment and appears in `applied`,
/// but leaves the installment unpaid; callers decide how to carry partial
/// amounts forward.
pub fn process_payment(
    installments: &[Installment],
    payment_micro: i64,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome, EngineError> {
    if payment_micro <= 0 {
        return Err(EngineError::NonPositiveAmount {
            field: "payment_micro",
            value: payment_micro,
        });
    }

    let mut updated = installments.to_vec();
    updated.sort_by_key(|installment| installment.index);

    let total_owed: i64 = updated
        .iter()
        .filter(|installment| installment.status != InstallmentStatus::Paid)
        .map(|installment| installment.amount_micro)
        .sum();

    let mut remaining = payment_micro;
    let mut paid_indices = Vec::new();
    let mut applied = Vec::new();

    for installment in &mut updated {
        if remaining <= 0 {
            break;
        }
        if installment.status == InstallmentStatus::Paid {
            continue;
        }
        let portion = remaining.min(installment.amount_micro);
        applied.push(AppliedPayment {
            index: installment.index,
            amount_micro: portion,
        });
        if portion == installment.amount_micro {
            installment.status = InstallmentStatus::Paid;
            installment.paid_at = Some(now);
            paid_indices.push(installment.index);
        }
        remaining -= portion;
    }

    Ok(PaymentOutcome {
        installments: updated,
        paid_indices,
        applied,
        remaining_balance_micro: (total_owed - payment_micro).max(0),
    })
}
