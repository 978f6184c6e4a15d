//! The six algorithmic modules of the decision engine.
//!
//! Each module is a set of pure functions over plain value structures; the
//! orchestration layer calls them in dependency order (score → pricing →
//! fraud → servicing → waterfall) as loan lifecycle events occur and
//! persists whatever comes back.

pub mod domain;
pub mod fraud;
pub mod governance;
pub mod pricing;
pub mod score;
pub mod servicing;
pub mod waterfall;

#[cfg(test)]
mod tests;

pub use domain::{EndorsementInfo, Installment, InstallmentStatus, LoanInfo, LoanState, UserInfo};
pub use fraud::{
    fraud_risk_score, review_decision, run_comprehensive_check, FraudAlert, FraudAlertKind,
    FraudCheckConfig, ReviewDecision, Severity,
};
pub use governance::{
    is_version_active, propose_parameter_update, ParameterChanges, ParameterUpdate,
    ProposalOutcome, Role,
};
pub use pricing::{
    is_within_credit_limit, minimum_coverage, price_by_score, CoverageAdjustment, PricingResult,
    PricingTable, PricingTableError, PricingTier, RiskTier,
};
pub use score::{compute_score, score_inputs_from_history, ScoreInputs};
pub use servicing::{
    generate_installments, process_payment, total_repayable, update_installment_status,
    AppliedPayment, PaymentOutcome,
};
pub use waterfall::{
    execute_waterfall, simulate_waterfall, StakeInfo, SupporterCut, WaterfallPreview,
    WaterfallResult,
};
