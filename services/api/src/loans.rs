//! Orchestrates the pure decision engine over the persistence traits.
//!
//! Every operation takes the caller's clock as a parameter and funnels the
//! engine's verdicts into the decision log, so replaying the same commands
//! against empty stores reproduces the same hashes.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use trustlend_engine::audit::{decision_hash, idempotency_key};
use trustlend_engine::engine::{
    compute_score, generate_installments, is_version_active, is_within_credit_limit,
    price_by_score, process_payment, propose_parameter_update, review_decision,
    run_comprehensive_check, score_inputs_from_history, simulate_waterfall,
    update_installment_status, EndorsementInfo, FraudAlert, FraudCheckConfig, InstallmentStatus,
    LoanInfo, LoanState, ParameterChanges, ParameterUpdate, PricingTable, ProposalOutcome,
    ReviewDecision, Role, StakeInfo, UserInfo, WaterfallPreview,
};
use trustlend_engine::EngineError;

use crate::infra::{
    DecisionLog, DecisionRecord, LoanRecord, LoanRepository, RepositoryError, UserDirectory,
};

/// Starting score for a borrower with no repayment history.
pub(crate) const BASE_SCORE: u8 = 50;

#[derive(Debug, thiserror::Error)]
pub(crate) enum LoanServiceError {
    #[error("loan '{0}' not found")]
    LoanNotFound(String),
    #[error("loan '{0}' already exists")]
    DuplicateLoan(String),
    #[error("loan '{id}' is {state} and cannot {action}")]
    InvalidState {
        id: String,
        state: &'static str,
        action: &'static str,
    },
    #[error("amount {amount_micro} exceeds the credit limit for score {score}")]
    OverCreditLimit { amount_micro: i64, score: u8 },
    #[error("coverage {actual:.1}% is below the required {required:.1}%")]
    InsufficientCoverage { actual: f64, required: f64 },
    #[error("loan '{0}' is under fraud review")]
    UnderReview(String),
    #[error("supporter '{0}' already endorsed this loan")]
    DuplicateEndorsement(String),
    #[error("borrowers may not endorse their own loan")]
    SelfEndorsement,
    #[error("stake must be positive, got {0}")]
    NonPositiveStake(i64),
    #[error("loan '{0}' has no overdue installments to default on")]
    NothingOverdue(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The parameter set currently in force.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ActiveParameters {
    pub(crate) version: String,
    pub(crate) pricing_table: PricingTable,
    pub(crate) late_tolerance_seconds: i64,
    pub(crate) installment_period_seconds: i64,
}

struct ParameterStoreInner {
    active: ActiveParameters,
    pending: Vec<ParameterUpdate>,
}

/// Versioned system parameters with delayed activation.
///
/// Accepted proposals queue as pending updates; each read first promotes
/// any update whose activation time has arrived.
pub(crate) struct ParameterStore {
    inner: Mutex<ParameterStoreInner>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ParameterStoreInner {
                active: ActiveParameters {
                    version: "v1.0.0".to_string(),
                    pricing_table: PricingTable::standard(),
                    late_tolerance_seconds: 24 * 3_600,
                    installment_period_seconds: 30 * 24 * 3_600,
                },
                pending: Vec::new(),
            }),
        }
    }
}

impl ParameterStore {
    pub(crate) fn active(&self, now: DateTime<Utc>) -> ActiveParameters {
        let mut guard = self.inner.lock().expect("parameter mutex poisoned");
        let due: Vec<ParameterUpdate> = guard
            .pending
            .iter()
            .filter(|update| is_version_active(update.activates_at, now))
            .cloned()
            .collect();
        guard
            .pending
            .retain(|update| !is_version_active(update.activates_at, now));

        for update in due {
            let active = &mut guard.active;
            active.version = update.version;
            if let Some(table) = update.changes.pricing_table {
                active.pricing_table = table;
            }
            if let Some(tolerance) = update.changes.late_tolerance_seconds {
                active.late_tolerance_seconds = tolerance;
            }
            if let Some(period) = update.changes.installment_period_seconds {
                active.installment_period_seconds = period;
            }
        }

        guard.active.clone()
    }

    pub(crate) fn propose(
        &self,
        changes: &ParameterChanges,
        proposer_role: Role,
        proposer_id: &str,
        now: DateTime<Utc>,
    ) -> ProposalOutcome {
        let mut guard = self.inner.lock().expect("parameter mutex poisoned");
        let current_version = guard
            .pending
            .last()
            .map(|update| update.version.clone())
            .unwrap_or_else(|| guard.active.version.clone());

        let outcome =
            propose_parameter_update(&current_version, changes, proposer_role, proposer_id, now);
        if let ProposalOutcome::Accepted(update) = &outcome {
            guard.pending.push(update.clone());
        }
        outcome
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateLoanRequest {
    pub(crate) loan_id: String,
    pub(crate) borrower_id: String,
    pub(crate) principal_micro: i64,
    #[serde(default)]
    pub(crate) collateral_micro: i64,
    pub(crate) term_days: u32,
    pub(crate) num_installments: u32,
}

/// Endorsement result: the updated record plus the fraud screen it triggered.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EndorsementOutcome {
    pub(crate) record: LoanRecord,
    pub(crate) alerts: Vec<FraudAlert>,
    pub(crate) review: ReviewDecision,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PaymentSummary {
    pub(crate) record: LoanRecord,
    pub(crate) paid_indices: Vec<u32>,
    pub(crate) remaining_balance_micro: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LiquidationSummary {
    pub(crate) record: LoanRecord,
    pub(crate) waterfall: WaterfallPreview,
}

/// Service composing the engine modules over loan, user, and decision stores.
pub(crate) struct LoanService<R, U, D> {
    repository: Arc<R>,
    users: Arc<U>,
    decisions: Arc<D>,
    parameters: Arc<ParameterStore>,
    fraud_config: FraudCheckConfig,
}

impl<R, U, D> LoanService<R, U, D>
where
    R: LoanRepository + 'static,
    U: UserDirectory + 'static,
    D: DecisionLog + 'static,
{
    pub(crate) fn new(repository: Arc<R>, users: Arc<U>, decisions: Arc<D>) -> Self {
        Self {
            repository,
            users,
            decisions,
            parameters: Arc::new(ParameterStore::default()),
            fraud_config: FraudCheckConfig::default(),
        }
    }

    pub(crate) fn register_user(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserInfo, LoanServiceError> {
        if let Some(existing) = self.users.fetch(id)? {
            return Ok(existing);
        }
        let user = UserInfo {
            id: id.to_string(),
            created_at: now,
        };
        Ok(self.users.upsert(user)?)
    }

    pub(crate) fn create_loan(
        &self,
        request: CreateLoanRequest,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let params = self.parameters.active(now);
        let history = self.repository.by_borrower(&request.borrower_id)?;
        let score = score_from_history(&history, 0.0, false);

        if !is_within_credit_limit(request.principal_micro, score, &params.pricing_table)? {
            return Err(LoanServiceError::OverCreditLimit {
                amount_micro: request.principal_micro,
                score,
            });
        }

        let pricing = price_by_score(score, 0.0, &params.pricing_table)?;
        let installments = generate_installments(
            request.principal_micro,
            pricing.final_apr_bps,
            request.term_days,
            request.num_installments,
            Duration::seconds(params.installment_period_seconds),
            now,
        )?;

        let record = LoanRecord {
            id: request.loan_id.clone(),
            borrower_id: request.borrower_id,
            principal_micro: request.principal_micro,
            collateral_micro: request.collateral_micro,
            state: LoanState::Requested,
            score,
            pricing,
            endorsements: Vec::new(),
            installments,
            under_review: false,
            review_reason: None,
            created_at: now,
            approved_at: None,
        };

        let stored = self.repository.insert(record).map_err(|err| match err {
            RepositoryError::Conflict => LoanServiceError::DuplicateLoan(request.loan_id.clone()),
            other => LoanServiceError::Repository(other),
        })?;
        self.record_decision(Some(&stored.id), "loan_created", &stored, now)?;
        info!(loan_id = %stored.id, score, "loan originated");
        Ok(stored)
    }

    pub(crate) fn endorse(
        &self,
        loan_id: &str,
        supporter_id: &str,
        stake_amount_micro: i64,
        now: DateTime<Utc>,
    ) -> Result<EndorsementOutcome, LoanServiceError> {
        if stake_amount_micro <= 0 {
            return Err(LoanServiceError::NonPositiveStake(stake_amount_micro));
        }

        let mut record = self.fetch(loan_id)?;
        if record.state != LoanState::Requested {
            return Err(LoanServiceError::InvalidState {
                id: record.id,
                state: record.state.label(),
                action: "accept endorsements",
            });
        }
        if record.borrower_id == supporter_id {
            return Err(LoanServiceError::SelfEndorsement);
        }
        if record
            .endorsements
            .iter()
            .any(|endorsement| endorsement.supporter_id == supporter_id)
        {
            return Err(LoanServiceError::DuplicateEndorsement(
                supporter_id.to_string(),
            ));
        }

        record.endorsements.push(EndorsementInfo {
            supporter_id: supporter_id.to_string(),
            stake_amount_micro,
            created_at: now,
        });

        let params = self.parameters.active(now);
        let loan_view = loan_view(&record);
        let users = self.users.known_users()?;
        let alerts = run_comprehensive_check(&loan_view, &users, None, now, &self.fraud_config);
        let review = review_decision(&alerts, &self.fraud_config);

        record.under_review = review.under_review;
        record.review_reason = review.reason.clone();
        let coverage = loan_view.coverage_pct();
        record.pricing = price_by_score(record.score, coverage, &params.pricing_table)?;
        self.repository.update(record.clone())?;

        let outcome = EndorsementOutcome {
            record,
            alerts,
            review,
        };
        self.record_decision(Some(loan_id), "endorsement", &outcome, now)?;
        Ok(outcome)
    }

    /// Threshold checks only; the engine already priced the loan.
    pub(crate) fn approve(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.fetch(loan_id)?;
        if record.state != LoanState::Requested {
            return Err(LoanServiceError::InvalidState {
                id: record.id,
                state: record.state.label(),
                action: "be approved",
            });
        }

        let loan_view = loan_view(&record);
        let users = self.users.known_users()?;
        let alerts =
            run_comprehensive_check(&loan_view, &users, Some(now), now, &self.fraud_config);
        let review = review_decision(&alerts, &self.fraud_config);
        if review.under_review {
            record.under_review = true;
            record.review_reason = review.reason;
            self.repository.update(record)?;
            return Err(LoanServiceError::UnderReview(loan_id.to_string()));
        }
        if record.under_review {
            return Err(LoanServiceError::UnderReview(loan_id.to_string()));
        }

        let coverage = loan_view.coverage_pct();
        if coverage < record.pricing.required_coverage_pct {
            return Err(LoanServiceError::InsufficientCoverage {
                actual: coverage,
                required: record.pricing.required_coverage_pct,
            });
        }

        record.state = LoanState::Active;
        record.approved_at = Some(now);
        self.repository.update(record.clone())?;
        self.record_decision(Some(loan_id), "loan_approved", &record, now)?;
        info!(loan_id, coverage, "loan approved");
        Ok(record)
    }

    pub(crate) fn repay(
        &self,
        loan_id: &str,
        amount_micro: i64,
        now: DateTime<Utc>,
    ) -> Result<PaymentSummary, LoanServiceError> {
        let mut record = self.fetch(loan_id)?;
        if record.state != LoanState::Active {
            return Err(LoanServiceError::InvalidState {
                id: record.id,
                state: record.state.label(),
                action: "accept payments",
            });
        }

        let outcome = process_payment(&record.installments, amount_micro, now)?;
        record.installments = outcome.installments.clone();
        if record
            .installments
            .iter()
            .all(|installment| installment.status == InstallmentStatus::Paid)
        {
            record.state = LoanState::Repaid;
        }
        self.rescore(&mut record)?;
        self.repository.update(record.clone())?;

        let summary = PaymentSummary {
            record,
            paid_indices: outcome.paid_indices,
            remaining_balance_micro: outcome.remaining_balance_micro,
        };
        self.record_decision(Some(loan_id), "payment", &summary, now)?;
        Ok(summary)
    }

    /// Sweep the schedule for installments past due plus tolerance.
    pub(crate) fn refresh_late(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.fetch(loan_id)?;
        let params = self.parameters.active(now);
        let updated = update_installment_status(
            &record.installments,
            now,
            Duration::seconds(params.late_tolerance_seconds),
        );
        if updated != record.installments {
            record.installments = updated;
            self.rescore(&mut record)?;
            self.repository.update(record.clone())?;
            self.record_decision(Some(loan_id), "late_marking", &record, now)?;
        }
        Ok(record)
    }

    pub(crate) fn mark_default(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.fetch(loan_id)?;
        if record.state != LoanState::Active {
            return Err(LoanServiceError::InvalidState {
                id: record.id,
                state: record.state.label(),
                action: "be defaulted",
            });
        }

        let params = self.parameters.active(now);
        record.installments = update_installment_status(
            &record.installments,
            now,
            Duration::seconds(params.late_tolerance_seconds),
        );
        if !record
            .installments
            .iter()
            .any(|installment| installment.status == InstallmentStatus::Late)
        {
            return Err(LoanServiceError::NothingOverdue(loan_id.to_string()));
        }

        record.state = LoanState::Defaulted;
        self.rescore(&mut record)?;
        self.repository.update(record.clone())?;
        self.record_decision(Some(loan_id), "default", &record, now)?;
        info!(loan_id, "loan defaulted");
        Ok(record)
    }

    pub(crate) fn liquidate(
        &self,
        loan_id: &str,
        mutual_fund_available_micro: i64,
        now: DateTime<Utc>,
    ) -> Result<LiquidationSummary, LoanServiceError> {
        let mut record = self.fetch(loan_id)?;
        if record.state != LoanState::Defaulted {
            return Err(LoanServiceError::InvalidState {
                id: record.id,
                state: record.state.label(),
                action: "be liquidated",
            });
        }

        let outstanding: i64 = record
            .installments
            .iter()
            .filter(|installment| installment.status != InstallmentStatus::Paid)
            .map(|installment| installment.amount_micro)
            .sum();
        let stakes: Vec<StakeInfo> = record
            .endorsements
            .iter()
            .map(|endorsement| StakeInfo {
                supporter_id: endorsement.supporter_id.clone(),
                stake_micro: endorsement.stake_amount_micro,
            })
            .collect();

        let waterfall = simulate_waterfall(
            outstanding,
            record.collateral_micro,
            &stakes,
            mutual_fund_available_micro,
        )?;

        record.state = LoanState::Liquidated;
        self.rescore(&mut record)?;
        self.repository.update(record.clone())?;

        let summary = LiquidationSummary { record, waterfall };
        self.record_decision(Some(loan_id), "liquidation", &summary, now)?;
        info!(
            loan_id,
            recovered = summary.waterfall.result.total_recovered_micro,
            "loan liquidated"
        );
        Ok(summary)
    }

    pub(crate) fn propose_parameters(
        &self,
        changes: &ParameterChanges,
        proposer_role: Role,
        proposer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProposalOutcome, LoanServiceError> {
        let outcome = self.parameters.propose(changes, proposer_role, proposer_id, now);
        if outcome.is_accepted() {
            self.record_decision(None, "parameter_proposal", &outcome, now)?;
        }
        info!(outcome = %outcome.summary(), "parameter proposal evaluated");
        Ok(outcome)
    }

    pub(crate) fn active_parameters(&self, now: DateTime<Utc>) -> ActiveParameters {
        self.parameters.active(now)
    }

    pub(crate) fn get(&self, loan_id: &str) -> Result<LoanRecord, LoanServiceError> {
        self.fetch(loan_id)
    }

    pub(crate) fn decisions(
        &self,
        loan_id: &str,
    ) -> Result<Vec<DecisionRecord>, LoanServiceError> {
        Ok(self.decisions.for_loan(loan_id)?)
    }

    fn fetch(&self, loan_id: &str) -> Result<LoanRecord, LoanServiceError> {
        self.repository
            .fetch(loan_id)?
            .ok_or_else(|| LoanServiceError::LoanNotFound(loan_id.to_string()))
    }

    /// Rebuild the borrower's score from every loan on file, including the
    /// current record's own installments and state.
    fn rescore(&self, record: &mut LoanRecord) -> Result<(), LoanServiceError> {
        let mut history = self.repository.by_borrower(&record.borrower_id)?;
        history.retain(|past| past.id != record.id);
        history.push(record.clone());
        record.score = score_from_history(
            &history,
            loan_view(record).coverage_pct(),
            record.under_review,
        );
        Ok(())
    }

    fn record_decision<T: Serialize>(
        &self,
        loan_id: Option<&str>,
        kind: &str,
        payload: &T,
        now: DateTime<Utc>,
    ) -> Result<DecisionRecord, LoanServiceError> {
        let payload = serde_json::to_value(payload).map_err(EngineError::from)?;
        let record = DecisionRecord {
            loan_id: loan_id.map(str::to_string),
            kind: kind.to_string(),
            idempotency_key: idempotency_key(kind, &payload)?,
            hash: decision_hash(&payload)?,
            payload,
            recorded_at: now,
        };
        Ok(self.decisions.append(record)?)
    }
}

fn loan_view(record: &LoanRecord) -> LoanInfo {
    LoanInfo {
        id: record.id.clone(),
        total_amount_micro: record.principal_micro,
        endorsements: record.endorsements.clone(),
    }
}

fn score_from_history(history: &[LoanRecord], coverage_pct: f64, under_review: bool) -> u8 {
    let installments: Vec<_> = history
        .iter()
        .flat_map(|record| record.installments.iter().cloned())
        .collect();
    let states: Vec<_> = history.iter().map(|record| record.state).collect();
    let inputs = score_inputs_from_history(
        i64::from(BASE_SCORE),
        &installments,
        &states,
        coverage_pct,
        under_review,
    );
    compute_score(&inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryDecisionLog, InMemoryLoanRepository, InMemoryUserDirectory};
    use trustlend_engine::engine::RiskTier;

    const DAY_SECONDS: i64 = 24 * 3_600;
    const UNIT: i64 = 1_000_000;

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).expect("valid timestamp")
    }

    fn service() -> LoanService<InMemoryLoanRepository, InMemoryUserDirectory, InMemoryDecisionLog>
    {
        LoanService::new(
            Arc::new(InMemoryLoanRepository::default()),
            Arc::new(InMemoryUserDirectory::default()),
            Arc::new(InMemoryDecisionLog::default()),
        )
    }

    fn request(loan_id: &str, principal_micro: i64) -> CreateLoanRequest {
        CreateLoanRequest {
            loan_id: loan_id.to_string(),
            borrower_id: "borrower-1".to_string(),
            principal_micro,
            collateral_micro: 100 * UNIT,
            term_days: 90,
            num_installments: 3,
        }
    }

    fn seeded_service(
        now: DateTime<Utc>,
    ) -> LoanService<InMemoryLoanRepository, InMemoryUserDirectory, InMemoryDecisionLog> {
        let service = service();
        for id in ["borrower-1", "alice", "bob"] {
            service
                .register_user(id, now - Duration::days(200))
                .expect("registers user");
        }
        service
    }

    #[test]
    fn fresh_borrower_prices_at_the_base_score() {
        let service = seeded_service(ts(0));
        let record = service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");

        assert_eq!(record.score, BASE_SCORE);
        assert_eq!(record.pricing.tier, RiskTier::Medium);
        assert_eq!(record.state, LoanState::Requested);
        assert_eq!(record.installments.len(), 3);
        // No endorsements yet, so the zero-coverage penalty applies.
        assert_eq!(record.pricing.final_apr_bps, 1_400 + 400);
    }

    #[test]
    fn duplicate_loan_ids_conflict() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        let err = service
            .create_loan(request("loan-1", 500 * UNIT), ts(60))
            .expect_err("rejects duplicate");
        assert!(matches!(err, LoanServiceError::DuplicateLoan(id) if id == "loan-1"));
    }

    #[test]
    fn principal_above_the_tier_limit_is_rejected() {
        let service = seeded_service(ts(0));
        let err = service
            .create_loan(request("loan-1", 5_000 * UNIT), ts(0))
            .expect_err("rejects over-limit request");
        assert!(matches!(err, LoanServiceError::OverCreditLimit { score: 50, .. }));
    }

    #[test]
    fn endorsement_reprices_and_screens_for_fraud() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");

        let first = service
            .endorse("loan-1", "alice", 300 * UNIT, ts(60))
            .expect("endorses");
        // A single endorser holds 100% of stakes, so concentration trips.
        assert!(first.review.under_review);
        assert!(first.record.under_review);

        let second = service
            .endorse("loan-1", "bob", 300 * UNIT, ts(120))
            .expect("endorses");
        assert!(!second.review.under_review);
        assert_eq!(second.record.pricing.adjustment_bps, 0);
        assert_eq!(second.record.pricing.final_apr_bps, 1_400);
    }

    #[test]
    fn self_and_duplicate_endorsements_are_rejected() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");

        let err = service
            .endorse("loan-1", "borrower-1", 100 * UNIT, ts(60))
            .expect_err("rejects self endorsement");
        assert!(matches!(err, LoanServiceError::SelfEndorsement));

        service
            .endorse("loan-1", "alice", 300 * UNIT, ts(60))
            .expect("endorses");
        let err = service
            .endorse("loan-1", "alice", 200 * UNIT, ts(120))
            .expect_err("rejects duplicate supporter");
        assert!(matches!(err, LoanServiceError::DuplicateEndorsement(id) if id == "alice"));
    }

    #[test]
    fn approval_requires_coverage_at_the_tier_threshold() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        service
            .endorse("loan-1", "alice", 100 * UNIT, ts(60))
            .expect("endorses");
        service
            .endorse("loan-1", "bob", 100 * UNIT, ts(120))
            .expect("endorses");

        // 20% coverage against a 50% requirement.
        let err = service
            .approve("loan-1", ts(DAY_SECONDS))
            .expect_err("rejects thin coverage");
        assert!(matches!(err, LoanServiceError::InsufficientCoverage { .. }));
    }

    #[test]
    fn approval_near_fresh_stakes_lands_under_review() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        service
            .endorse("loan-1", "alice", 400 * UNIT, ts(60))
            .expect("endorses");
        service
            .endorse("loan-1", "bob", 200 * UNIT, ts(120))
            .expect("endorses");

        // Stakes landed seconds before approval and one supporter holds
        // two thirds of them; the combined risk crosses the threshold.
        let err = service
            .approve("loan-1", ts(180))
            .expect_err("flags last-minute stakes");
        assert!(matches!(err, LoanServiceError::UnderReview(_)));
    }

    #[test]
    fn full_repayment_closes_the_loan() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        service
            .endorse("loan-1", "alice", 300 * UNIT, ts(60))
            .expect("endorses");
        service
            .endorse("loan-1", "bob", 300 * UNIT, ts(120))
            .expect("endorses");
        let approved = service
            .approve("loan-1", ts(DAY_SECONDS))
            .expect("approves");
        assert_eq!(approved.state, LoanState::Active);

        let total: i64 = approved
            .installments
            .iter()
            .map(|installment| installment.amount_micro)
            .sum();
        let summary = service
            .repay("loan-1", total, ts(2 * DAY_SECONDS))
            .expect("repays in full");

        assert_eq!(summary.record.state, LoanState::Repaid);
        assert_eq!(summary.remaining_balance_micro, 0);
        assert_eq!(summary.paid_indices, vec![0, 1, 2]);
        // Three on-time installments lift the score above base.
        assert!(summary.record.score > BASE_SCORE);
    }

    #[test]
    fn default_requires_an_overdue_installment() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        service
            .endorse("loan-1", "alice", 300 * UNIT, ts(60))
            .expect("endorses");
        service
            .endorse("loan-1", "bob", 300 * UNIT, ts(120))
            .expect("endorses");
        service
            .approve("loan-1", ts(DAY_SECONDS))
            .expect("approves");

        let err = service
            .mark_default("loan-1", ts(2 * DAY_SECONDS))
            .expect_err("nothing overdue yet");
        assert!(matches!(err, LoanServiceError::NothingOverdue(_)));

        let defaulted = service
            .mark_default("loan-1", ts(200 * DAY_SECONDS))
            .expect("defaults overdue loan");
        assert_eq!(defaulted.state, LoanState::Defaulted);
        assert!(defaulted.score < BASE_SCORE);
    }

    #[test]
    fn liquidation_conserves_the_recovered_total() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");
        service
            .endorse("loan-1", "alice", 300 * UNIT, ts(60))
            .expect("endorses");
        service
            .endorse("loan-1", "bob", 300 * UNIT, ts(120))
            .expect("endorses");
        service
            .approve("loan-1", ts(DAY_SECONDS))
            .expect("approves");
        service
            .mark_default("loan-1", ts(200 * DAY_SECONDS))
            .expect("defaults");

        let summary = service
            .liquidate("loan-1", 10_000 * UNIT, ts(201 * DAY_SECONDS))
            .expect("liquidates");
        assert_eq!(summary.record.state, LoanState::Liquidated);

        let result = &summary.waterfall.result;
        let cuts: i64 = result.supporter_cuts.iter().map(|cut| cut.cut_micro).sum();
        assert_eq!(
            result.total_recovered_micro,
            result.collateral_used_micro + cuts + result.mutual_fund_used_micro
        );
        assert_eq!(summary.waterfall.shortfall_micro, 0);

        let decisions = service.decisions("loan-1").expect("lists decisions");
        assert!(decisions.iter().any(|entry| entry.kind == "liquidation"));
        assert!(decisions.iter().all(|entry| entry.hash.len() == 64));
    }

    #[test]
    fn replayed_commands_do_not_duplicate_decisions() {
        let service = seeded_service(ts(0));
        service
            .create_loan(request("loan-1", 1_000 * UNIT), ts(0))
            .expect("creates loan");

        let before = service.decisions("loan-1").expect("lists").len();
        // The replay conflicts before any new decision entry lands.
        let _ = service.create_loan(request("loan-1", 1_000 * UNIT), ts(0));
        let after = service.decisions("loan-1").expect("lists").len();
        assert_eq!(before, after);
    }

    #[test]
    fn parameter_changes_activate_after_the_delay() {
        let service = seeded_service(ts(0));
        let now = ts(1_000);
        let changes = ParameterChanges {
            pricing_table: None,
            late_tolerance_seconds: Some(3_600),
            installment_period_seconds: None,
        };

        let rejected = service
            .propose_parameters(&changes, Role::Supporter, "sup-1", now)
            .expect("evaluates proposal");
        assert!(!rejected.is_accepted());

        let outcome = service
            .propose_parameters(&changes, Role::Operator, "op-1", now)
            .expect("evaluates proposal");
        let ProposalOutcome::Accepted(update) = outcome else {
            panic!("operator proposal should be accepted");
        };
        assert_eq!(update.version, "v1.0.1");

        assert_eq!(service.active_parameters(now).late_tolerance_seconds, 24 * 3_600);
        let later = now + Duration::seconds(30);
        assert_eq!(service.active_parameters(later).late_tolerance_seconds, 3_600);
        assert_eq!(service.active_parameters(later).version, "v1.0.1");
    }
}
