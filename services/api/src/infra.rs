use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use trustlend_engine::engine::{
    EndorsementInfo, Installment, LoanState, PricingResult, UserInfo,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
}

/// The persisted view of one loan and everything the engine has decided
/// about it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoanRecord {
    pub(crate) id: String,
    pub(crate) borrower_id: String,
    pub(crate) principal_micro: i64,
    pub(crate) collateral_micro: i64,
    pub(crate) state: LoanState,
    pub(crate) score: u8,
    pub(crate) pricing: PricingResult,
    pub(crate) endorsements: Vec<EndorsementInfo>,
    pub(crate) installments: Vec<Installment>,
    pub(crate) under_review: bool,
    pub(crate) review_reason: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) approved_at: Option<DateTime<Utc>>,
}

/// One immutable audit entry. `idempotency_key` dedupes replayed commands;
/// `hash` is the reproducible digest of `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DecisionRecord {
    pub(crate) loan_id: Option<String>,
    pub(crate) kind: String,
    pub(crate) payload: serde_json::Value,
    pub(crate) idempotency_key: String,
    pub(crate) hash: String,
    pub(crate) recorded_at: DateTime<Utc>,
}

pub(crate) trait LoanRepository: Send + Sync {
    fn insert(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError>;
    fn update(&self, record: LoanRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &str) -> Result<Option<LoanRecord>, RepositoryError>;
    fn by_borrower(&self, borrower_id: &str) -> Result<Vec<LoanRecord>, RepositoryError>;
}

pub(crate) trait UserDirectory: Send + Sync {
    fn upsert(&self, user: UserInfo) -> Result<UserInfo, RepositoryError>;
    fn fetch(&self, id: &str) -> Result<Option<UserInfo>, RepositoryError>;
    fn known_users(&self) -> Result<Vec<UserInfo>, RepositoryError>;
}

pub(crate) trait DecisionLog: Send + Sync {
    /// Append an entry; a repeated idempotency key is a no-op returning the
    /// original entry.
    fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError>;
    fn for_loan(&self, loan_id: &str) -> Result<Vec<DecisionRecord>, RepositoryError>;
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLoanRepository {
    records: Arc<Mutex<HashMap<String, LoanRecord>>>,
}

impl LoanRepository for InMemoryLoanRepository {
    fn insert(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: LoanRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            guard.insert(record.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &str) -> Result<Option<LoanRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn by_borrower(&self, borrower_id: &str) -> Result<Vec<LoanRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<LoanRecord> = guard
            .values()
            .filter(|record| record.borrower_id == borrower_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUserDirectory {
    users: Arc<Mutex<HashMap<String, UserInfo>>>,
}

impl UserDirectory for InMemoryUserDirectory {
    fn upsert(&self, user: UserInfo) -> Result<UserInfo, RepositoryError> {
        let mut guard = self.users.lock().expect("directory mutex poisoned");
        guard.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn fetch(&self, id: &str) -> Result<Option<UserInfo>, RepositoryError> {
        let guard = self.users.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn known_users(&self) -> Result<Vec<UserInfo>, RepositoryError> {
        let guard = self.users.lock().expect("directory mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDecisionLog {
    entries: Arc<Mutex<Vec<DecisionRecord>>>,
}

impl DecisionLog for InMemoryDecisionLog {
    fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError> {
        let mut guard = self.entries.lock().expect("decision log mutex poisoned");
        if let Some(existing) = guard
            .iter()
            .find(|entry| entry.idempotency_key == record.idempotency_key)
        {
            return Ok(existing.clone());
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn for_loan(&self, loan_id: &str) -> Result<Vec<DecisionRecord>, RepositoryError> {
        let guard = self.entries.lock().expect("decision log mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| entry.loan_id.as_deref() == Some(loan_id))
            .cloned()
            .collect())
    }
}
