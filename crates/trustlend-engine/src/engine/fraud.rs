//! Endorsement fraud heuristics.
//!
//! Each check runs independently and alerts accumulate; none of them is
//! proof of abuse on its own, so callers must never auto-block on a single
//! signal. The detector is pure: the reference instant (`now`) is an input,
//! never read from a clock.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{LoanInfo, UserInfo};

const BPS_SCALE: i128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudAlertKind {
    MultiAccount,
    Concentration,
    StakeWithdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A typed fraud signal with free-form diagnostic details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub kind: FraudAlertKind,
    pub severity: Severity,
    pub details: BTreeMap<String, String>,
}

/// Thresholds and weights for the fraud heuristics.
///
/// Concentration thresholds are expressed in basis points of total stakes
/// so boundary comparisons stay exact integer arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudCheckConfig {
    pub new_account_threshold: Duration,
    pub approval_window: Duration,
    pub concentration_alert_bps: i64,
    pub concentration_high_bps: i64,
    pub low_weight: u32,
    pub medium_weight: u32,
    pub high_weight: u32,
    pub review_risk_threshold: u32,
    pub review_block_duration: Duration,
}

impl Default for FraudCheckConfig {
    fn default() -> Self {
        Self {
            new_account_threshold: Duration::hours(24),
            approval_window: Duration::minutes(10),
            concentration_alert_bps: 5_000,
            concentration_high_bps: 8_000,
            low_weight: 10,
            medium_weight: 25,
            high_weight: 50,
            review_risk_threshold: 50,
            // Simulation scale; stands in for a multi-day hold in production.
            review_block_duration: Duration::seconds(30),
        }
    }
}

impl FraudCheckConfig {
    fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Low => self.low_weight,
            Severity::Medium => self.medium_weight,
            Severity::High => self.high_weight,
        }
    }
}

/// Run every heuristic against one loan snapshot and accumulate the alerts.
pub fn run_comprehensive_check(
    loan: &LoanInfo,
    users: &[UserInfo],
    approval_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &FraudCheckConfig,
) -> Vec<FraudAlert> {
    let mut alerts = Vec::new();
    alerts.extend(check_concentration(loan, config));
    alerts.extend(check_multi_account(loan, users, now, config));
    if let Some(approved_at) = approval_time {
        alerts.extend(check_stake_withdrawal(loan, approved_at, config));
    }
    alerts
}

/// Flag any supporter holding strictly more than half of total stakes.
fn check_concentration(loan: &LoanInfo, config: &FraudCheckConfig) -> Vec<FraudAlert> {
    let total: i64 = loan.total_stake_micro();
    if total <= 0 {
        return Vec::new();
    }

    let mut per_supporter: BTreeMap<&str, i64> = BTreeMap::new();
    for endorsement in &loan.endorsements {
        *per_supporter
            .entry(endorsement.supporter_id.as_str())
            .or_insert(0) += endorsement.stake_amount_micro;
    }

    let mut alerts = Vec::new();
    for (supporter_id, stake) in per_supporter {
        // stake/total > threshold, compared as stake * 10000 > total * bps
        // so that exactly-at-threshold shares never alert.
        let scaled = i128::from(stake) * BPS_SCALE;
        if scaled > i128::from(total) * i128::from(config.concentration_alert_bps) {
            let severity =
                if scaled > i128::from(total) * i128::from(config.concentration_high_bps) {
                    Severity::High
                } else {
                    Severity::Medium
                };
            let share_bps = (scaled / i128::from(total)) as i64;
            let mut details = BTreeMap::new();
            details.insert("supporter_id".to_string(), supporter_id.to_string());
            details.insert("stake_micro".to_string(), stake.to_string());
            details.insert("total_stake_micro".to_string(), total.to_string());
            details.insert("share_bps".to_string(), share_bps.to_string());
            alerts.push(FraudAlert {
                kind: FraudAlertKind::Concentration,
                severity,
                details,
            });
        }
    }
    alerts
}

/// Flag endorsing supporters whose account is younger than the threshold
/// while at least one other account was created inside the same window.
fn check_multi_account(
    loan: &LoanInfo,
    users: &[UserInfo],
    now: DateTime<Utc>,
    config: &FraudCheckConfig,
) -> Vec<FraudAlert> {
    let is_fresh = |user: &UserInfo| now - user.created_at < config.new_account_threshold;

    let mut alerts = Vec::new();
    for endorsement in &loan.endorsements {
        let Some(supporter) = users.iter().find(|user| user.id == endorsement.supporter_id)
        else {
            continue;
        };
        if !is_fresh(supporter) {
            continue;
        }
        let fresh_peers = users
            .iter()
            .filter(|user| user.id != supporter.id && is_fresh(user))
            .count();
        if fresh_peers == 0 {
            continue;
        }

        let mut details = BTreeMap::new();
        details.insert("supporter_id".to_string(), supporter.id.clone());
        details.insert(
            "account_age_seconds".to_string(),
            (now - supporter.created_at).num_seconds().to_string(),
        );
        details.insert("fresh_peer_count".to_string(), fresh_peers.to_string());
        alerts.push(FraudAlert {
            kind: FraudAlertKind::MultiAccount,
            severity: Severity::High,
            details,
        });
    }
    alerts
}

/// Flag endorsements placed suspiciously close before approval. Emits at
/// most one alert listing every suspicious supporter.
fn check_stake_withdrawal(
    loan: &LoanInfo,
    approved_at: DateTime<Utc>,
    config: &FraudCheckConfig,
) -> Vec<FraudAlert> {
    let window_start = approved_at - config.approval_window;
    let suspicious: Vec<&str> = loan
        .endorsements
        .iter()
        .filter(|endorsement| {
            endorsement.created_at > window_start && endorsement.created_at <= approved_at
        })
        .map(|endorsement| endorsement.supporter_id.as_str())
        .collect();

    if suspicious.is_empty() {
        return Vec::new();
    }

    let mut details = BTreeMap::new();
    details.insert("supporter_ids".to_string(), suspicious.join(","));
    details.insert("count".to_string(), suspicious.len().to_string());
    details.insert(
        "window_seconds".to_string(),
        config.approval_window.num_seconds().to_string(),
    );
    vec![FraudAlert {
        kind: FraudAlertKind::StakeWithdrawal,
        severity: Severity::Medium,
        details,
    }]
}

/// Aggregate severity-weighted risk, capped at 100.
pub fn fraud_risk_score(alerts: &[FraudAlert], config: &FraudCheckConfig) -> u8 {
    let total: u32 = alerts
        .iter()
        .map(|alert| config.weight(alert.severity))
        .sum();
    total.min(100) as u8
}

/// Whether the accumulated alerts warrant placing the loan under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub under_review: bool,
    pub block_duration_seconds: i64,
    pub reason: Option<String>,
}

/// Review triggers on any high-severity alert or when the aggregate risk
/// reaches the configured threshold.
pub fn review_decision(alerts: &[FraudAlert], config: &FraudCheckConfig) -> ReviewDecision {
    let risk = u32::from(fraud_risk_score(alerts, config));
    let high = alerts
        .iter()
        .any(|alert| alert.severity == Severity::High);

    let reason = if high {
        Some("high severity fraud alert present".to_string())
    } else if risk >= config.review_risk_threshold {
        Some(format!(
            "aggregate fraud risk {risk} at or above threshold {}",
            config.review_risk_threshold
        ))
    } else {
        None
    };

    match reason {
        Some(reason) => ReviewDecision {
            under_review: true,
            block_duration_seconds: config.review_block_duration.num_seconds(),
            reason: Some(reason),
        },
        None => ReviewDecision {
            under_review: false,
            block_duration_seconds: 0,
            reason: None,
        },
    }
}
