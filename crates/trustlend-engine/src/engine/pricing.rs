//! Loan pricing from credit score and coverage percentage.
//!
//! The tier table and coverage adjustments are always caller-supplied: the
//! governance layer owns the active table and passes it on every call. The
//! engine never falls back to an implicit module-level default.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money::MICROS_PER_UNIT;

/// Upper bound for any tier rate: 10000 bps = 100% APR.
pub const MAX_APR_BPS: i64 = 10_000;

/// The four credit tiers, ordered from weakest to strongest score band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Excellent,
}

impl RiskTier {
    /// Canonical band order a valid table must follow.
    pub const ORDER: [RiskTier; 4] = [
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
        RiskTier::Excellent,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Excellent => "excellent",
        }
    }
}

/// One score band of the pricing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub tier: RiskTier,
    pub score_min: u8,
    pub score_max: u8,
    pub apr_bps: i64,
    pub max_limit_micro: i64,
    pub required_coverage_pct: f64,
}

/// Rate adjustment applied once actual coverage reaches `coverage_min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAdjustment {
    pub coverage_min: f64,
    pub adjustment_bps: i64,
}

/// Structural violations of the pricing table invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingTableError {
    #[error("expected exactly 4 tiers, got {0}")]
    WrongTierCount(usize),
    #[error("tier at position {position} must be {expected:?}, got {actual:?}")]
    TierOutOfOrder {
        position: usize,
        expected: RiskTier,
        actual: RiskTier,
    },
    #[error("tier {tier:?} has inverted bounds {min}..={max}")]
    InvertedBounds { tier: RiskTier, min: u8, max: u8 },
    #[error("first tier must start at score 0, got {0}")]
    FirstTierMin(u8),
    #[error("last tier must end at score 100, got {0}")]
    LastTierMax(u8),
    #[error("gap or overlap between score {previous_max} and score {next_min}")]
    RangeDiscontinuity { previous_max: u8, next_min: u8 },
    #[error("tier {tier:?} rate {apr_bps} bps is outside 0..=10000")]
    AprOutOfRange { tier: RiskTier, apr_bps: i64 },
    #[error("coverage adjustment rows must be strictly ascending by coverage_min")]
    UnsortedAdjustments,
}

/// A validated tier table plus its coverage adjustment rows.
///
/// The four tiers partition scores 0..=100 with no gaps or overlaps, so
/// every score in range prices successfully. Governance re-validates a
/// proposed table with [`PricingTable::validate`] before accepting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    tiers: Vec<PricingTier>,
    coverage_adjustments: Vec<CoverageAdjustment>,
}

impl PricingTable {
    pub fn new(
        tiers: Vec<PricingTier>,
        coverage_adjustments: Vec<CoverageAdjustment>,
    ) -> Result<Self, PricingTableError> {
        let table = Self {
            tiers,
            coverage_adjustments,
        };
        table.validate()?;
        Ok(table)
    }

    /// The canonical seed table.
    ///
    /// Rates follow the score=75 worked example (High band at 900 bps);
    /// limits rise with tier and coverage requirements fall with it.
    pub fn standard() -> Self {
        Self {
            tiers: vec![
                PricingTier {
                    tier: RiskTier::Low,
                    score_min: 0,
                    score_max: 39,
                    apr_bps: 2_200,
                    max_limit_micro: 500 * MICROS_PER_UNIT,
                    required_coverage_pct: 100.0,
                },
                PricingTier {
                    tier: RiskTier::Medium,
                    score_min: 40,
                    score_max: 69,
                    apr_bps: 1_400,
                    max_limit_micro: 2_000 * MICROS_PER_UNIT,
                    required_coverage_pct: 50.0,
                },
                PricingTier {
                    tier: RiskTier::High,
                    score_min: 70,
                    score_max: 89,
                    apr_bps: 900,
                    max_limit_micro: 10_000 * MICROS_PER_UNIT,
                    required_coverage_pct: 25.0,
                },
                PricingTier {
                    tier: RiskTier::Excellent,
                    score_min: 90,
                    score_max: 100,
                    apr_bps: 600,
                    max_limit_micro: 50_000 * MICROS_PER_UNIT,
                    required_coverage_pct: 10.0,
                },
            ],
            coverage_adjustments: vec![
                CoverageAdjustment {
                    coverage_min: 0.0,
                    adjustment_bps: 400,
                },
                CoverageAdjustment {
                    coverage_min: 20.0,
                    adjustment_bps: 200,
                },
                CoverageAdjustment {
                    coverage_min: 50.0,
                    adjustment_bps: 0,
                },
                CoverageAdjustment {
                    coverage_min: 80.0,
                    adjustment_bps: -150,
                },
                CoverageAdjustment {
                    coverage_min: 100.0,
                    adjustment_bps: -300,
                },
            ],
        }
    }

    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }

    pub fn coverage_adjustments(&self) -> &[CoverageAdjustment] {
        &self.coverage_adjustments
    }

    pub fn validate(&self) -> Result<(), PricingTableError> {
        if self.tiers.len() != RiskTier::ORDER.len() {
            return Err(PricingTableError::WrongTierCount(self.tiers.len()));
        }

        for (position, (tier, expected)) in self.tiers.iter().zip(RiskTier::ORDER).enumerate() {
            if tier.tier != expected {
                return Err(PricingTableError::TierOutOfOrder {
                    position,
                    expected,
                    actual: tier.tier,
                });
            }
            if tier.score_min > tier.score_max {
                return Err(PricingTableError::InvertedBounds {
                    tier: tier.tier,
                    min: tier.score_min,
                    max: tier.score_max,
                });
            }
            if !(0..=MAX_APR_BPS).contains(&tier.apr_bps) {
                return Err(PricingTableError::AprOutOfRange {
                    tier: tier.tier,
                    apr_bps: tier.apr_bps,
                });
            }
        }

        let first = &self.tiers[0];
        if first.score_min != 0 {
            return Err(PricingTableError::FirstTierMin(first.score_min));
        }
        let last = &self.tiers[self.tiers.len() - 1];
        if last.score_max != 100 {
            return Err(PricingTableError::LastTierMax(last.score_max));
        }
        for window in self.tiers.windows(2) {
            if u16::from(window[0].score_max) + 1 != u16::from(window[1].score_min) {
                return Err(PricingTableError::RangeDiscontinuity {
                    previous_max: window[0].score_max,
                    next_min: window[1].score_min,
                });
            }
        }

        let sorted = self
            .coverage_adjustments
            .windows(2)
            .all(|pair| pair[0].coverage_min < pair[1].coverage_min);
        if !sorted {
            return Err(PricingTableError::UnsortedAdjustments);
        }

        Ok(())
    }

    fn tier_for(&self, score: u8) -> Result<&PricingTier, EngineError> {
        if score > 100 {
            return Err(EngineError::ScoreOutOfRange(score));
        }
        self.tiers
            .iter()
            .find(|tier| tier.score_min <= score && score <= tier.score_max)
            .ok_or(EngineError::TierNotFound(score))
    }

    /// Rate adjustment for the given coverage.
    ///
    /// Zero coverage takes no adjustment at all: the borrower pays the
    /// tier's unadjusted rate and full collateralization is demanded via
    /// `required_coverage_pct`. Otherwise the row with the highest
    /// `coverage_min` at or below the actual coverage applies.
    fn adjustment_for(&self, coverage_pct: f64) -> i64 {
        if coverage_pct == 0.0 {
            return 0;
        }
        self.coverage_adjustments
            .iter()
            .filter(|row| row.coverage_min <= coverage_pct)
            .next_back()
            .map(|row| row.adjustment_bps)
            .unwrap_or(0)
    }
}

/// The priced terms for one (score, coverage) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub tier: RiskTier,
    pub apr_bps: i64,
    pub max_limit_micro: i64,
    pub required_coverage_pct: f64,
    pub adjustment_bps: i64,
    pub final_apr_bps: i64,
}

/// Price a loan for the given score and coverage against the active table.
pub fn price_by_score(
    score: u8,
    coverage_pct: f64,
    table: &PricingTable,
) -> Result<PricingResult, EngineError> {
    let tier = table.tier_for(score)?;
    let adjustment_bps = table.adjustment_for(coverage_pct);
    let final_apr_bps = (tier.apr_bps + adjustment_bps).max(0);

    Ok(PricingResult {
        tier: tier.tier,
        apr_bps: tier.apr_bps,
        max_limit_micro: tier.max_limit_micro,
        required_coverage_pct: tier.required_coverage_pct,
        adjustment_bps,
        final_apr_bps,
    })
}

/// Whether the requested amount fits the score's credit limit (evaluated at
/// 0% coverage, i.e. against the tier's unadjusted terms).
pub fn is_within_credit_limit(
    amount_micro: i64,
    score: u8,
    table: &PricingTable,
) -> Result<bool, EngineError> {
    let tier = table.tier_for(score)?;
    Ok(amount_micro <= tier.max_limit_micro)
}

/// Minimum coverage percentage demanded for the given score.
pub fn minimum_coverage(score: u8, table: &PricingTable) -> Result<f64, EngineError> {
    Ok(table.tier_for(score)?.required_coverage_pct)
}
