use super::common::*;
use crate::engine::pricing::{
    is_within_credit_limit, minimum_coverage, price_by_score, CoverageAdjustment, PricingTable,
    PricingTableError, PricingTier, RiskTier,
};
use crate::error::EngineError;
use crate::money::MICROS_PER_UNIT;

fn tier(
    tier: RiskTier,
    score_min: u8,
    score_max: u8,
    apr_bps: i64,
) -> PricingTier {
    PricingTier {
        tier,
        score_min,
        score_max,
        apr_bps,
        max_limit_micro: 1_000 * MICROS_PER_UNIT,
        required_coverage_pct: 50.0,
    }
}

fn four_tiers(apr: [i64; 4]) -> Vec<PricingTier> {
    vec![
        tier(RiskTier::Low, 0, 39, apr[0]),
        tier(RiskTier::Medium, 40, 69, apr[1]),
        tier(RiskTier::High, 70, 89, apr[2]),
        tier(RiskTier::Excellent, 90, 100, apr[3]),
    ]
}

#[test]
fn standard_table_satisfies_its_own_invariants() {
    assert!(standard_table().validate().is_ok());
}

#[test]
fn worked_example_prices_score_75_at_900_bps() {
    let result = price_by_score(75, 60.0, &standard_table()).expect("prices");
    assert_eq!(result.tier, RiskTier::High);
    assert_eq!(result.apr_bps, 900);
    assert_eq!(result.required_coverage_pct, 25.0);
    // highest coverage_min at or below 60 is the 50 row, adjustment 0
    assert_eq!(result.adjustment_bps, 0);
    assert_eq!(result.final_apr_bps, 900);
}

#[test]
fn zero_coverage_takes_no_adjustment() {
    let result = price_by_score(75, 0.0, &standard_table()).expect("prices");
    assert_eq!(result.adjustment_bps, 0);
    assert_eq!(result.final_apr_bps, 900);
}

#[test]
fn low_coverage_pays_the_penalty_row() {
    let result = price_by_score(30, 10.0, &standard_table()).expect("prices");
    assert_eq!(result.tier, RiskTier::Low);
    assert_eq!(result.adjustment_bps, 400);
    assert_eq!(result.final_apr_bps, 2_600);
}

#[test]
fn full_coverage_earns_the_deepest_discount() {
    let result = price_by_score(95, 100.0, &standard_table()).expect("prices");
    assert_eq!(result.tier, RiskTier::Excellent);
    assert_eq!(result.adjustment_bps, -300);
    assert_eq!(result.final_apr_bps, 300);
}

#[test]
fn final_rate_never_goes_negative() {
    let table = PricingTable::new(
        four_tiers([2_200, 1_400, 900, 100]),
        vec![CoverageAdjustment {
            coverage_min: 50.0,
            adjustment_bps: -300,
        }],
    )
    .expect("valid table");

    let result = price_by_score(95, 90.0, &table).expect("prices");
    assert_eq!(result.adjustment_bps, -300);
    assert_eq!(result.final_apr_bps, 0);
}

#[test]
fn rates_never_rise_with_score_at_fixed_coverage() {
    let table = standard_table();
    for coverage in [0.0, 15.0, 45.0, 60.0, 85.0, 100.0] {
        let mut previous = i64::MAX;
        for score in 0..=100u8 {
            let result = price_by_score(score, coverage, &table).expect("prices");
            assert!(
                result.final_apr_bps <= previous,
                "rate rose from {previous} to {} at score {score}, coverage {coverage}",
                result.final_apr_bps
            );
            previous = result.final_apr_bps;
        }
    }
}

#[test]
fn out_of_range_score_is_a_domain_error() {
    match price_by_score(101, 50.0, &standard_table()) {
        Err(EngineError::ScoreOutOfRange(101)) => {}
        other => panic!("expected score range error, got {other:?}"),
    }
}

#[test]
fn pricing_is_idempotent() {
    let table = standard_table();
    let first = price_by_score(62, 33.3, &table).expect("prices");
    let second = price_by_score(62, 33.3, &table).expect("prices");
    assert_eq!(first, second);
}

#[test]
fn credit_limit_and_minimum_coverage_come_from_the_tier() {
    let table = standard_table();
    assert!(is_within_credit_limit(9_000 * MICROS_PER_UNIT, 75, &table).expect("checks"));
    assert!(!is_within_credit_limit(10_001 * MICROS_PER_UNIT, 75, &table).expect("checks"));
    assert_eq!(minimum_coverage(75, &table).expect("looks up"), 25.0);
    assert_eq!(minimum_coverage(12, &table).expect("looks up"), 100.0);
}

#[test]
fn table_rejects_wrong_tier_count() {
    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers.pop();
    match PricingTable::new(tiers, Vec::new()) {
        Err(PricingTableError::WrongTierCount(3)) => {}
        other => panic!("expected tier count error, got {other:?}"),
    }
}

#[test]
fn table_rejects_range_gaps_and_overlaps() {
    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers[1].score_min = 41;
    match PricingTable::new(tiers, Vec::new()) {
        Err(PricingTableError::RangeDiscontinuity {
            previous_max: 39,
            next_min: 41,
        }) => {}
        other => panic!("expected discontinuity error, got {other:?}"),
    }

    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers[2].score_max = 70;
    tiers[3].score_min = 70;
    match PricingTable::new(tiers, Vec::new()) {
        Err(PricingTableError::RangeDiscontinuity { .. }) => {}
        other => panic!("expected discontinuity error, got {other:?}"),
    }
}

#[test]
fn table_rejects_misordered_tiers_and_bad_rates() {
    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers.swap(0, 1);
    match PricingTable::new(tiers, Vec::new()) {
        Err(PricingTableError::TierOutOfOrder { position: 0, .. }) => {}
        other => panic!("expected order error, got {other:?}"),
    }

    let tiers = four_tiers([2_200, 1_400, 900, 10_001]);
    match PricingTable::new(tiers, Vec::new()) {
        Err(PricingTableError::AprOutOfRange {
            tier: RiskTier::Excellent,
            apr_bps: 10_001,
        }) => {}
        other => panic!("expected rate error, got {other:?}"),
    }
}

#[test]
fn table_rejects_boundary_violations() {
    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers[0].score_min = 1;
    assert_eq!(
        PricingTable::new(tiers, Vec::new()),
        Err(PricingTableError::FirstTierMin(1))
    );

    let mut tiers = four_tiers([2_200, 1_400, 900, 600]);
    tiers[3].score_max = 99;
    assert_eq!(
        PricingTable::new(tiers, Vec::new()),
        Err(PricingTableError::LastTierMax(99))
    );
}

#[test]
fn table_rejects_unsorted_adjustment_rows() {
    let adjustments = vec![
        CoverageAdjustment {
            coverage_min: 50.0,
            adjustment_bps: 0,
        },
        CoverageAdjustment {
            coverage_min: 20.0,
            adjustment_bps: 200,
        },
    ];
    assert_eq!(
        PricingTable::new(four_tiers([2_200, 1_400, 900, 600]), adjustments),
        Err(PricingTableError::UnsortedAdjustments)
    );
}
