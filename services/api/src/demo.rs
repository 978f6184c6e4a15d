use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use trustlend_engine::engine::{ParameterChanges, ProposalOutcome, Role};
use trustlend_engine::money::MICROS_PER_UNIT;

use crate::error::AppError;
use crate::infra::{InMemoryDecisionLog, InMemoryLoanRepository, InMemoryUserDirectory};
use crate::loans::{CreateLoanRequest, LoanService, LoanServiceError};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Loan principal in whole currency units
    #[arg(long, default_value_t = 1_000)]
    pub(crate) principal: i64,
    /// Loan term in days
    #[arg(long, default_value_t = 90)]
    pub(crate) term_days: u32,
    /// Number of installments in the schedule
    #[arg(long, default_value_t = 6)]
    pub(crate) installments: u32,
    /// Stop after full repayment instead of simulating a default
    #[arg(long)]
    pub(crate) skip_liquidation: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    if let Err(err) = walk_lifecycle(&args) {
        println!("demo aborted: {err}");
    }
    Ok(())
}

fn walk_lifecycle(args: &DemoArgs) -> Result<(), LoanServiceError> {
    let service = LoanService::new(
        Arc::new(InMemoryLoanRepository::default()),
        Arc::new(InMemoryUserDirectory::default()),
        Arc::new(InMemoryDecisionLog::default()),
    );

    // Backdated so the loan's whole life fits before "now" and the supporter
    // accounts are old enough to pass the multi-account screen.
    let origination = Utc::now() - Duration::days(args.term_days as i64 + 30);
    let principal_micro = args.principal * MICROS_PER_UNIT;

    println!("TrustLend lifecycle demo");
    println!(
        "  principal: {} units over {} days in {} installments",
        args.principal, args.term_days, args.installments
    );

    for id in ["maria", "alice", "bob"] {
        service.register_user(id, origination - Duration::days(200))?;
    }

    let record = service.create_loan(
        CreateLoanRequest {
            loan_id: "demo-loan".to_string(),
            borrower_id: "maria".to_string(),
            principal_micro,
            collateral_micro: principal_micro / 10,
            term_days: args.term_days,
            num_installments: args.installments,
        },
        origination,
    )?;
    println!(
        "\nOriginated as '{}': score {}, tier {}, {} bps at zero coverage",
        record.id,
        record.score,
        record.pricing.tier.label(),
        record.pricing.final_apr_bps
    );

    let stake = principal_micro * 3 / 10;
    service.endorse("demo-loan", "alice", stake, origination + Duration::hours(1))?;
    let endorsed = service.endorse("demo-loan", "bob", stake, origination + Duration::hours(2))?;
    println!(
        "Endorsed by alice and bob at {} units each: {} bps final, {} fraud alerts",
        stake / MICROS_PER_UNIT,
        endorsed.record.pricing.final_apr_bps,
        endorsed.alerts.len()
    );

    let approved = service.approve("demo-loan", origination + Duration::days(1))?;
    println!(
        "Approved with coverage for a {}-day schedule of {} installments",
        args.term_days,
        approved.installments.len()
    );

    let first_two: i64 = approved
        .installments
        .iter()
        .take(2)
        .map(|installment| installment.amount_micro)
        .sum();
    let payment = service.repay("demo-loan", first_two, origination + Duration::days(20))?;
    println!(
        "\nPayment covering installments {:?}; remaining balance {} micro",
        payment.paid_indices, payment.remaining_balance_micro
    );

    if args.skip_liquidation {
        let total_left = payment.remaining_balance_micro;
        let settled = service.repay(
            "demo-loan",
            total_left,
            origination + Duration::days(25),
        )?;
        println!(
            "Settled in full: state '{}', score {}",
            settled.record.state.label(),
            settled.record.score
        );
    } else {
        let horizon = origination + Duration::days(args.term_days as i64 + 10);
        let swept = service.refresh_late("demo-loan", horizon)?;
        let late = swept
            .installments
            .iter()
            .filter(|installment| installment.status.label() == "late")
            .count();
        println!("Late sweep at term end leaves {late} installment(s) late");

        let defaulted = service.mark_default("demo-loan", horizon)?;
        println!(
            "Defaulted: score drops to {}",
            defaulted.score
        );

        let summary = service.liquidate("demo-loan", principal_micro * 10, horizon)?;
        let result = &summary.waterfall.result;
        println!("\nLiquidation waterfall:");
        println!("  collateral used: {} micro", result.collateral_used_micro);
        for cut in &result.supporter_cuts {
            println!(
                "  {} loses {} of {} staked",
                cut.supporter_id, cut.cut_micro, cut.original_stake_micro
            );
        }
        println!("  mutual fund used: {} micro", result.mutual_fund_used_micro);
        println!(
            "  recovered {} micro ({:.0}% of the loss)",
            result.total_recovered_micro,
            summary.waterfall.recovery_rate * 100.0
        );
    }

    let decisions = service.decisions("demo-loan")?;
    println!("\nDecision log ({} entries):", decisions.len());
    for entry in &decisions {
        println!("  {} {}", entry.kind, &entry.hash[..16]);
    }

    let proposal_time = Utc::now();
    let outcome = service.propose_parameters(
        &ParameterChanges {
            pricing_table: None,
            late_tolerance_seconds: Some(12 * 3_600),
            installment_period_seconds: None,
        },
        Role::Operator,
        "op-demo",
        proposal_time,
    )?;
    match outcome {
        ProposalOutcome::Accepted(update) => println!(
            "\nParameter proposal accepted as {} activating at {}",
            update.version, update.activates_at
        ),
        ProposalOutcome::Rejected { reason } => {
            println!("\nParameter proposal rejected: {reason}")
        }
    }

    Ok(())
}
