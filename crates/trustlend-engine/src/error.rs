use crate::engine::pricing::PricingTableError;

/// Invalid-input failures raised by the decision engine.
///
/// Each variant indicates that a calling layer handed the engine data that
/// breaks a documented invariant (amounts must be positive, scores sit in
/// 0..=100, and so on). Business-rule rejections are not errors: they are
/// returned as structured outcomes the caller branches on (see
/// [`crate::engine::governance::ProposalOutcome`]).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("division by zero denominator")]
    ZeroDenominator,
    #[error("monetary arithmetic overflowed the i64 micro-unit range")]
    AmountOverflow,
    #[error("score {0} is outside the valid range 0..=100")]
    ScoreOutOfRange(u8),
    #[error("no pricing tier covers score {0}")]
    TierNotFound(u8),
    #[error("{field} must be positive, got {value}")]
    NonPositiveAmount { field: &'static str, value: i64 },
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: i64 },
    #[error("installment count must be at least 1")]
    ZeroInstallments,
    #[error("installment interval must be positive")]
    NonPositiveInterval,
    #[error(transparent)]
    Table(#[from] PricingTableError),
    #[error("failed to canonicalize value for hashing: {0}")]
    Canonicalize(#[from] serde_json::Error),
}
