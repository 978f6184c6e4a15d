//! Deterministic, tamper-evident hashing of engine decisions.
//!
//! The orchestration layer stores a SHA-256 digest next to every persisted
//! decision; recomputing the digest later from the stored inputs must
//! reproduce it bit-for-bit. Canonicalization keeps object keys in
//! lexicographic order, which `serde_json` guarantees through its default
//! `BTreeMap`-backed map; the `preserve_order` feature must stay disabled.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::EngineError;

/// Compact JSON with object keys in lexicographic order at every level.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    let value = serde_json::to_value(value)?;
    Ok(value.to_string())
}

/// Hex SHA-256 over the canonical JSON form of a decision.
pub fn decision_hash<T: Serialize>(decision: &T) -> Result<String, EngineError> {
    let canonical = canonical_json(decision)?;
    Ok(to_hex(&Sha256::digest(canonical.as_bytes())))
}

/// Hex SHA-256 keyed by operation name over canonicalized parameters.
///
/// The NUL byte separates the operation name from the parameter bytes so
/// distinct (operation, params) pairs can never collide by concatenation.
pub fn idempotency_key<T: Serialize>(operation: &str, params: &T) -> Result<String, EngineError> {
    let canonical = canonical_json(params)?;
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_at_every_level() {
        let value = json!({ "b": 1, "a": { "z": true, "m": [1, 2] } });
        assert_eq!(
            canonical_json(&value).expect("canonicalizes"),
            r#"{"a":{"m":[1,2],"z":true},"b":1}"#
        );
    }

    #[test]
    fn identical_decisions_hash_identically() {
        let decision = json!({ "score": 58, "tier": "high", "final_apr_bps": 900 });
        let first = decision_hash(&decision).expect("hashes");
        let second = decision_hash(&decision).expect("hashes");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn any_field_change_changes_the_hash() {
        let a = json!({ "score": 58, "tier": "high" });
        let b = json!({ "score": 59, "tier": "high" });
        assert_ne!(
            decision_hash(&a).expect("hashes"),
            decision_hash(&b).expect("hashes")
        );
    }

    #[test]
    fn idempotency_keys_separate_operations() {
        let params = json!({ "loan_id": "loan-001", "amount_micro": 150 });
        let repay = idempotency_key("repayment", &params).expect("hashes");
        let endorse = idempotency_key("endorsement", &params).expect("hashes");
        assert_ne!(repay, endorse);
        assert_eq!(repay, idempotency_key("repayment", &params).expect("hashes"));
    }
}
