//! Deterministic decision engine for the TrustLend peer-guaranteed
//! micro-lending platform.
//!
//! Every function in this crate is a pure, synchronous computation over its
//! inputs: no I/O, no clocks, no shared state. Identical inputs always
//! produce identical outputs, which is what makes the stored decision hashes
//! reproducible for audits. Persistence, HTTP, and concurrency control all
//! live in the orchestration layer (`trustlend-api`), which feeds this crate
//! consistent snapshots and stores what comes back.

pub mod audit;
pub mod engine;
pub mod error;
pub mod money;

pub use error::EngineError;
