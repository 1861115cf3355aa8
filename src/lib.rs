//! Benefit application lifecycle and assessment engine.
//!
//! The crate tracks benefit applications from intake through a
//! document-backed assessment to a decision, keeping a tamper-evident
//! history of every state change. Document extraction, AI scoring, and
//! presentation live outside this crate; they feed it already-computed
//! field values and dimension scores through the types in
//! [`lifecycle::domain`].

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod telemetry;
