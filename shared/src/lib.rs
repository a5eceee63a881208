//! Shared types and domain rules for the SPPG procurement back-office
//!
//! This crate holds the pure decision logic (pricing, order state machine,
//! approval policy, budget and QC evaluation) shared between the backend,
//! the browser (via WASM), and the test suites.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
