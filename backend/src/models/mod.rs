//! Database models for the SPPG procurement back-office
//!
//! Persisted rows; the pure domain models live in the shared crate

pub mod inventory;
pub mod procurement;

pub use inventory::*;
pub use procurement::*;
