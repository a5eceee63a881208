//! Domain models for SPPG procurement

mod approval;
mod budget;
mod order;
mod quality;
mod role;

pub use approval::*;
pub use budget::*;
pub use order::*;
pub use quality::*;
pub use role::*;
