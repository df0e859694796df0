//! Domain models for the Recycling Network Ledger

mod cash;
mod catalog;
mod movement;
mod report;

pub use cash::*;
pub use catalog::*;
pub use movement::*;
pub use report::*;
