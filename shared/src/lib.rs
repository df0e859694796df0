//! Shared types and models for the Recycling Network Ledger
//!
//! This crate contains the domain types, validation rules and the pure
//! ledger folds shared between the backend, the browser client (via WASM),
//! and the test suites. Nothing in here performs I/O.

pub mod error;
pub mod ledger;
pub mod models;
pub mod report;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
