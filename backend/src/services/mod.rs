//! Business logic services for the Recycling Network Ledger

pub mod cash;
pub mod catalog;
pub mod ledger;
pub mod reporting;
pub mod stock;

pub use cash::CashService;
pub use catalog::CatalogService;
pub use ledger::LedgerService;
pub use reporting::ReportingService;
pub use stock::StockService;
