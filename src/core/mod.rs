//! Core business logic abstractions

pub mod config;
pub mod gold;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use config::{AppConfig, CurrencyCatalog, CurrencySpec};
pub use rates::{CurrencyKind, FetchOutcome, RateProvider, RateResult};
