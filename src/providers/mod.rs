pub mod coingecko;
pub mod er_api;
pub mod frankfurter;
pub mod gold_api;
pub mod util;

use std::time::Duration;

// Re-export the capability adapters implement
pub use crate::core::rates::{FetchOutcome, RateProvider};

pub(crate) const USER_AGENT: &str = "mithqal/0.2";

/// Default per-request timeout. Short enough that one slow upstream cannot
/// stall an otherwise-successful aggregation; a timed-out adapter behaves
/// like a failed one.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before the single retry in [`util::with_retry`].
pub(crate) const RETRY_DELAY: Duration = Duration::from_millis(200);
