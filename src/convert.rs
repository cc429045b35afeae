//! Value converter
//!
//! Folds a list of mixed-currency monetary entries into one base-currency
//! total. Entries whose currency the aggregation could not price are never
//! dropped: their raw values accumulate per currency in the `extra` bucket
//! so the caller can display them separately.

use crate::core::config::CurrencyCatalog;
use crate::core::rates::{RateResult, normalize_code};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// One monetary amount in some currency, as recorded by the surrounding
/// donation domain.
#[derive(Debug, Clone, Deserialize)]
pub struct MonetaryEntry {
    pub value: f64,
    pub currency: String,
}

/// Sum of the entries in one currency that could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct UnconvertedTotal {
    /// Raw sum in the entry currency itself.
    pub total: f64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct ConversionOutcome {
    /// Base-currency total of every convertible entry.
    pub total: f64,
    /// Per-currency raw sums of the entries that were not convertible.
    pub extra: HashMap<String, UnconvertedTotal>,
}

/// Converts `entries` into a single `base_code` total.
///
/// Every entry lands in exactly one bucket: `total` when both its currency
/// and the base currency are priced in `rates`, `extra` otherwise.
/// Base-currency entries count directly and need no rate at all.
pub fn convert(
    entries: &[MonetaryEntry],
    base_code: &str,
    rates: &RateResult,
    catalog: &CurrencyCatalog,
) -> ConversionOutcome {
    let base_code = normalize_code(base_code);
    let base_usd = rates.usd_value(&base_code).filter(|v| *v > 0.0);

    let mut outcome = ConversionOutcome::default();
    for entry in entries {
        let code = normalize_code(&entry.currency);
        if code == base_code {
            outcome.total += entry.value;
            continue;
        }

        let converted = match (rates.usd_value(&code), base_usd) {
            (Some(entry_usd), Some(base_usd)) => Some(entry.value * entry_usd / base_usd),
            _ => None,
        };

        match converted {
            Some(value) => outcome.total += value,
            None => {
                debug!("No usable rate for {}; keeping raw value", code);
                let name = catalog
                    .get(&code)
                    .map(|spec| spec.name.clone())
                    .unwrap_or_else(|| code.clone());
                outcome
                    .extra
                    .entry(code.clone())
                    .or_insert_with(|| UnconvertedTotal {
                        total: 0.0,
                        code,
                        name,
                    })
                    .total += entry.value;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    fn entry(value: f64, currency: &str) -> MonetaryEntry {
        MonetaryEntry {
            value,
            currency: currency.to_string(),
        }
    }

    fn rates(pairs: &[(&str, f64)]) -> RateResult {
        RateResult {
            success: true,
            usd_rates: pairs.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
            gold_price_usd: pairs
                .iter()
                .find(|(c, _)| *c == "XAU")
                .map(|(_, v)| *v)
                .unwrap_or(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn mixed_entries_split_between_total_and_extra() {
        let rates = rates(&[("USD", 1.0), ("XAU", 80.0)]);
        let entries = [entry(100.0, "USD"), entry(50.0, "XAU"), entry(30.0, "ZZZ")];

        let outcome = convert(&entries, "USD", &rates, &AppConfig::default().catalog());

        // 100 USD + 50 grams of gold at 80 USD/g
        assert!((outcome.total - 4100.0).abs() < 1e-9);
        assert_eq!(outcome.extra.len(), 1);
        assert_eq!(outcome.extra["ZZZ"].total, 30.0);
        assert_eq!(outcome.extra["ZZZ"].code, "ZZZ");
        // Unknown currency falls back to its code as display name
        assert_eq!(outcome.extra["ZZZ"].name, "ZZZ");
    }

    #[test]
    fn catalog_name_preserved_for_unpriced_known_currency() {
        let rates = rates(&[("USD", 1.0)]);
        let entries = [entry(5.0, "BTC")];

        let outcome = convert(&entries, "USD", &rates, &AppConfig::default().catalog());
        assert_eq!(outcome.extra["BTC"].name, "Bitcoin");
    }

    #[test]
    fn cross_currency_conversion_goes_through_usd() {
        let rates = rates(&[("USD", 1.0), ("EUR", 1.25), ("GBP", 2.0)]);
        let entries = [entry(100.0, "GBP")];

        let outcome = convert(&entries, "EUR", &rates, &AppConfig::default().catalog());
        // 100 GBP = 200 USD = 160 EUR
        assert!((outcome.total - 160.0).abs() < 1e-9);
    }

    #[test]
    fn base_entries_count_even_without_base_rate() {
        let rates = rates(&[]);
        let entries = [entry(100.0, "USD"), entry(40.0, "EUR")];

        let outcome = convert(&entries, "USD", &rates, &AppConfig::default().catalog());
        assert_eq!(outcome.total, 100.0);
        assert_eq!(outcome.extra["EUR"].total, 40.0);
    }

    #[test]
    fn nothing_is_created_or_destroyed() {
        let rates = rates(&[("USD", 1.0), ("EUR", 1.25), ("XAU", 80.0)]);
        let catalog = AppConfig::default().catalog();
        let entries = [
            entry(100.0, "USD"),
            entry(20.0, "EUR"),
            entry(0.5, "XAU"),
            entry(30.0, "ZZZ"),
            entry(12.0, "ZZZ"),
            entry(7.0, "QQQ"),
        ];

        let outcome = convert(&entries, "USD", &rates, &catalog);

        let converted_sum: f64 = 100.0 + 20.0 * 1.25 + 0.5 * 80.0;
        assert!((outcome.total - converted_sum).abs() < 1e-9);
        assert_eq!(outcome.extra["ZZZ"].total, 42.0);
        assert_eq!(outcome.extra["QQQ"].total, 7.0);

        // Conservation: every entry's raw value is accounted for in exactly
        // one bucket. Reconverting the base total back into each priced
        // entry's own currency reproduces its raw value, so it suffices to
        // check that priced raw sums plus extra raw sums cover everything.
        let entry_sum: f64 = entries.iter().map(|e| e.value).sum();
        let priced_raw: f64 = entries
            .iter()
            .filter(|e| rates.usd_value(&e.currency).is_some())
            .map(|e| e.value)
            .sum();
        let extra_raw: f64 = outcome.extra.values().map(|x| x.total).sum();
        assert!((priced_raw + extra_raw - entry_sum).abs() < 1e-9);
    }
}
