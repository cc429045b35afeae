//! Gold-mass conversion math
//!
//! All rates flowing through the engine are USD per unit; gold is USD per
//! gram. These helpers translate between a currency's USD value and its
//! gold-mass equivalent, guarding against zero/negative spot prices instead
//! of panicking or returning infinities.

/// Cache and catalog code for gold.
pub const GOLD_CODE: &str = "XAU";

/// Grams per troy ounce. Metal providers quote per ounce; everything after
/// the adapter boundary is per gram.
pub const TROY_OUNCE_GRAMS: f64 = 31.103_476_8;

/// Gold-mass equivalent (grams) of one unit of a currency.
///
/// Returns `0.0` when the gold spot price is zero or negative.
pub fn gold_value(usd_value: f64, xau_usd: f64) -> f64 {
    if xau_usd <= 0.0 {
        return 0.0;
    }
    usd_value / xau_usd
}

/// Grams of gold equivalent to `amount` units of a currency.
///
/// Returns `0.0` when either price is zero or negative.
pub fn gold_grams(amount: f64, currency_usd: f64, xau_usd: f64) -> f64 {
    if currency_usd <= 0.0 || xau_usd <= 0.0 {
        return 0.0;
    }
    amount * currency_usd / xau_usd
}

/// Inverse of [`gold_grams`]: currency units equivalent to a gold mass.
pub fn currency_from_gold(grams: f64, currency_usd: f64, xau_usd: f64) -> f64 {
    if currency_usd <= 0.0 || xau_usd <= 0.0 {
        return 0.0;
    }
    grams * xau_usd / currency_usd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(gold_value(1.0, 2000.0), 0.0005);
        assert_eq!(gold_grams(100.0, 1.0, 2000.0), 0.05);
        assert_eq!(currency_from_gold(0.05, 1.0, 2000.0), 100.0);
    }

    #[test]
    fn non_positive_spot_price_yields_zero() {
        for xau in [0.0, -1.0, -2000.0] {
            assert_eq!(gold_value(1.0, xau), 0.0);
            assert_eq!(gold_grams(100.0, 1.0, xau), 0.0);
            assert_eq!(currency_from_gold(0.05, 1.0, xau), 0.0);
        }
    }

    #[test]
    fn non_positive_currency_price_yields_zero() {
        assert_eq!(gold_grams(100.0, 0.0, 2000.0), 0.0);
        assert_eq!(gold_grams(100.0, -1.0, 2000.0), 0.0);
        assert_eq!(currency_from_gold(0.05, 0.0, 2000.0), 0.0);
    }

    #[test]
    fn round_trip() {
        for (amount, currency_usd, xau_usd) in [
            (100.0, 1.0, 2000.0),
            (0.37, 1.08, 2411.5),
            (9_999_999.0, 0.000_024, 1850.0),
        ] {
            let grams = gold_grams(amount, currency_usd, xau_usd);
            let back = currency_from_gold(grams, currency_usd, xau_usd);
            assert!(
                (back - amount).abs() < amount * 1e-12,
                "round trip drifted: {amount} -> {grams} -> {back}"
            );
        }
    }
}
