use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::warn;

/// Conversion-to-USD seam. Real FX lives outside this service; the
/// default oracle passes USD through unchanged and refuses to guess a
/// rate for anything else (amount is carried verbatim and flagged).
pub trait CurrencyOracle: Send + Sync {
    fn to_usd(&self, amount: f64, currency: &str) -> f64;
}

/// Identity oracle. Warns once per distinct currency rather than on
/// every postback — a partner reporting EUR all day would otherwise
/// flood the log with the same line. The metric still counts every
/// occurrence.
#[derive(Default)]
pub struct UsdPassthrough {
    warned: Mutex<HashSet<String>>,
}

impl CurrencyOracle for UsdPassthrough {
    fn to_usd(&self, amount: f64, currency: &str) -> f64 {
        if !currency.is_empty() && !currency.eq_ignore_ascii_case("USD") {
            metrics::counter!("currency.unconverted", "currency" => currency.to_uppercase())
                .increment(1);
            if self.warned.lock().insert(currency.to_uppercase()) {
                warn!(currency, "no FX oracle configured, carrying amount verbatim");
            }
        }
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_and_empty_pass_silently() {
        let oracle = UsdPassthrough::default();
        assert_eq!(oracle.to_usd(9.99, "USD"), 9.99);
        assert_eq!(oracle.to_usd(9.99, "usd"), 9.99);
        assert_eq!(oracle.to_usd(9.99, ""), 9.99);
        assert!(oracle.warned.lock().is_empty());
    }

    #[test]
    fn non_usd_carried_verbatim_and_warned_once() {
        let oracle = UsdPassthrough::default();
        assert_eq!(oracle.to_usd(10.0, "EUR"), 10.0);
        assert_eq!(oracle.to_usd(20.0, "eur"), 20.0);
        assert_eq!(oracle.to_usd(5.0, "JPY"), 5.0);
        // one entry per distinct currency, case-folded
        let warned = oracle.warned.lock();
        assert_eq!(warned.len(), 2);
        assert!(warned.contains("EUR"));
        assert!(warned.contains("JPY"));
    }
}
