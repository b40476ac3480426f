use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Read-only lookup of the last traded price per instrument.
pub trait PriceSource: Send + Sync {
    fn last_price(&self, symbol: &str) -> Option<Decimal>;
}

#[derive(Debug, Clone, Copy)]
struct Quote {
    price: Decimal,
    updated_at: DateTime<Utc>,
}

/// In-memory last-price table, fed by whatever market-data process owns it.
#[derive(Debug, Default)]
pub struct PriceBook {
    quotes: DashMap<String, Quote>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new last price. Non-positive prices are ignored.
    pub fn set_price(&self, symbol: &str, price: Decimal) -> bool {
        if price <= Decimal::ZERO {
            tracing::warn!(%symbol, %price, "ignoring non-positive price");
            return false;
        }
        self.quotes.insert(symbol.to_string(), Quote { price, updated_at: Utc::now() });
        true
    }

    pub fn updated_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.quotes.get(symbol).map(|q| q.updated_at)
    }
}

impl PriceSource for PriceBook {
    fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.quotes.get(symbol).map(|q| q.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn keeps_latest_positive_price() {
        let book = PriceBook::new();
        assert_eq!(book.last_price("ACME"), None);
        assert!(book.set_price("ACME", dec!(101.5)));
        assert!(book.set_price("ACME", dec!(102)));
        assert!(!book.set_price("ACME", dec!(0)));
        assert_eq!(book.last_price("ACME"), Some(dec!(102)));
        assert!(book.updated_at("ACME").is_some());
    }
}
