//! Shared fixture for the engine integration tests.
#![allow(dead_code)]

use configuration::Config;
use core_types::{AccountId, AccountType, Instrument, InstrumentType, OrderId, OrderSide};
use engine::{OrderRequest, TradingCore};
use events::MemoryAuditSink;
use ledger::{InstrumentRegistry, PriceBook};
use risk::SimpleMarginValidator;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub struct Harness {
    pub core: TradingCore,
    pub catalog: Arc<InstrumentRegistry>,
    pub prices: Arc<PriceBook>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn instrument(symbol: &str, margin_requirement: Decimal) -> Instrument {
    Instrument {
        symbol: symbol.to_string(),
        instrument_type: InstrumentType::Equity,
        is_tradeable: true,
        min_trade_size: dec!(1),
        max_trade_size: dec!(10000),
        tick_size: dec!(0.01),
        margin_requirement,
    }
}

/// A core with ACME (full margin) and MARG (25% margin) listed and no prices.
pub fn harness() -> Harness {
    let catalog = Arc::new(InstrumentRegistry::new());
    catalog.list(instrument("ACME", dec!(1))).unwrap();
    catalog.list(instrument("MARG", dec!(0.25))).unwrap();
    let prices = Arc::new(PriceBook::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let core = TradingCore::new(
        &Config::default(),
        catalog.clone(),
        prices.clone(),
        Arc::new(SimpleMarginValidator::new()),
        audit.clone(),
    );
    Harness {
        core,
        catalog,
        prices,
        audit,
    }
}

impl Harness {
    pub async fn funded(&self, amount: Decimal) -> AccountId {
        self.funded_as(AccountType::Cash, amount).await
    }

    pub async fn funded_as(&self, account_type: AccountType, amount: Decimal) -> AccountId {
        let account_id = self
            .core
            .open_account("alice", account_type, "USD", dec!(1))
            .await
            .unwrap();
        if amount > Decimal::ZERO {
            self.core.deposit(account_id, amount).await.unwrap();
        }
        account_id
    }

    pub async fn limit(
        &self,
        account_id: AccountId,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> OrderId {
        self.core
            .place_order(OrderRequest::limit(account_id, "ACME", side, quantity, price))
            .await
            .unwrap()
    }
}
