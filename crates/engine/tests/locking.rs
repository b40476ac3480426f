mod common;

use common::instrument;
use configuration::Config;
use core_types::{AccountType, OrderSide};
use engine::{ErrorKind, LedgerError, OrderRequest, TradingCore};
use events::{AuditSink, LedgerEvent};
use ledger::{InstrumentRegistry, PriceBook};
use risk::SimpleMarginValidator;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Blocks on the first event recorded after `arm`. Operations publish while
/// still holding their row locks, so the publisher keeps them for `pause`.
struct StallingSink {
    armed: AtomicBool,
    entered: Mutex<Option<oneshot::Sender<()>>>,
    pause: Duration,
}

impl StallingSink {
    fn new(pause: Duration) -> Self {
        Self {
            armed: AtomicBool::new(false),
            entered: Mutex::new(None),
            pause,
        }
    }

    fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.entered.lock().unwrap() = Some(tx);
        self.armed.store(true, Ordering::SeqCst);
        rx
    }
}

impl AuditSink for StallingSink {
    fn record(&self, _event: LedgerEvent) {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(tx) = self.entered.lock().unwrap().take() {
                let _ = tx.send(());
            }
            std::thread::sleep(self.pause);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_timeout_is_a_retryable_conflict_with_no_partial_state() {
    let mut config = Config::default();
    config.locking.timeout_ms = 50;
    let catalog = Arc::new(InstrumentRegistry::new());
    catalog.list(instrument("ACME", dec!(1))).unwrap();
    let sink = Arc::new(StallingSink::new(Duration::from_millis(500)));
    let core = Arc::new(TradingCore::new(
        &config,
        catalog,
        Arc::new(PriceBook::new()),
        Arc::new(SimpleMarginValidator::new()),
        sink.clone(),
    ));

    let account_id = core.open_account("alice", AccountType::Cash, "USD", dec!(1)).await.unwrap();
    core.deposit(account_id, dec!(10000)).await.unwrap();
    let order_id = core
        .place_order(OrderRequest::limit(account_id, "ACME", OrderSide::Buy, dec!(10), dec!(100)))
        .await
        .unwrap();
    let order_before = core.order(order_id).await.unwrap();

    // A deposit that stalls while it still holds the account lock.
    let entered = sink.arm();
    let slow = tokio::spawn({
        let core = core.clone();
        async move { core.deposit(account_id, dec!(5)).await }
    });
    entered.await.unwrap();

    let err = core.execute_trade(order_id, dec!(10), dec!(100)).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::Conflict {
            resource: "account",
            id: account_id
        }
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.is_retryable());

    slow.await.unwrap().unwrap();

    assert_eq!(core.order(order_id).await.unwrap(), order_before);
    assert!(core.trades_for_order(order_id).await.unwrap().is_empty());
    assert!(core.positions(account_id).await.unwrap().is_empty());
    let account = core.account(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(10005));
    assert_eq!(account.available_balance, dec!(9005));

    // Retrying from scratch succeeds once the lock is free.
    core.execute_trade(order_id, dec!(10), dec!(100)).await.unwrap();
    assert_eq!(core.order(order_id).await.unwrap().filled_quantity, dec!(10));
}
