mod common;

use chrono::{Duration, Utc};
use common::harness;
use core_types::{OrderSide, SettlementStatus, TransactionType};
use engine::{ErrorKind, LedgerError};
use events::LedgerEventKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn settling_a_buy_debits_value_and_commission_once() {
    let h = harness();
    let account_id = h.funded(dec!(10000)).await;
    let order_id = h.limit(account_id, OrderSide::Buy, dec!(10), dec!(100)).await;
    let trade_id = h.core.execute_trade(order_id, dec!(10), dec!(100)).await.unwrap();

    h.core.settle_trade(trade_id).await.unwrap();
    let settled = h.core.account(account_id).await.unwrap();
    assert_eq!(settled.balance, dec!(8999));
    assert_eq!(settled.available_balance, dec!(8999));

    let trade = &h.core.trades_for_order(order_id).await.unwrap()[0];
    assert_eq!(trade.settlement_status, SettlementStatus::Settled);
    assert!(trade.settled_at.is_some());

    let again = h.core.settle_trade(trade_id).await.unwrap_err();
    assert_eq!(again, LedgerError::AlreadySettled(trade_id));
    assert_eq!(again.kind(), ErrorKind::InvalidState);
    assert_eq!(h.core.account(account_id).await.unwrap(), settled);

    let reconciliation = h.core.reconcile_account(account_id).await.unwrap();
    assert_eq!(reconciliation.expected_balance, dec!(8999));
    assert!(reconciliation.is_balanced);
}

#[tokio::test]
async fn settling_a_sell_keeps_the_commission() {
    let h = harness();
    let account_id = h.funded(dec!(10000)).await;
    let order_id = h.limit(account_id, OrderSide::Sell, dec!(10), dec!(100)).await;
    let trade_id = h.core.execute_trade(order_id, dec!(10), dec!(100)).await.unwrap();

    h.core.settle_trade(trade_id).await.unwrap();

    let account = h.core.account(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(10999));
    let settlement = h
        .core
        .transactions(account_id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.transaction_type == TransactionType::Settlement)
        .unwrap();
    assert_eq!(settlement.amount, dec!(999));
    assert_eq!(settlement.balance_after, dec!(10999));
    assert_eq!(settlement.reference_id, Some(trade_id));
}

#[tokio::test]
async fn unpayable_buy_fails_and_can_be_retried_after_funding() {
    let h = harness();
    let account_id = h.funded(dec!(1000)).await;
    let order_id = h.limit(account_id, OrderSide::Buy, dec!(10), dec!(100)).await;
    let trade_id = h.core.execute_trade(order_id, dec!(10), dec!(100)).await.unwrap();

    let err = h.core.settle_trade(trade_id).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            required: dec!(1001),
            available: dec!(1000)
        }
    );
    assert_eq!(h.core.account(account_id).await.unwrap().balance, dec!(1000));
    let trade = &h.core.trades_for_order(order_id).await.unwrap()[0];
    assert_eq!(trade.settlement_status, SettlementStatus::Failed);
    assert_eq!(h.audit.events().pop().unwrap().kind, LedgerEventKind::SettlementFailed);

    h.core.deposit(account_id, dec!(1)).await.unwrap();
    h.core.settle_trade(trade_id).await.unwrap();
    assert_eq!(h.core.account(account_id).await.unwrap().balance, dec!(0));
    assert!(h.core.reconcile_account(account_id).await.unwrap().is_balanced);
}

#[tokio::test]
async fn batch_settles_pending_trades_and_tallies_failures() {
    let h = harness();
    let rich = h.funded(dec!(10000)).await;
    let poor = h.funded(dec!(1000)).await;

    let first = h.limit(rich, OrderSide::Buy, dec!(10), dec!(100)).await;
    let already = h.core.execute_trade(first, dec!(10), dec!(100)).await.unwrap();
    h.core.settle_trade(already).await.unwrap();

    let second = h.limit(rich, OrderSide::Buy, dec!(5), dec!(100)).await;
    h.core.execute_trade(second, dec!(5), dec!(100)).await.unwrap();

    let unpayable = h.limit(poor, OrderSide::Buy, dec!(10), dec!(100)).await;
    let failing = h.core.execute_trade(unpayable, dec!(10), dec!(100)).await.unwrap();

    let today = Utc::now().date_naive();
    let batch = h.core.batch_settle_trades(today).await;

    assert_eq!(batch.date, today);
    assert_eq!(batch.settled, 1);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.total_value, dec!(500));
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].0, failing);
    assert_eq!(batch.failures[0].1.kind(), ErrorKind::InsufficientFunds);

    // 10000 - 1001 - 500.5
    assert_eq!(h.core.account(rich).await.unwrap().balance, dec!(8498.5));

    // Failed trades are not retried by the next run.
    let rerun = h.core.batch_settle_trades(today).await;
    assert_eq!((rerun.settled, rerun.failed), (0, 0));
}

#[tokio::test]
async fn batch_for_a_day_without_trades_is_empty() {
    let h = harness();
    let account_id = h.funded(dec!(10000)).await;
    let order_id = h.limit(account_id, OrderSide::Buy, dec!(1), dec!(100)).await;
    h.core.execute_trade(order_id, dec!(1), dec!(100)).await.unwrap();

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let batch = h.core.batch_settle_trades(yesterday).await;
    assert_eq!(batch.settled, 0);
    assert_eq!(batch.failed, 0);
    assert_eq!(batch.total_value, Decimal::ZERO);
}

#[tokio::test]
async fn reconciliation_counts_every_cash_flow() {
    let h = harness();
    let account_id = h.funded(dec!(1000)).await;
    h.core.withdraw(account_id, dec!(200)).await.unwrap();
    h.core.charge_fee(account_id, dec!(10), "custody").await.unwrap();

    let reconciliation = h.core.reconcile_account(account_id).await.unwrap();
    assert_eq!(reconciliation.actual_balance, dec!(790));
    assert_eq!(reconciliation.expected_balance, dec!(790));
    assert_eq!(reconciliation.difference, dec!(0));
    assert!(reconciliation.is_balanced);
}

#[tokio::test]
async fn withdrawals_are_limited_to_free_cash() {
    let h = harness();
    let account_id = h.funded(dec!(1000)).await;
    h.limit(account_id, OrderSide::Buy, dec!(8), dec!(100)).await;

    let err = h.core.withdraw(account_id, dec!(300)).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            required: dec!(300),
            available: dec!(200)
        }
    );
    h.core.withdraw(account_id, dec!(200)).await.unwrap();
    assert_eq!(h.core.account(account_id).await.unwrap().available_balance, dec!(0));
}

#[tokio::test]
async fn margin_requirements_follow_the_marks() {
    let h = harness();
    let account_id = h.funded(dec!(10000)).await;
    h.core.apply_fill(account_id, "MARG", OrderSide::Buy, dec!(100), dec!(10)).await.unwrap();

    // Unmarked positions are valued at entry.
    let at_entry = h.core.calculate_margin_requirements(account_id).await.unwrap();
    assert_eq!(at_entry.required, dec!(250));

    h.prices.set_price("MARG", dec!(12));
    h.core.mark_to_market(Some(account_id)).await.unwrap();
    let marked = h.core.calculate_margin_requirements(account_id).await.unwrap();
    assert_eq!(marked.required, dec!(300));
    assert_eq!(marked.available, dec!(10000));
    assert!(!marked.is_margin_call);
    assert!(marked.level.unwrap() > dec!(100));
}

#[tokio::test]
async fn thin_account_triggers_a_margin_call() {
    let h = harness();
    let account_id = h.funded(dec!(100)).await;
    h.core.apply_fill(account_id, "ACME", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();

    let requirements = h.core.calculate_margin_requirements(account_id).await.unwrap();
    assert_eq!(requirements.required, dec!(1000));
    assert!(requirements.is_margin_call);
    assert_eq!(requirements.level, Some(dec!(10)));
}
