mod common;

use chrono::Utc;
use common::harness;
use core_types::{CorporateActionType, OrderSide, TransactionType};
use engine::ErrorKind;
use events::LedgerEventKind;
use rust_decimal_macros::dec;

#[tokio::test]
async fn split_preserves_position_value() {
    let h = harness();
    let account_id = h.funded(dec!(0)).await;
    let long = h.core.apply_fill(account_id, "ACME", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();
    let short = h.core.apply_fill(account_id, "ACME", OrderSide::Sell, dec!(4), dec!(100)).await.unwrap();
    h.prices.set_price("ACME", dec!(110));
    h.core.mark_to_market(None).await.unwrap();

    let outcome = h
        .core
        .process_corporate_action("ACME", CorporateActionType::Split, dec!(2), Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(outcome.affected, 2);
    assert!(outcome.failed.is_empty());

    let position = h.core.position(long).await.unwrap();
    assert_eq!(position.quantity, dec!(20));
    assert_eq!(position.average_entry_price, dec!(50));
    assert_eq!(position.current_price, Some(dec!(55)));
    assert_eq!(position.unrealized_pnl, dec!(100));
    assert_eq!(position.entry_value(), dec!(1000));

    assert_eq!(h.core.position(short).await.unwrap().quantity, dec!(8));
}

#[tokio::test]
async fn reverse_split_consolidates() {
    let h = harness();
    let account_id = h.funded(dec!(0)).await;
    let position_id = h.core.apply_fill(account_id, "ACME", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();

    h.core
        .process_corporate_action("ACME", CorporateActionType::ReverseSplit, dec!(0.5), Utc::now().date_naive())
        .await
        .unwrap();

    let position = h.core.position(position_id).await.unwrap();
    assert_eq!(position.quantity, dec!(5));
    assert_eq!(position.average_entry_price, dec!(200));
}

#[tokio::test]
async fn dividends_are_paid_to_long_holders_only() {
    let h = harness();
    let holder = h.funded(dec!(1000)).await;
    let shorter = h.funded(dec!(1000)).await;
    h.core.apply_fill(holder, "ACME", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();
    h.core.apply_fill(shorter, "ACME", OrderSide::Sell, dec!(4), dec!(100)).await.unwrap();
    h.core.apply_fill(holder, "MARG", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();

    let outcome = h
        .core
        .process_corporate_action("ACME", CorporateActionType::Dividend, dec!(0.5), Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(outcome.affected, 1);

    assert_eq!(h.core.account(holder).await.unwrap().balance, dec!(1005));
    assert_eq!(h.core.account(shorter).await.unwrap().balance, dec!(1000));

    let dividend = h
        .core
        .transactions(holder)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.transaction_type == TransactionType::Dividend)
        .unwrap();
    assert_eq!(dividend.amount, dec!(5));
    assert_eq!(dividend.balance_after, dec!(1005));
    assert!(h.core.reconcile_account(holder).await.unwrap().is_balanced);

    let event = h.audit.events().pop().unwrap();
    assert_eq!(event.kind, LedgerEventKind::CorporateActionApplied);
    assert_eq!(event.entity_id, outcome.action_id);
    assert_eq!(event.after.unwrap()["affected"], 1);
}

#[tokio::test]
async fn action_without_open_positions_affects_nothing() {
    let h = harness();
    let outcome = h
        .core
        .process_corporate_action("ACME", CorporateActionType::Split, dec!(3), Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(outcome.affected, 0);
}

#[tokio::test]
async fn non_positive_ratio_is_rejected() {
    let h = harness();
    let err = h
        .core
        .process_corporate_action("ACME", CorporateActionType::Split, dec!(0), Utc::now().date_naive())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn split_direction_must_match_the_ratio() {
    let h = harness();
    let account_id = h.funded(dec!(0)).await;
    let position_id = h.core.apply_fill(account_id, "ACME", OrderSide::Buy, dec!(10), dec!(100)).await.unwrap();
    let today = Utc::now().date_naive();

    let err = h
        .core
        .process_corporate_action("ACME", CorporateActionType::Split, dec!(0.5), today)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = h
        .core
        .process_corporate_action("ACME", CorporateActionType::ReverseSplit, dec!(2), today)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let position = h.core.position(position_id).await.unwrap();
    assert_eq!(position.quantity, dec!(10));
    assert_eq!(position.average_entry_price, dec!(100));
}
