mod common;

use common::harness;
use core_types::{OrderSide, OrderStatus};
use engine::{LedgerError, OrderRequest};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn weighted_average_is_exact(
        q1 in 1u32..10_000,
        q2 in 1u32..10_000,
        p1 in 1i64..10_000_000,
        p2 in 1i64..10_000_000,
    ) {
        let (q1, q2) = (Decimal::from(q1), Decimal::from(q2));
        let (p1, p2) = (Decimal::new(p1, 4), Decimal::new(p2, 4));

        let average = runtime().block_on(async {
            let h = harness();
            let account_id = h.funded(dec!(0)).await;
            h.core.apply_fill(account_id, "ACME", OrderSide::Buy, q1, p1).await.unwrap();
            let id = h.core.apply_fill(account_id, "ACME", OrderSide::Buy, q2, p2).await.unwrap();
            h.core.position(id).await.unwrap()
        });

        prop_assert_eq!(average.quantity, q1 + q2);
        prop_assert_eq!(average.average_entry_price, (p1 * q1 + p2 * q2) / (q1 + q2));
    }

    #[test]
    fn filled_quantity_is_monotonic_and_bounded(fills in prop::collection::vec(1u32..40, 1..12)) {
        runtime().block_on(async {
            let h = harness();
            let account_id = h.funded(dec!(100000)).await;
            let order_id = h
                .core
                .place_order(OrderRequest::limit(account_id, "ACME", OrderSide::Buy, dec!(100), dec!(10)))
                .await
                .unwrap();

            let mut last = Decimal::ZERO;
            for fill in fills {
                let fill = Decimal::from(fill);
                let result = h.core.execute_trade(order_id, fill, dec!(10)).await;
                let order = h.core.order(order_id).await.unwrap();

                match result {
                    Ok(_) => assert_eq!(order.filled_quantity, last + fill),
                    Err(LedgerError::OverFill { .. }) | Err(LedgerError::OrderNotOpen { .. }) => {
                        assert_eq!(order.filled_quantity, last)
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
                assert!(order.filled_quantity >= last);
                assert!(order.filled_quantity <= order.quantity);
                assert_eq!(order.status == OrderStatus::Filled, order.filled_quantity == order.quantity);
                last = order.filled_quantity;
            }
        });
    }
}
