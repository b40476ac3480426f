use crate::TradingCore;
use crate::amounts::{add, div, mul, sub};
use crate::positions::filled_position;
use chrono::Utc;
use core_types::{
    Order, OrderId, OrderSide, OrderStatus, Position, PositionSide, SettlementStatus, Trade, TradeId,
    Transaction, TransactionType,
};
use events::{LedgerEvent, LedgerEventKind};
use ledger::{LedgerError, PositionKey};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Audit payload of one fill: the new trade and the rows it changed.
#[derive(Serialize)]
struct FillRecord<'a> {
    trade: &'a Trade,
    order: &'a Order,
    position: &'a Position,
}

/// Share of the order's reservation attributable to `fill_quantity`. A fill of
/// the whole remainder takes everything still reserved, so no residue is left
/// behind by division.
fn released_margin(order: &Order, fill_quantity: Decimal) -> Result<Decimal, LedgerError> {
    let remaining = order.remaining_quantity();
    if fill_quantity >= remaining {
        Ok(order.reserved_margin)
    } else {
        div(
            "released margin",
            mul("released margin", order.reserved_margin, fill_quantity)?,
            remaining,
        )
    }
}

impl TradingCore {
    /// Records a fill against an open order.
    ///
    /// The order's fill state, the new trade, the position and the
    /// provisional `trade` transaction are written together once every lock
    /// is held and every check has passed. No cash moves until the trade is
    /// settled. A buy fill moves its share of the order's hold onto the trade,
    /// so the cash stays committed until settlement; a sell fill returns it.
    pub async fn execute_trade(
        &self,
        order_id: OrderId,
        fill_quantity: Decimal,
        fill_price: Decimal,
    ) -> Result<TradeId, LedgerError> {
        if fill_quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                quantity: fill_quantity,
                reason: "fill quantity must be positive".to_string(),
            });
        }
        if fill_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice {
                price: Some(fill_price),
                reason: "fill price must be positive".to_string(),
            });
        }

        let account_id = self.store.order_account(order_id).await?;
        let mut account = self.store.lock_account(account_id).await?;
        let mut order = self.store.lock_order(order_id).await?;

        if !order.status.is_open() {
            return Err(LedgerError::OrderNotOpen {
                order_id,
                status: order.status,
            });
        }
        let remaining = order.remaining_quantity();
        if fill_quantity > remaining {
            tracing::warn!(%order_id, %fill_quantity, %remaining, "overfill rejected");
            return Err(LedgerError::OverFill {
                order_id,
                requested: fill_quantity,
                remaining,
            });
        }

        let key = PositionKey::new(account_id, &order.symbol, PositionSide::from(order.side));
        let existing_position = self.lock_open_position(&key).await?;

        let value = mul("fill value", fill_quantity, fill_price)?;
        let commission = mul("commission", value, self.commission_rate)?;
        let cost = add("fill cost", value, commission)?;
        let total_commission = add("order commission", order.commission, commission)?;
        let filled = order.filled_quantity + fill_quantity;
        let filled_value = add(
            "filled value",
            mul("filled value", order.average_fill_price, order.filled_quantity)?,
            value,
        )?;
        let average_fill_price = div("average fill price", filled_value, filled)?;
        let release = released_margin(&order, fill_quantity)?;
        let held = match order.side {
            OrderSide::Buy => release,
            OrderSide::Sell => Decimal::ZERO,
        };
        let projected_balance = match order.side {
            OrderSide::Buy => sub("projected balance", account.balance, cost)?,
            OrderSide::Sell => add("projected balance", account.balance, value - commission)?,
        };
        let next_position = filled_position(existing_position.as_deref(), &key, fill_quantity, fill_price)?;

        // --- Commit: nothing below can fail ---
        let now = Utc::now();

        let trade = Trade {
            trade_id: Uuid::new_v4(),
            order_id,
            account_id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: fill_quantity,
            price: fill_price,
            value,
            commission,
            held_margin: held,
            settlement_status: SettlementStatus::Pending,
            executed_at: now,
            settled_at: None,
        };
        let trade_id = trade.trade_id;

        order.average_fill_price = average_fill_price;
        order.filled_quantity = filled;
        order.commission = total_commission;
        order.reserved_margin -= release;
        order.updated_at = now;
        if order.remaining_quantity().is_zero() {
            order.status = OrderStatus::Filled;
            order.filled_at = Some(now);
        } else {
            order.status = OrderStatus::PartiallyFilled;
        }

        let returned = release - held;
        account.available_balance += returned;
        account.margin_used = (account.margin_used - returned).max(Decimal::ZERO);
        account.updated_at = now;

        let position = self.post_fill(existing_position, next_position).await;

        // Projected balance once the trade settles; settlement is authoritative.
        let transaction = Transaction::new(
            account_id,
            TransactionType::Trade,
            trade.cash_effect(),
            projected_balance,
            Some(trade_id),
            format!("{:?} {} {} @ {}", trade.side, fill_quantity, trade.symbol, fill_price),
        );
        self.store.append_transaction(transaction).await;
        self.store.insert_trade(trade.clone()).await;

        tracing::info!(
            %trade_id,
            %order_id,
            quantity = %fill_quantity,
            price = %fill_price,
            %commission,
            status = %order.status,
            "trade executed"
        );
        let record = FillRecord {
            trade: &trade,
            order: &order,
            position: &position,
        };
        self.publish(LedgerEvent::created(LedgerEventKind::TradeExecuted, trade_id, &record));
        Ok(trade_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{OrderSide, OrderType, TimeInForce};
    use rust_decimal_macros::dec;

    fn order(quantity: Decimal, filled: Decimal, reserved: Decimal) -> Order {
        let now = Utc::now();
        Order {
            order_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            symbol: "ACME".to_string(),
            order_type: OrderType::Market,
            side: OrderSide::Buy,
            quantity,
            filled_quantity: filled,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            status: OrderStatus::Open,
            average_fill_price: Decimal::ZERO,
            commission: Decimal::ZERO,
            reserved_margin: reserved,
            client_order_id: None,
            created_at: now,
            updated_at: now,
            filled_at: None,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    #[test]
    fn partial_fill_releases_its_share() {
        assert_eq!(released_margin(&order(dec!(10), dec!(0), dec!(1000)), dec!(4)), Ok(dec!(400)));
    }

    #[test]
    fn final_fill_releases_the_rest() {
        // 1000 / 3 does not divide evenly; the last fill takes whatever is left.
        let o = order(dec!(3), dec!(2), dec!(333.34));
        assert_eq!(released_margin(&o, dec!(1)), Ok(dec!(333.34)));
    }
}
