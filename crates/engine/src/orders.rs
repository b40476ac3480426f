use crate::TradingCore;
use chrono::Utc;
use core_types::{
    AccountId, Instrument, Order, OrderId, OrderSide, OrderStatus, OrderType, TimeInForce, Trade,
};
use events::{LedgerEvent, LedgerEventKind};
use ledger::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a caller submits to place an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: AccountId,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Limit price. Required for limit and stop-limit orders.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Trigger price. Required for stop and stop-limit orders.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Idempotency key, unique among the account's open orders.
    #[serde(default)]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// A market order with default time in force.
    pub fn market(account_id: AccountId, symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            account_id,
            symbol: symbol.to_string(),
            order_type: OrderType::Market,
            side,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::default(),
            client_order_id: None,
        }
    }

    /// A limit order with default time in force.
    pub fn limit(account_id: AccountId, symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(account_id, symbol, side, quantity)
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: &str) -> Self {
        self.client_order_id = Some(client_order_id.to_string());
        self
    }
}

/// Quantity must be positive and within the instrument's trade size limits.
fn validate_quantity(instrument: &Instrument, quantity: Decimal) -> Result<(), LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity {
            quantity,
            reason: "quantity must be positive".to_string(),
        });
    }
    if !instrument.accepts_quantity(quantity) {
        return Err(LedgerError::InvalidQuantity {
            quantity,
            reason: format!(
                "outside the trade size limits [{}, {}] of {}",
                instrument.min_trade_size, instrument.max_trade_size, instrument.symbol
            ),
        });
    }
    Ok(())
}

/// Checks that each price field the order type needs is present, positive and
/// on the instrument's tick grid. Prices the type does not use are still
/// rejected when non-positive.
fn validate_prices(instrument: &Instrument, request: &OrderRequest) -> Result<(), LedgerError> {
    let fields = [
        ("limit", request.price, request.order_type.requires_price()),
        ("stop", request.stop_price, request.order_type.requires_stop_price()),
    ];

    for (name, price, required) in fields {
        match price {
            None if required => {
                return Err(LedgerError::InvalidPrice {
                    price: None,
                    reason: format!("{:?} order requires a {name} price", request.order_type),
                });
            }
            None => {}
            Some(p) if p <= Decimal::ZERO => {
                return Err(LedgerError::InvalidPrice {
                    price: Some(p),
                    reason: format!("{name} price must be positive"),
                });
            }
            Some(p) if !instrument.is_on_tick(p) => {
                return Err(LedgerError::InvalidPrice {
                    price: Some(p),
                    reason: format!("{name} price is not a multiple of tick size {}", instrument.tick_size),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

impl TradingCore {
    /// Validates and accepts an order, holding its required margin out of the
    /// account's available balance.
    ///
    /// All checks run before anything is written; a rejected order leaves the
    /// ledger untouched.
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderId, LedgerError> {
        let account_id = request.account_id;
        let mut account = self.store.lock_account(account_id).await?;
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account_id));
        }

        let instrument = self
            .catalog
            .instrument(&request.symbol)
            .filter(|i| i.is_tradeable)
            .ok_or_else(|| LedgerError::InstrumentNotTradeable(request.symbol.clone()))?;
        validate_quantity(&instrument, request.quantity)?;
        validate_prices(&instrument, &request)?;

        if let Some(client_order_id) = request.client_order_id.as_deref() {
            if let Some(existing) = self.store.client_order(account_id, client_order_id).await {
                let status = self.store.lock_order(existing).await?.status;
                if status.is_open() {
                    tracing::warn!(%account_id, %client_order_id, %existing, "duplicate order rejected");
                    return Err(LedgerError::DuplicateOrder {
                        account_id,
                        client_order_id: client_order_id.to_string(),
                    });
                }
            }
        }

        let reference_price = self.margin.reference_price(
            &request.symbol,
            self.prices.last_price(&request.symbol),
            request.price.or(request.stop_price),
        )?;
        let required_margin = self.margin.required_margin(&instrument, request.quantity, reference_price)?;
        self.margin.check_order(&account, required_margin)?;

        // --- Commit ---
        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            account_id,
            symbol: request.symbol,
            order_type: request.order_type,
            side: request.side,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            price: request.price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            status: OrderStatus::Open,
            average_fill_price: Decimal::ZERO,
            commission: Decimal::ZERO,
            reserved_margin: required_margin,
            client_order_id: request.client_order_id,
            created_at: now,
            updated_at: now,
            filled_at: None,
            cancelled_at: None,
            cancel_reason: None,
        };
        let order_id = order.order_id;

        account.available_balance -= required_margin;
        account.margin_used += required_margin;
        account.updated_at = now;
        self.store.insert_order(order.clone()).await;

        tracing::info!(
            %order_id,
            %account_id,
            symbol = %order.symbol,
            side = ?order.side,
            quantity = %order.quantity,
            %reference_price,
            %required_margin,
            "order placed"
        );
        self.publish(LedgerEvent::created(LedgerEventKind::OrderPlaced, order_id, &order));
        Ok(order_id)
    }

    /// Cancels an open order and releases the margin still held for its
    /// unfilled remainder. Fills already recorded are unaffected.
    pub async fn cancel_order(&self, order_id: OrderId, reason: Option<String>) -> Result<(), LedgerError> {
        let account_id = self.store.order_account(order_id).await?;
        let mut account = self.store.lock_account(account_id).await?;
        let mut order = self.store.lock_order(order_id).await?;
        if !order.status.is_open() {
            return Err(LedgerError::OrderNotCancelable {
                order_id,
                status: order.status,
            });
        }

        let before = order.clone();
        let released = order.reserved_margin;
        let now = Utc::now();

        account.available_balance += released;
        account.margin_used = (account.margin_used - released).max(Decimal::ZERO);
        account.updated_at = now;

        order.reserved_margin = Decimal::ZERO;
        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(now);
        order.cancel_reason = reason;
        order.updated_at = now;

        tracing::info!(
            %order_id,
            %account_id,
            %released,
            unfilled = %order.remaining_quantity(),
            "order cancelled"
        );
        self.publish(LedgerEvent::transition(LedgerEventKind::OrderCancelled, order_id, &before, &*order));
        Ok(())
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.store.order(order_id).await
    }

    /// The account's open and partially filled orders, oldest first.
    pub async fn open_orders(&self, account_id: AccountId) -> Result<Vec<Order>, LedgerError> {
        self.store.account(account_id).await?;
        let mut open = Vec::new();
        for order_id in self.store.order_ids_for_account(account_id).await {
            let order = self.store.order(order_id).await?;
            if order.status.is_open() {
                open.push(order);
            }
        }
        Ok(open)
    }

    /// Fills recorded against an order, in execution order.
    pub async fn trades_for_order(&self, order_id: OrderId) -> Result<Vec<Trade>, LedgerError> {
        self.store.order_account(order_id).await?;
        let mut trades = Vec::new();
        for trade_id in self.store.trade_ids_for_order(order_id).await {
            trades.push(self.store.trade(trade_id).await?);
        }
        Ok(trades)
    }
}
