use crate::enums::{
    AccountType, InstrumentType, OrderSide, OrderStatus, OrderType, PositionSide,
    SettlementStatus, TimeInForce, TransactionType,
};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type OrderId = Uuid;
pub type TradeId = Uuid;
pub type PositionId = Uuid;
pub type TransactionId = Uuid;

/// A trading account and its cash books.
///
/// `balance` is the equity-like cash value, `available_balance` is what is left
/// after provisional holds, and `margin_used` is the sum of outstanding holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub owner: String,
    pub account_type: AccountType,
    pub currency: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub margin_used: Decimal,
    pub leverage: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates an empty, active account. Only margin accounts keep a leverage above 1.
    pub fn new(owner: &str, account_type: AccountType, currency: &str, leverage: Decimal) -> Self {
        let now = Utc::now();
        let leverage = match account_type {
            AccountType::Margin => leverage,
            AccountType::Cash | AccountType::Demo => Decimal::ONE,
        };
        Self {
            account_id: Uuid::new_v4(),
            owner: owner.to_string(),
            account_type,
            currency: currency.to_string(),
            balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            margin_used: Decimal::ZERO,
            leverage,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Maximum exposure the account may hold in provisional margin.
    pub fn buying_power(&self) -> Decimal {
        self.balance * self.leverage
    }

    /// Checks the account-level invariants.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        if self.available_balance > self.balance {
            return Err(CoreError::Invariant(format!(
                "available balance {} exceeds balance {}",
                self.available_balance, self.balance
            )));
        }
        if self.account_type == AccountType::Cash && self.balance.is_sign_negative() {
            return Err(CoreError::Invariant(format!(
                "cash account balance is negative: {}",
                self.balance
            )));
        }
        if self.account_type == AccountType::Margin && self.margin_used > self.buying_power() {
            return Err(CoreError::Invariant(format!(
                "margin used {} exceeds buying power {}",
                self.margin_used,
                self.buying_power()
            )));
        }
        Ok(())
    }
}

/// Immutable reference data for a tradeable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub instrument_type: InstrumentType,
    pub is_tradeable: bool,
    pub min_trade_size: Decimal,
    pub max_trade_size: Decimal,
    pub tick_size: Decimal,
    /// Fraction of notional reserved as collateral, in (0, 1].
    pub margin_requirement: Decimal,
}

impl Instrument {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "symbol".to_string(),
                "must not be empty".to_string(),
            ));
        }
        if self.min_trade_size <= Decimal::ZERO || self.min_trade_size > self.max_trade_size {
            return Err(CoreError::InvalidInput(
                "trade size".to_string(),
                format!(
                    "expected 0 < min ({}) <= max ({})",
                    self.min_trade_size, self.max_trade_size
                ),
            ));
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "tick_size".to_string(),
                format!("must be positive, got {}", self.tick_size),
            ));
        }
        if self.margin_requirement <= Decimal::ZERO || self.margin_requirement > Decimal::ONE {
            return Err(CoreError::InvalidInput(
                "margin_requirement".to_string(),
                format!("must be in (0, 1], got {}", self.margin_requirement),
            ));
        }
        Ok(())
    }

    /// Whether `quantity` lies within the instrument's trade size bounds.
    pub fn accepts_quantity(&self, quantity: Decimal) -> bool {
        quantity >= self.min_trade_size && quantity <= self.max_trade_size
    }

    /// Whether `price` is an exact multiple of the tick size.
    pub fn is_on_tick(&self, price: Decimal) -> bool {
        self.tick_size.is_zero() || (price % self.tick_size).is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub average_fill_price: Decimal,
    pub commission: Decimal,
    /// Margin still held against the unfilled remainder.
    pub reserved_margin: Decimal,
    pub client_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Order {
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }
}

/// An immutable fill record. Only the settlement fields ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    pub commission: Decimal,
    /// Part of the order's margin hold still kept on the account for this
    /// trade until it settles. Zero for sells.
    #[serde(default)]
    pub held_margin: Decimal,
    pub settlement_status: SettlementStatus,
    pub executed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Signed cash effect of the trade on the account.
    ///
    /// A buy costs its value plus commission; a sell returns its value minus
    /// commission. The commission is never returned.
    pub fn cash_effect(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => -(self.value + self.commission),
            OrderSide::Sell => self.value - self.commission,
        }
    }
}

/// Aggregated open exposure for one (account, instrument, side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub average_entry_price: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn open(account_id: AccountId, symbol: &str, side: PositionSide, quantity: Decimal, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            position_id: Uuid::new_v4(),
            account_id,
            symbol: symbol.to_string(),
            side,
            quantity,
            average_entry_price: price,
            current_price: None,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Realized plus unrealized P&L. Derived, never stored.
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Cost basis of the open quantity.
    pub fn entry_value(&self) -> Decimal {
        self.average_entry_price * self.quantity
    }
}

/// Append-only snapshot of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHistory {
    pub history_id: Uuid,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub holding_period_secs: i64,
}

/// Immutable ledger entry for any balance-affecting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub transaction_type: TransactionType,
    /// Signed: credits are positive, debits negative.
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        transaction_type: TransactionType,
        amount: Decimal,
        balance_after: Decimal,
        reference_id: Option<Uuid>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            account_id,
            transaction_type,
            amount,
            balance_after,
            reference_id,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instrument() -> Instrument {
        Instrument {
            symbol: "ACME".to_string(),
            instrument_type: InstrumentType::Equity,
            is_tradeable: true,
            min_trade_size: dec!(1),
            max_trade_size: dec!(1000),
            tick_size: dec!(0.01),
            margin_requirement: dec!(0.5),
        }
    }

    #[test]
    fn cash_accounts_ignore_requested_leverage() {
        let cash = Account::new("alice", AccountType::Cash, "USD", dec!(5));
        assert_eq!(cash.leverage, Decimal::ONE);
        let margin = Account::new("bob", AccountType::Margin, "USD", dec!(5));
        assert_eq!(margin.leverage, dec!(5));
    }

    #[test]
    fn invariants_catch_available_above_balance() {
        let mut account = Account::new("alice", AccountType::Cash, "USD", Decimal::ONE);
        account.balance = dec!(100);
        account.available_balance = dec!(100);
        assert!(account.check_invariants().is_ok());
        account.available_balance = dec!(100.01);
        assert!(matches!(account.check_invariants(), Err(CoreError::Invariant(_))));
    }

    #[test]
    fn instrument_validation_rejects_inverted_bounds() {
        assert!(instrument().validate().is_ok());
        let mut bad = instrument();
        bad.min_trade_size = dec!(2000);
        assert!(bad.validate().is_err());
        let mut bad = instrument();
        bad.margin_requirement = dec!(1.5);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn tick_and_size_checks() {
        let inst = instrument();
        assert!(inst.is_on_tick(dec!(10.25)));
        assert!(!inst.is_on_tick(dec!(10.255)));
        assert!(inst.accepts_quantity(dec!(1)));
        assert!(!inst.accepts_quantity(dec!(0.5)));
        assert!(!inst.accepts_quantity(dec!(1001)));
    }

    #[test]
    fn trade_cash_effect_keeps_commission() {
        let mut trade = Trade {
            trade_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            symbol: "ACME".to_string(),
            side: OrderSide::Buy,
            quantity: dec!(10),
            price: dec!(100),
            value: dec!(1000),
            commission: dec!(1),
            held_margin: dec!(1000),
            settlement_status: SettlementStatus::Pending,
            executed_at: Utc::now(),
            settled_at: None,
        };
        assert_eq!(trade.cash_effect(), dec!(-1001));
        trade.side = OrderSide::Sell;
        assert_eq!(trade.cash_effect(), dec!(999));
    }

    #[test]
    fn total_pnl_is_derived() {
        let mut position = Position::open(Uuid::new_v4(), "ACME", PositionSide::Long, dec!(10), dec!(100));
        position.realized_pnl = dec!(5);
        position.unrealized_pnl = dec!(-2);
        assert_eq!(position.total_pnl(), dec!(3));
        assert_eq!(position.entry_value(), dec!(1000));
    }
}
