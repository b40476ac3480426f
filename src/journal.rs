//! Journal replay: a JSON array of commands applied in order to a fresh core.
//!
//! Accounts, orders and trades are referred to by aliases chosen in the
//! journal, e.g.
//!
//! ```json
//! [
//!   { "command": "open_account", "alias": "alice", "account_type": "cash" },
//!   { "command": "deposit", "account": "alice", "amount": "10000" },
//!   { "command": "place_order", "alias": "o1", "account": "alice", "symbol": "ACME",
//!     "order_type": "limit", "side": "buy", "quantity": "10", "price": "100" }
//! ]
//! ```

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use core_types::{
    AccountType, CorporateActionType, Instrument, OrderSide, OrderType, PositionSide, TimeInForce,
};
use engine::{OrderRequest, TradingCore};
use ledger::{InstrumentRegistry, PriceBook};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

fn default_currency() -> String {
    "USD".to_string()
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    OpenAccount {
        alias: String,
        #[serde(default)]
        owner: Option<String>,
        account_type: AccountType,
        #[serde(default = "default_currency")]
        currency: String,
        #[serde(default = "default_leverage")]
        leverage: Decimal,
    },
    ListInstrument(Instrument),
    SetPrice {
        symbol: String,
        price: Decimal,
    },
    Deposit {
        account: String,
        amount: Decimal,
    },
    Withdraw {
        account: String,
        amount: Decimal,
    },
    ChargeFee {
        account: String,
        amount: Decimal,
        description: String,
    },
    PlaceOrder {
        alias: String,
        account: String,
        symbol: String,
        order_type: OrderType,
        side: OrderSide,
        quantity: Decimal,
        #[serde(default)]
        price: Option<Decimal>,
        #[serde(default)]
        stop_price: Option<Decimal>,
        #[serde(default)]
        time_in_force: TimeInForce,
        #[serde(default)]
        client_order_id: Option<String>,
    },
    ExecuteTrade {
        #[serde(default)]
        alias: Option<String>,
        order: String,
        quantity: Decimal,
        price: Decimal,
    },
    CancelOrder {
        order: String,
        #[serde(default)]
        reason: Option<String>,
    },
    SettleTrade {
        trade: String,
    },
    BatchSettle {
        /// Defaults to today (UTC).
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    ClosePosition {
        account: String,
        symbol: String,
        side: PositionSide,
        price: Decimal,
    },
    MarkToMarket {
        #[serde(default)]
        account: Option<String>,
    },
    CorporateAction {
        symbol: String,
        action: CorporateActionType,
        ratio: Decimal,
        #[serde(default)]
        effective_date: Option<NaiveDate>,
    },
}

pub fn load(path: &Path) -> anyhow::Result<Vec<Command>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading journal {}", path.display()))?;
    let commands = serde_json::from_str(&raw).with_context(|| format!("parsing journal {}", path.display()))?;
    Ok(commands)
}

/// Replays commands against one core, resolving journal aliases to ids.
pub struct Replayer<'a> {
    core: &'a TradingCore,
    catalog: &'a InstrumentRegistry,
    prices: &'a PriceBook,
    accounts: HashMap<String, Uuid>,
    orders: HashMap<String, Uuid>,
    trades: HashMap<String, Uuid>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReplaySummary {
    pub applied: usize,
    pub failed: usize,
}

impl<'a> Replayer<'a> {
    pub fn new(core: &'a TradingCore, catalog: &'a InstrumentRegistry, prices: &'a PriceBook) -> Self {
        Self {
            core,
            catalog,
            prices,
            accounts: HashMap::new(),
            orders: HashMap::new(),
            trades: HashMap::new(),
        }
    }

    /// Account aliases with their ids, for reporting.
    pub fn accounts(&self) -> &HashMap<String, Uuid> {
        &self.accounts
    }

    /// Applies every command. A failing command is logged and skipped.
    pub async fn run(&mut self, commands: Vec<Command>) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for (index, command) in commands.into_iter().enumerate() {
            match self.apply(command).await {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    tracing::warn!(step = index + 1, error = %e, "journal command failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    fn resolve(map: &HashMap<String, Uuid>, what: &str, alias: &str) -> anyhow::Result<Uuid> {
        map.get(alias)
            .copied()
            .ok_or_else(|| anyhow!("unknown {what} alias '{alias}'"))
    }

    async fn apply(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::OpenAccount {
                alias,
                owner,
                account_type,
                currency,
                leverage,
            } => {
                let owner = owner.unwrap_or_else(|| alias.clone());
                let id = self.core.open_account(&owner, account_type, &currency, leverage).await?;
                self.accounts.insert(alias, id);
            }
            Command::ListInstrument(instrument) => self.catalog.list(instrument)?,
            Command::SetPrice { symbol, price } => {
                if !self.prices.set_price(&symbol, price) {
                    return Err(anyhow!("price {price} for {symbol} rejected"));
                }
            }
            Command::Deposit { account, amount } => {
                let id = Self::resolve(&self.accounts, "account", &account)?;
                self.core.deposit(id, amount).await?;
            }
            Command::Withdraw { account, amount } => {
                let id = Self::resolve(&self.accounts, "account", &account)?;
                self.core.withdraw(id, amount).await?;
            }
            Command::ChargeFee {
                account,
                amount,
                description,
            } => {
                let id = Self::resolve(&self.accounts, "account", &account)?;
                self.core.charge_fee(id, amount, &description).await?;
            }
            Command::PlaceOrder {
                alias,
                account,
                symbol,
                order_type,
                side,
                quantity,
                price,
                stop_price,
                time_in_force,
                client_order_id,
            } => {
                let account_id = Self::resolve(&self.accounts, "account", &account)?;
                let request = OrderRequest {
                    account_id,
                    symbol,
                    order_type,
                    side,
                    quantity,
                    price,
                    stop_price,
                    time_in_force,
                    client_order_id,
                };
                let order_id = self.core.place_order(request).await?;
                self.orders.insert(alias, order_id);
            }
            Command::ExecuteTrade {
                alias,
                order,
                quantity,
                price,
            } => {
                let order_id = Self::resolve(&self.orders, "order", &order)?;
                let trade_id = self.core.execute_trade(order_id, quantity, price).await?;
                if let Some(alias) = alias {
                    self.trades.insert(alias, trade_id);
                }
            }
            Command::CancelOrder { order, reason } => {
                let order_id = Self::resolve(&self.orders, "order", &order)?;
                self.core.cancel_order(order_id, reason).await?;
            }
            Command::SettleTrade { trade } => {
                let trade_id = Self::resolve(&self.trades, "trade", &trade)?;
                self.core.settle_trade(trade_id).await?;
            }
            Command::BatchSettle { date } => {
                let date = date.unwrap_or_else(|| Utc::now().date_naive());
                let batch = self.core.batch_settle_trades(date).await;
                println!(
                    "Batch settlement {}: {} settled, {} failed, value {}",
                    batch.date, batch.settled, batch.failed, batch.total_value
                );
            }
            Command::ClosePosition {
                account,
                symbol,
                side,
                price,
            } => {
                let account_id = Self::resolve(&self.accounts, "account", &account)?;
                let position = self
                    .core
                    .positions(account_id)
                    .await?
                    .into_iter()
                    .find(|p| p.symbol == symbol && p.side == side)
                    .ok_or_else(|| anyhow!("no open {side} position in {symbol} for '{account}'"))?;
                self.core.close_position(position.position_id, price).await?;
            }
            Command::MarkToMarket { account } => {
                let account_id = account
                    .map(|alias| Self::resolve(&self.accounts, "account", &alias))
                    .transpose()?;
                self.core.mark_to_market(account_id).await?;
            }
            Command::CorporateAction {
                symbol,
                action,
                ratio,
                effective_date,
            } => {
                let effective_date = effective_date.unwrap_or_else(|| Utc::now().date_naive());
                let outcome = self
                    .core
                    .process_corporate_action(&symbol, action, ratio, effective_date)
                    .await?;
                if !outcome.failed.is_empty() {
                    return Err(anyhow!(
                        "{} position(s) could not be adjusted for {symbol}",
                        outcome.failed.len()
                    ));
                }
            }
        }
        Ok(())
    }
}
