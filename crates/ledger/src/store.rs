use crate::error::LedgerError;
use chrono::NaiveDate;
use core_types::{
    Account, AccountId, Order, OrderId, Position, PositionHistory, PositionId, PositionSide, Trade,
    TradeId, Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use uuid::Uuid;

/// A lockable row.
pub type Row<T> = Arc<Mutex<T>>;
/// Exclusive access to a row until dropped.
pub type RowGuard<T> = OwnedMutexGuard<T>;

/// Identity of an aggregated position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub account_id: AccountId,
    pub symbol: String,
    pub side: PositionSide,
}

impl PositionKey {
    pub fn new(account_id: AccountId, symbol: &str, side: PositionSide) -> Self {
        Self {
            account_id,
            symbol: symbol.to_string(),
            side,
        }
    }
}

/// A position row together with its immutable identity, so callers can take
/// the owning account's lock before the position's.
#[derive(Debug, Clone)]
pub struct PositionEntry {
    pub position_id: PositionId,
    pub key: PositionKey,
    pub row: Row<Position>,
}

#[derive(Debug, Clone)]
struct OrderEntry {
    account_id: AccountId,
    row: Row<Order>,
}

#[derive(Debug, Clone)]
struct TradeEntry {
    account_id: AccountId,
    executed_on: NaiveDate,
    row: Row<Trade>,
}

/// The in-memory ledger.
#[derive(Debug)]
pub struct LedgerStore {
    accounts: RwLock<HashMap<AccountId, Row<Account>>>,
    orders: RwLock<HashMap<OrderId, OrderEntry>>,
    account_orders: RwLock<HashMap<AccountId, Vec<OrderId>>>,
    client_orders: RwLock<HashMap<(AccountId, String), OrderId>>,
    trades: RwLock<HashMap<TradeId, TradeEntry>>,
    order_trades: RwLock<HashMap<OrderId, Vec<TradeId>>>,
    positions: RwLock<HashMap<PositionId, PositionEntry>>,
    position_index: RwLock<HashMap<PositionKey, PositionId>>,
    history: RwLock<Vec<PositionHistory>>,
    transactions: RwLock<Vec<Transaction>>,
    lock_timeout: Duration,
}

impl LedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            account_orders: RwLock::new(HashMap::new()),
            client_orders: RwLock::new(HashMap::new()),
            trades: RwLock::new(HashMap::new()),
            order_trades: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            position_index: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            transactions: RwLock::new(Vec::new()),
            lock_timeout,
        }
    }

    /// Acquires a row lock, waiting at most the configured timeout.
    pub async fn lock<T>(&self, row: &Row<T>, resource: &'static str, id: Uuid) -> Result<RowGuard<T>, LedgerError> {
        match timeout(self.lock_timeout, Arc::clone(row).lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(resource, %id, timeout_ms = self.lock_timeout.as_millis() as u64, "row lock timed out");
                Err(LedgerError::Conflict { resource, id })
            }
        }
    }

    // ==================== Accounts ====================

    pub async fn insert_account(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.account_id, Arc::new(Mutex::new(account)));
    }

    pub async fn lock_account(&self, account_id: AccountId) -> Result<RowGuard<Account>, LedgerError> {
        let row = self
            .accounts
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        self.lock(&row, "account", account_id).await
    }

    /// A consistent copy of the account.
    pub async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        Ok(self.lock_account(account_id).await?.clone())
    }

    pub async fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.read().await.keys().copied().collect()
    }

    // ==================== Orders ====================

    pub async fn insert_order(&self, order: Order) {
        let order_id = order.order_id;
        let account_id = order.account_id;
        if let Some(client_id) = order.client_order_id.clone() {
            self.client_orders
                .write()
                .await
                .insert((account_id, client_id), order_id);
        }
        self.account_orders
            .write()
            .await
            .entry(account_id)
            .or_default()
            .push(order_id);
        self.orders.write().await.insert(
            order_id,
            OrderEntry {
                account_id,
                row: Arc::new(Mutex::new(order)),
            },
        );
    }

    /// Account owning the order. Immutable, so no row lock is needed.
    pub async fn order_account(&self, order_id: OrderId) -> Result<AccountId, LedgerError> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .map(|entry| entry.account_id)
            .ok_or(LedgerError::OrderNotFound(order_id))
    }

    pub async fn lock_order(&self, order_id: OrderId) -> Result<RowGuard<Order>, LedgerError> {
        let row = self
            .orders
            .read()
            .await
            .get(&order_id)
            .map(|entry| Arc::clone(&entry.row))
            .ok_or(LedgerError::OrderNotFound(order_id))?;
        self.lock(&row, "order", order_id).await
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        Ok(self.lock_order(order_id).await?.clone())
    }

    pub async fn order_ids_for_account(&self, account_id: AccountId) -> Vec<OrderId> {
        self.account_orders
            .read()
            .await
            .get(&account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Latest order submitted under `client_order_id` for the account, whatever its status.
    pub async fn client_order(&self, account_id: AccountId, client_order_id: &str) -> Option<OrderId> {
        self.client_orders
            .read()
            .await
            .get(&(account_id, client_order_id.to_string()))
            .copied()
    }

    // ==================== Trades ====================

    /// Records a trade. The caller holds the order's lock, so an order's
    /// trades are indexed in fill order.
    pub async fn insert_trade(&self, trade: Trade) {
        let trade_id = trade.trade_id;
        let order_id = trade.order_id;
        let entry = TradeEntry {
            account_id: trade.account_id,
            executed_on: trade.executed_at.date_naive(),
            row: Arc::new(Mutex::new(trade)),
        };
        self.trades.write().await.insert(trade_id, entry);
        self.order_trades
            .write()
            .await
            .entry(order_id)
            .or_default()
            .push(trade_id);
    }

    pub async fn trade_account(&self, trade_id: TradeId) -> Result<AccountId, LedgerError> {
        self.trades
            .read()
            .await
            .get(&trade_id)
            .map(|entry| entry.account_id)
            .ok_or(LedgerError::TradeNotFound(trade_id))
    }

    pub async fn lock_trade(&self, trade_id: TradeId) -> Result<RowGuard<Trade>, LedgerError> {
        let row = self
            .trades
            .read()
            .await
            .get(&trade_id)
            .map(|entry| Arc::clone(&entry.row))
            .ok_or(LedgerError::TradeNotFound(trade_id))?;
        self.lock(&row, "trade", trade_id).await
    }

    pub async fn trade(&self, trade_id: TradeId) -> Result<Trade, LedgerError> {
        Ok(self.lock_trade(trade_id).await?.clone())
    }

    /// Trades executed on `date` (UTC), in no particular order.
    pub async fn trade_ids_on(&self, date: NaiveDate) -> Vec<TradeId> {
        self.trades
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.executed_on == date)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Trades of an order, in fill order.
    pub async fn trade_ids_for_order(&self, order_id: OrderId) -> Vec<TradeId> {
        self.order_trades
            .read()
            .await
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    // ==================== Positions ====================

    pub async fn find_position(&self, key: &PositionKey) -> Option<PositionEntry> {
        let position_id = *self.position_index.read().await.get(key)?;
        self.positions.read().await.get(&position_id).cloned()
    }

    pub async fn position_entry(&self, position_id: PositionId) -> Result<PositionEntry, LedgerError> {
        self.positions
            .read()
            .await
            .get(&position_id)
            .cloned()
            .ok_or(LedgerError::PositionNotFound(position_id))
    }

    /// Whether the position is still open. A caller holding a stale handle to a
    /// removed row must treat the position as gone.
    pub async fn is_live_position(&self, position_id: PositionId) -> bool {
        self.positions.read().await.contains_key(&position_id)
    }

    /// Inserts a new position row and returns its entry, already locked.
    ///
    /// The caller must hold the owning account's lock, which serialises
    /// creation and removal of that account's positions.
    pub async fn insert_position(&self, position: Position) -> (PositionEntry, RowGuard<Position>) {
        let key = PositionKey::new(position.account_id, &position.symbol, position.side);
        let position_id = position.position_id;
        let row = Arc::new(Mutex::new(position));
        // Locked before publication, so the wait is immediate.
        let guard = Arc::clone(&row).lock_owned().await;
        let entry = PositionEntry {
            position_id,
            key: key.clone(),
            row,
        };
        self.positions.write().await.insert(position_id, entry.clone());
        self.position_index.write().await.insert(key, position_id);
        (entry, guard)
    }

    /// Removes a position row. Caller holds the owning account's lock.
    pub async fn remove_position(&self, entry: &PositionEntry) {
        self.positions.write().await.remove(&entry.position_id);
        let mut index = self.position_index.write().await;
        if index.get(&entry.key) == Some(&entry.position_id) {
            index.remove(&entry.key);
        }
    }

    pub async fn positions_for_account(&self, account_id: AccountId) -> Vec<PositionEntry> {
        self.positions
            .read()
            .await
            .values()
            .filter(|entry| entry.key.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn positions_for_symbol(&self, symbol: &str) -> Vec<PositionEntry> {
        self.positions
            .read()
            .await
            .values()
            .filter(|entry| entry.key.symbol == symbol)
            .cloned()
            .collect()
    }

    pub async fn all_positions(&self) -> Vec<PositionEntry> {
        self.positions.read().await.values().cloned().collect()
    }

    // ==================== Append-only logs ====================

    pub async fn append_history(&self, record: PositionHistory) {
        self.history.write().await.push(record);
    }

    pub async fn history_for(&self, account_id: AccountId) -> Vec<PositionHistory> {
        self.history
            .read()
            .await
            .iter()
            .filter(|h| h.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn append_transaction(&self, transaction: Transaction) {
        self.transactions.write().await.push(transaction);
    }

    pub async fn transactions_for(&self, account_id: AccountId) -> Vec<Transaction> {
        self.transactions
            .read()
            .await
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }
}
