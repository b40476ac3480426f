use crate::TradingCore;
use crate::amounts::{add, div, mul};
use analytics::checked_unrealized_pnl;
use chrono::Utc;
use core_types::{
    AccountId, AccountType, OrderSide, Position, PositionHistory, PositionId, PositionSide, Transaction,
    TransactionType,
};
use events::{LedgerEvent, LedgerEventKind};
use ledger::{LedgerError, PositionKey, RowGuard};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Signed P&L of `position` valued at `price`.
fn pnl_at(position: &Position, price: Decimal) -> Result<Decimal, LedgerError> {
    checked_unrealized_pnl(position.average_entry_price, price, position.quantity, position.side).ok_or(
        LedgerError::Overflow {
            operation: "position P&L",
            lhs: position.quantity,
            rhs: price,
        },
    )
}

/// The position after adding a same-direction fill at the weighted average
/// entry price. Exact decimal arithmetic, no rounding between fills.
pub(crate) fn accumulate(position: &Position, quantity: Decimal, price: Decimal) -> Result<Position, LedgerError> {
    let new_quantity = add("position quantity", position.quantity, quantity)?;
    let cost = add(
        "position cost",
        mul("position cost", position.average_entry_price, position.quantity)?,
        mul("fill value", price, quantity)?,
    )?;

    let mut next = position.clone();
    next.average_entry_price = div("average entry price", cost, new_quantity)?;
    next.quantity = new_quantity;
    if let Some(mark) = next.current_price {
        revalue(&mut next, mark)?;
    }
    next.updated_at = Utc::now();
    Ok(next)
}

/// Re-marks a position at `price`. Leaves it untouched on overflow.
pub(crate) fn revalue(position: &mut Position, price: Decimal) -> Result<(), LedgerError> {
    position.unrealized_pnl = pnl_at(position, price)?;
    position.current_price = Some(price);
    Ok(())
}

/// The position a fill leads to: the existing one accumulated, or a new one.
pub(crate) fn filled_position(
    existing: Option<&Position>,
    key: &PositionKey,
    quantity: Decimal,
    price: Decimal,
) -> Result<Position, LedgerError> {
    match existing {
        Some(position) => accumulate(position, quantity, price),
        None => Ok(Position::open(key.account_id, &key.symbol, key.side, quantity, price)),
    }
}

#[derive(Serialize)]
struct MarkSummary {
    account_id: Option<AccountId>,
    marked: usize,
}

impl TradingCore {
    /// Locks the open position for `key`, if there is one. The caller must
    /// already hold the owning account's lock.
    pub(crate) async fn lock_open_position(
        &self,
        key: &PositionKey,
    ) -> Result<Option<RowGuard<Position>>, LedgerError> {
        match self.store.find_position(key).await {
            Some(entry) => Ok(Some(self.store.lock(&entry.row, "position", entry.position_id).await?)),
            None => Ok(None),
        }
    }

    /// Writes `next` (from `filled_position`) over the locked row, or inserts
    /// it as a new position. Infallible, so it may run after every check of
    /// the enclosing operation has passed.
    pub(crate) async fn post_fill(&self, existing: Option<RowGuard<Position>>, next: Position) -> Position {
        match existing {
            Some(mut position) => {
                *position = next.clone();
                next
            }
            None => {
                let (_, guard) = self.store.insert_position(next).await;
                guard.clone()
            }
        }
    }

    /// Adds a fill to the (account, instrument, side) aggregate, where a buy
    /// adds to the long side and a sell to the short side. Long and short
    /// exposure in the same instrument are kept apart, never netted.
    pub async fn apply_fill(
        &self,
        account_id: AccountId,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<PositionId, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                quantity,
                reason: "fill quantity must be positive".to_string(),
            });
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice {
                price: Some(price),
                reason: "fill price must be positive".to_string(),
            });
        }

        // Serialises creation of this account's positions.
        let _account = self.store.lock_account(account_id).await?;
        let key = PositionKey::new(account_id, symbol, PositionSide::from(side));
        let existing = self.lock_open_position(&key).await?;
        let before = existing.as_deref().cloned();
        let next = filled_position(before.as_ref(), &key, quantity, price)?;
        let position = self.post_fill(existing, next).await;

        tracing::debug!(
            position_id = %position.position_id,
            %symbol,
            side = %position.side,
            quantity = %position.quantity,
            average_entry_price = %position.average_entry_price,
            "position adjusted"
        );
        self.publish(LedgerEvent::new(
            LedgerEventKind::PositionAdjusted,
            position.position_id,
            before.as_ref(),
            Some(&position),
        ));
        Ok(position.position_id)
    }

    /// Closes the whole position at `exit_price`, credits the realized P&L to
    /// the account and archives the position to its history.
    pub async fn close_position(&self, position_id: PositionId, exit_price: Decimal) -> Result<Decimal, LedgerError> {
        if exit_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice {
                price: Some(exit_price),
                reason: "exit price must be positive".to_string(),
            });
        }

        let entry = self.store.position_entry(position_id).await?;
        let mut account = self.store.lock_account(entry.key.account_id).await?;
        // Closed by someone else while we waited for the account.
        if !self.store.is_live_position(position_id).await {
            return Err(LedgerError::PositionNotFound(position_id));
        }
        let mut position = self.store.lock(&entry.row, "position", position_id).await?;

        let realized = pnl_at(&position, exit_price)?;
        let new_balance = add("account balance", account.balance, realized)?;
        let new_available = add("available balance", account.available_balance, realized)?;
        if account.account_type == AccountType::Cash && new_balance.is_sign_negative() {
            tracing::warn!(%position_id, %realized, balance = %account.balance, "close rejected");
            return Err(LedgerError::InsufficientBalance {
                required: -realized,
                available: account.balance,
            });
        }

        // --- Commit ---
        let now = Utc::now();
        let before = position.clone();
        let record = PositionHistory {
            history_id: Uuid::new_v4(),
            position_id,
            account_id: position.account_id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity: position.quantity,
            entry_price: position.average_entry_price,
            exit_price,
            realized_pnl: realized,
            opened_at: position.opened_at,
            closed_at: now,
            holding_period_secs: (now - position.opened_at).num_seconds(),
        };

        account.balance = new_balance;
        account.available_balance = new_available;
        account.updated_at = now;

        position.realized_pnl += realized;
        position.unrealized_pnl = Decimal::ZERO;
        position.quantity = Decimal::ZERO;
        position.updated_at = now;

        self.store.remove_position(&entry).await;
        self.store.append_history(record.clone()).await;
        self.store
            .append_transaction(Transaction::new(
                account.account_id,
                TransactionType::RealizedPnl,
                realized,
                account.balance,
                Some(position_id),
                format!("close {} {} {} @ {}", before.side, before.quantity, before.symbol, exit_price),
            ))
            .await;

        tracing::info!(%position_id, symbol = %record.symbol, %exit_price, %realized, "position closed");
        self.publish(LedgerEvent::new(
            LedgerEventKind::PositionClosed,
            position_id,
            Some(&before),
            Some(&record),
        ));
        Ok(realized)
    }

    /// Re-marks every open position (or one account's) that has a known last
    /// price. Positions without a price are left as they are. Returns the
    /// number of positions marked.
    pub async fn mark_to_market(&self, account_id: Option<AccountId>) -> Result<usize, LedgerError> {
        let entries = match account_id {
            Some(id) => {
                self.store.account(id).await?;
                self.store.positions_for_account(id).await
            }
            None => self.store.all_positions().await,
        };

        let mut marked = 0;
        for entry in entries {
            let Some(price) = self.prices.last_price(&entry.key.symbol) else {
                continue;
            };
            let mut position = self.store.lock(&entry.row, "position", entry.position_id).await?;
            if position.quantity.is_zero() {
                continue;
            }
            if let Err(err) = revalue(&mut position, price) {
                tracing::warn!(position_id = %entry.position_id, %price, error = %err, "mark skipped");
                continue;
            }
            position.updated_at = Utc::now();
            marked += 1;
        }

        tracing::debug!(account_id = ?account_id, marked, "positions marked to market");
        if marked > 0 {
            let summary = MarkSummary { account_id, marked };
            self.publish(LedgerEvent::created(
                LedgerEventKind::PositionsMarked,
                account_id.unwrap_or_else(Uuid::nil),
                &summary,
            ));
        }
        Ok(marked)
    }

    pub async fn position(&self, position_id: PositionId) -> Result<Position, LedgerError> {
        let entry = self.store.position_entry(position_id).await?;
        let position = self.store.lock(&entry.row, "position", position_id).await?;
        if position.quantity.is_zero() {
            return Err(LedgerError::PositionNotFound(position_id));
        }
        Ok(position.clone())
    }

    /// Open positions of an account, oldest first.
    pub async fn positions(&self, account_id: AccountId) -> Result<Vec<Position>, LedgerError> {
        self.store.account(account_id).await?;
        let mut positions = Vec::new();
        for entry in self.store.positions_for_account(account_id).await {
            let position = self.store.lock(&entry.row, "position", entry.position_id).await?;
            if !position.quantity.is_zero() {
                positions.push(position.clone());
            }
        }
        positions.sort_by_key(|p| p.opened_at);
        Ok(positions)
    }

    /// Closed positions of an account, in closing order.
    pub async fn position_history(&self, account_id: AccountId) -> Result<Vec<PositionHistory>, LedgerError> {
        self.store.account(account_id).await?;
        Ok(self.store.history_for(account_id).await)
    }
}
