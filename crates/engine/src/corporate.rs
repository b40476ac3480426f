use crate::TradingCore;
use crate::amounts::{add, div, mul};
use crate::positions::revalue;
use chrono::{NaiveDate, Utc};
use core_types::{CorporateActionType, PositionId, PositionSide, Transaction, TransactionType};
use events::{LedgerEvent, LedgerEventKind};
use ledger::{LedgerError, PositionEntry};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Result of applying one corporate action.
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateActionOutcome {
    pub action_id: Uuid,
    /// Positions adjusted or paid.
    pub affected: usize,
    /// Positions that could not be processed, with the reason.
    pub failed: Vec<(PositionId, LedgerError)>,
}

#[derive(Serialize)]
struct ActionSummary<'a> {
    symbol: &'a str,
    action: CorporateActionType,
    ratio: Decimal,
    effective_date: NaiveDate,
    affected: usize,
    failed: usize,
}

impl TradingCore {
    /// Applies a split, reverse split or cash dividend to every open position
    /// in `symbol`.
    ///
    /// Splits scale quantity by `ratio` and divide the entry price by it. A
    /// split takes a ratio of at least one and a reverse split a ratio of at
    /// most one, e.g. `0.1` for one new share per ten. Dividends pay
    /// `quantity * ratio` to each long position's account. Each position is
    /// processed on its own; failures are reported in the outcome.
    pub async fn process_corporate_action(
        &self,
        symbol: &str,
        action: CorporateActionType,
        ratio: Decimal,
        effective_date: NaiveDate,
    ) -> Result<CorporateActionOutcome, LedgerError> {
        if ratio <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "corporate action ratio must be positive, got {ratio}"
            )));
        }
        match action {
            CorporateActionType::Split if ratio < Decimal::ONE => {
                return Err(LedgerError::InvalidInput(format!(
                    "split ratio must be at least 1, got {ratio}; use a reverse split"
                )));
            }
            CorporateActionType::ReverseSplit if ratio > Decimal::ONE => {
                return Err(LedgerError::InvalidInput(format!(
                    "reverse split ratio must be at most 1, got {ratio}; use a split"
                )));
            }
            _ => {}
        }

        let mut outcome = CorporateActionOutcome {
            action_id: Uuid::new_v4(),
            affected: 0,
            failed: Vec::new(),
        };

        for entry in self.store.positions_for_symbol(symbol).await {
            let applied = match action {
                CorporateActionType::Split | CorporateActionType::ReverseSplit => {
                    self.rescale_position(&entry, ratio).await
                }
                CorporateActionType::Dividend => self.pay_dividend(&entry, ratio, effective_date).await,
            };
            match applied {
                Ok(true) => outcome.affected += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(position_id = %entry.position_id, %symbol, error = %err, "corporate action failed for position");
                    outcome.failed.push((entry.position_id, err));
                }
            }
        }

        tracing::info!(
            action_id = %outcome.action_id,
            %symbol,
            ?action,
            %ratio,
            %effective_date,
            affected = outcome.affected,
            failed = outcome.failed.len(),
            "corporate action applied"
        );
        let summary = ActionSummary {
            symbol,
            action,
            ratio,
            effective_date,
            affected: outcome.affected,
            failed: outcome.failed.len(),
        };
        self.publish(LedgerEvent::created(
            LedgerEventKind::CorporateActionApplied,
            outcome.action_id,
            &summary,
        ));
        Ok(outcome)
    }

    /// Value-preserving split. Returns false for a position closed meanwhile.
    async fn rescale_position(&self, entry: &PositionEntry, ratio: Decimal) -> Result<bool, LedgerError> {
        let mut position = self.store.lock(&entry.row, "position", entry.position_id).await?;
        if position.quantity.is_zero() {
            return Ok(false);
        }

        let mut next = position.clone();
        next.quantity = mul("split quantity", position.quantity, ratio)?;
        next.average_entry_price = div("split entry price", position.average_entry_price, ratio)?;
        if let Some(mark) = position.current_price {
            revalue(&mut next, div("split mark", mark, ratio)?)?;
        }
        next.updated_at = Utc::now();
        *position = next;
        Ok(true)
    }

    /// Credits a long position's dividend to its account. Shorts are skipped.
    async fn pay_dividend(
        &self,
        entry: &PositionEntry,
        per_unit: Decimal,
        effective_date: NaiveDate,
    ) -> Result<bool, LedgerError> {
        if entry.key.side != PositionSide::Long {
            return Ok(false);
        }
        let mut account = self.store.lock_account(entry.key.account_id).await?;
        let position = self.store.lock(&entry.row, "position", entry.position_id).await?;
        if position.quantity.is_zero() {
            return Ok(false);
        }

        let amount = mul("dividend", position.quantity, per_unit)?;
        let new_balance = add("account balance", account.balance, amount)?;
        let new_available = add("available balance", account.available_balance, amount)?;

        account.balance = new_balance;
        account.available_balance = new_available;
        account.updated_at = Utc::now();

        self.store
            .append_transaction(Transaction::new(
                account.account_id,
                TransactionType::Dividend,
                amount,
                account.balance,
                Some(entry.position_id),
                format!("dividend {} x {} {} ({})", position.quantity, per_unit, position.symbol, effective_date),
            ))
            .await;
        tracing::debug!(position_id = %entry.position_id, %amount, "dividend paid");
        Ok(true)
    }
}
