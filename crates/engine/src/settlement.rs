use crate::TradingCore;
use crate::amounts::add;
use chrono::{NaiveDate, Utc};
use core_types::{AccountId, AccountType, SettlementStatus, TradeId, Transaction, TransactionType};
use events::{LedgerEvent, LedgerEventKind};
use futures::future::join_all;
use ledger::LedgerError;
use risk::MarginRequirements;
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of an end-of-day settlement run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettlement {
    pub date: NaiveDate,
    pub settled: usize,
    pub failed: usize,
    /// Σ value of the trades settled in this run.
    pub total_value: Decimal,
    /// Every trade that could not be settled, with the reason.
    pub failures: Vec<(TradeId, LedgerError)>,
}

/// Stored balance compared with the balance derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub account_id: AccountId,
    pub expected_balance: Decimal,
    pub actual_balance: Decimal,
    /// `actual - expected`.
    pub difference: Decimal,
    pub is_balanced: bool,
}

impl TradingCore {
    /// Moves the cash of one executed trade, exactly once.
    ///
    /// A buy debits value plus commission from the balance and releases the
    /// hold kept for it since the fill; a sell credits value minus commission.
    /// A buy a cash account cannot pay for marks the trade `failed`; it may be
    /// settled again once the account is funded.
    pub async fn settle_trade(&self, trade_id: TradeId) -> Result<(), LedgerError> {
        let account_id = self.store.trade_account(trade_id).await?;
        let mut account = self.store.lock_account(account_id).await?;
        let mut trade = self.store.lock_trade(trade_id).await?;

        if trade.settlement_status == SettlementStatus::Settled {
            return Err(LedgerError::AlreadySettled(trade_id));
        }

        let before = trade.clone();
        let amount = trade.cash_effect();
        let new_balance = add("account balance", account.balance, amount)?;
        let new_available = add(
            "available balance",
            account.available_balance,
            add("settlement amount", amount, trade.held_margin)?,
        )?;

        if account.account_type == AccountType::Cash && new_balance.is_sign_negative() {
            trade.settlement_status = SettlementStatus::Failed;
            tracing::warn!(%trade_id, %account_id, %amount, balance = %account.balance, "settlement failed");
            self.publish(LedgerEvent::transition(LedgerEventKind::SettlementFailed, trade_id, &before, &*trade));
            return Err(LedgerError::InsufficientBalance {
                required: -amount,
                available: account.balance,
            });
        }

        let now = Utc::now();
        account.balance = new_balance;
        account.available_balance = new_available;
        account.margin_used = (account.margin_used - trade.held_margin).max(Decimal::ZERO);
        account.updated_at = now;

        trade.settlement_status = SettlementStatus::Settled;
        trade.settled_at = Some(now);

        self.store
            .append_transaction(Transaction::new(
                account_id,
                TransactionType::Settlement,
                amount,
                account.balance,
                Some(trade_id),
                format!("settle {:?} {} {}", trade.side, trade.quantity, trade.symbol),
            ))
            .await;

        tracing::info!(%trade_id, %account_id, %amount, balance = %account.balance, "trade settled");
        self.publish(LedgerEvent::transition(LedgerEventKind::TradeSettled, trade_id, &before, &*trade));
        Ok(())
    }

    /// Settles every pending trade executed on `date` (UTC). Trades are
    /// settled concurrently and independently; failures are tallied in the
    /// result, never propagated.
    pub async fn batch_settle_trades(&self, date: NaiveDate) -> BatchSettlement {
        let mut pending = Vec::new();
        for trade_id in self.store.trade_ids_on(date).await {
            match self.store.trade(trade_id).await {
                Ok(trade) if trade.settlement_status == SettlementStatus::Pending => {
                    pending.push((trade_id, trade.value));
                }
                Ok(_) => {}
                Err(err) => tracing::error!(%trade_id, error = %err, "could not read trade for settlement"),
            }
        }

        let results = join_all(pending.into_iter().map(|(trade_id, value)| async move {
            (trade_id, value, self.settle_trade(trade_id).await)
        }))
        .await;

        let mut batch = BatchSettlement {
            date,
            settled: 0,
            failed: 0,
            total_value: Decimal::ZERO,
            failures: Vec::new(),
        };
        for (trade_id, value, result) in results {
            match result {
                Ok(()) => {
                    batch.settled += 1;
                    batch.total_value += value;
                }
                // Settled by a concurrent caller after it was listed.
                Err(LedgerError::AlreadySettled(_)) => {}
                Err(err) => {
                    tracing::error!(%trade_id, error = %err, "trade settlement failed");
                    batch.failed += 1;
                    batch.failures.push((trade_id, err));
                }
            }
        }

        tracing::info!(
            %date,
            settled = batch.settled,
            failed = batch.failed,
            total_value = %batch.total_value,
            "batch settlement finished"
        );
        batch
    }

    /// Recomputes the balance from the ledger and compares it with the stored
    /// one.
    ///
    /// Expected = deposits − withdrawals + settlements + dividends − fees +
    /// realized P&L from position history. Provisional `trade` entries and
    /// the `realized_pnl` entries mirroring the history are not counted.
    pub async fn reconcile_account(&self, account_id: AccountId) -> Result<Reconciliation, LedgerError> {
        let account = self.store.account(account_id).await?;
        let transactions = self.store.transactions_for(account_id).await;
        let history = self.store.history_for(account_id).await;

        let cash_flows: Decimal = transactions
            .iter()
            .filter(|t| {
                matches!(
                    t.transaction_type,
                    TransactionType::Deposit
                        | TransactionType::Withdrawal
                        | TransactionType::Settlement
                        | TransactionType::Dividend
                        | TransactionType::Fee
                )
            })
            .map(|t| t.amount)
            .sum();
        let realized: Decimal = history.iter().map(|h| h.realized_pnl).sum();

        let expected_balance = cash_flows + realized;
        let difference = account.balance - expected_balance;
        let reconciliation = Reconciliation {
            account_id,
            expected_balance,
            actual_balance: account.balance,
            difference,
            is_balanced: difference.abs() < self.reconciliation_tolerance,
        };

        if reconciliation.is_balanced {
            tracing::debug!(%account_id, balance = %account.balance, "account reconciled");
        } else {
            tracing::warn!(
                %account_id,
                expected = %expected_balance,
                actual = %account.balance,
                %difference,
                "account out of balance"
            );
        }
        Ok(reconciliation)
    }

    /// Margin held against the account's open positions, valued at their
    /// last mark.
    pub async fn calculate_margin_requirements(&self, account_id: AccountId) -> Result<MarginRequirements, LedgerError> {
        let account = self.store.account(account_id).await?;
        let positions = self.positions(account_id).await?;

        let priced: Vec<_> = positions
            .into_iter()
            .map(|position| {
                let ratio = match self.catalog.instrument(&position.symbol) {
                    Some(instrument) => instrument.margin_requirement,
                    None => {
                        tracing::warn!(symbol = %position.symbol, "instrument not listed, assuming full margin");
                        Decimal::ONE
                    }
                };
                (position, ratio)
            })
            .collect();

        Ok(self.margin.margin_requirements(&account, &priced))
    }
}
