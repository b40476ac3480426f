use crate::TradingCore;
use crate::amounts::add;
use chrono::Utc;
use core_types::{Account, AccountId, AccountType, Transaction, TransactionId, TransactionType};
use events::{LedgerEvent, LedgerEventKind};
use ledger::LedgerError;
use rust_decimal::Decimal;

fn positive_amount(amount: Decimal, what: &str) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidInput(format!("{what} amount must be positive, got {amount}")));
    }
    Ok(())
}

impl TradingCore {
    /// Opens an empty account. Leverage only applies to margin accounts; any
    /// other type is opened at 1.
    pub async fn open_account(
        &self,
        owner: &str,
        account_type: AccountType,
        currency: &str,
        leverage: Decimal,
    ) -> Result<AccountId, LedgerError> {
        if owner.trim().is_empty() {
            return Err(LedgerError::InvalidInput("account owner must not be empty".to_string()));
        }
        if leverage < Decimal::ONE {
            return Err(LedgerError::InvalidInput(format!("leverage must be at least 1, got {leverage}")));
        }

        let account = Account::new(owner, account_type, currency, leverage);
        account.check_invariants()?;
        let account_id = account.account_id;
        self.store.insert_account(account.clone()).await;

        tracing::info!(%account_id, %owner, %account_type, "account opened");
        self.publish(LedgerEvent::created(LedgerEventKind::AccountOpened, account_id, &account));
        Ok(account_id)
    }

    /// Disables an account for new orders. Existing orders, trades and
    /// positions are untouched.
    pub async fn deactivate_account(&self, account_id: AccountId) -> Result<(), LedgerError> {
        let mut account = self.store.lock_account(account_id).await?;
        if !account.is_active {
            return Ok(());
        }
        let before = account.clone();
        account.is_active = false;
        account.updated_at = Utc::now();

        tracing::info!(%account_id, "account deactivated");
        self.publish(LedgerEvent::transition(
            LedgerEventKind::AccountDeactivated,
            account_id,
            &before,
            &*account,
        ));
        Ok(())
    }

    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<TransactionId, LedgerError> {
        positive_amount(amount, "deposit")?;
        let mut account = self.store.lock_account(account_id).await?;
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account_id));
        }

        let new_balance = add("account balance", account.balance, amount)?;
        let new_available = add("available balance", account.available_balance, amount)?;

        let before = account.clone();
        account.balance = new_balance;
        account.available_balance = new_available;
        account.updated_at = Utc::now();

        let transaction = Transaction::new(
            account_id,
            TransactionType::Deposit,
            amount,
            account.balance,
            None,
            "deposit",
        );
        let transaction_id = transaction.transaction_id;
        self.store.append_transaction(transaction).await;

        tracing::info!(%account_id, %amount, balance = %account.balance, "funds deposited");
        self.publish(LedgerEvent::transition(LedgerEventKind::FundsDeposited, account_id, &before, &*account));
        Ok(transaction_id)
    }

    /// Withdraws from the free balance. Cash held against open orders cannot
    /// be withdrawn.
    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<TransactionId, LedgerError> {
        positive_amount(amount, "withdrawal")?;
        let mut account = self.store.lock_account(account_id).await?;
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account_id));
        }
        if account.available_balance < amount {
            tracing::warn!(%account_id, %amount, available = %account.available_balance, "withdrawal rejected");
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: account.available_balance,
            });
        }

        let before = account.clone();
        account.balance -= amount;
        account.available_balance -= amount;
        account.updated_at = Utc::now();

        let transaction = Transaction::new(
            account_id,
            TransactionType::Withdrawal,
            -amount,
            account.balance,
            None,
            "withdrawal",
        );
        let transaction_id = transaction.transaction_id;
        self.store.append_transaction(transaction).await;

        tracing::info!(%account_id, %amount, balance = %account.balance, "funds withdrawn");
        self.publish(LedgerEvent::transition(LedgerEventKind::FundsWithdrawn, account_id, &before, &*account));
        Ok(transaction_id)
    }

    /// Debits a fee outside of trade commission, e.g. a custody or data fee.
    pub async fn charge_fee(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransactionId, LedgerError> {
        positive_amount(amount, "fee")?;
        let mut account = self.store.lock_account(account_id).await?;
        if account.available_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: account.available_balance,
            });
        }

        let before = account.clone();
        account.balance -= amount;
        account.available_balance -= amount;
        account.updated_at = Utc::now();

        let transaction = Transaction::new(
            account_id,
            TransactionType::Fee,
            -amount,
            account.balance,
            None,
            description,
        );
        let transaction_id = transaction.transaction_id;
        self.store.append_transaction(transaction).await;

        tracing::info!(%account_id, %amount, %description, "fee charged");
        self.publish(LedgerEvent::transition(LedgerEventKind::FeeCharged, account_id, &before, &*account));
        Ok(transaction_id)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store.account(account_id).await
    }

    /// Every account, oldest first.
    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = Vec::new();
        for account_id in self.store.account_ids().await {
            accounts.push(self.store.account(account_id).await?);
        }
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    /// The account's ledger entries in the order they were written.
    pub async fn transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        // Surfaces AccountNotFound rather than an empty ledger.
        self.store.account(account_id).await?;
        Ok(self.store.transactions_for(account_id).await)
    }
}
