//! Console tables printed at the end of a replay.

use analytics::{AnalyticsEngine, PerformanceReport};
use comfy_table::{Table, presets::UTF8_FULL};
use core_types::{Transaction, TransactionType};
use engine::TradingCore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

fn alias_of(aliases: &HashMap<Uuid, String>, id: Uuid) -> String {
    aliases.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn optional(value: Option<Decimal>) -> String {
    value.map(|v| v.round_dp(2).to_string()).unwrap_or_else(|| "-".to_string())
}

/// Balance after each cash movement, oldest first. Provisional fill entries
/// are skipped since they never moved cash.
fn equity_curve(transactions: &[Transaction]) -> Vec<(chrono::DateTime<chrono::Utc>, Decimal)> {
    transactions
        .iter()
        .filter(|t| t.transaction_type != TransactionType::Trade)
        .map(|t| (t.created_at, t.balance_after))
        .collect()
}

async fn performance(core: &TradingCore, account_id: Uuid) -> anyhow::Result<PerformanceReport> {
    let history = core.position_history(account_id).await?;
    let transactions = core.transactions(account_id).await?;
    let deposited: Decimal = transactions
        .iter()
        .filter(|t| t.transaction_type == TransactionType::Deposit)
        .map(|t| t.amount)
        .sum();
    let report = AnalyticsEngine::new().calculate(&history, &equity_curve(&transactions), deposited)?;
    Ok(report)
}

/// Prints accounts, open positions, reconciliation and performance.
pub async fn print_books(core: &TradingCore, accounts: &HashMap<String, Uuid>) -> anyhow::Result<()> {
    let aliases: HashMap<Uuid, String> = accounts.iter().map(|(alias, id)| (*id, alias.clone())).collect();
    let all_accounts = core.accounts().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Account", "Type", "Balance", "Available", "Margin Used", "Active",
    ]);
    for account in &all_accounts {
        table.add_row(vec![
            alias_of(&aliases, account.account_id),
            account.account_type.to_string(),
            account.balance.round_dp(2).to_string(),
            account.available_balance.round_dp(2).to_string(),
            account.margin_used.round_dp(2).to_string(),
            account.is_active.to_string(),
        ]);
    }
    println!("Accounts\n{table}");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Account", "Symbol", "Side", "Quantity", "Avg Entry", "Mark", "Unrealized", "Total P&L",
    ]);
    for account in &all_accounts {
        for position in core.positions(account.account_id).await? {
            table.add_row(vec![
                alias_of(&aliases, account.account_id),
                position.symbol.clone(),
                position.side.to_string(),
                position.quantity.to_string(),
                position.average_entry_price.round_dp(4).to_string(),
                optional(position.current_price),
                position.unrealized_pnl.round_dp(2).to_string(),
                position.total_pnl().round_dp(2).to_string(),
            ]);
        }
    }
    println!("Open positions\n{table}");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Account", "Expected", "Actual", "Difference", "Balanced", "Margin Required", "Margin Call",
    ]);
    for account in &all_accounts {
        let reconciliation = core.reconcile_account(account.account_id).await?;
        let margin = core.calculate_margin_requirements(account.account_id).await?;
        table.add_row(vec![
            alias_of(&aliases, account.account_id),
            reconciliation.expected_balance.round_dp(2).to_string(),
            reconciliation.actual_balance.round_dp(2).to_string(),
            reconciliation.difference.round_dp(4).to_string(),
            reconciliation.is_balanced.to_string(),
            margin.required.round_dp(2).to_string(),
            margin.is_margin_call.to_string(),
        ]);
    }
    println!("Reconciliation\n{table}");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Account", "Closed", "Net Profit", "Win Rate %", "Max Drawdown %", "Sharpe",
    ]);
    for account in &all_accounts {
        let report = performance(core, account.account_id).await?;
        table.add_row(vec![
            alias_of(&aliases, account.account_id),
            report.closed_positions.to_string(),
            report.total_net_profit.round_dp(2).to_string(),
            optional(report.win_rate_pct),
            report.max_drawdown_pct.round_dp(2).to_string(),
            optional(report.sharpe_ratio),
        ]);
    }
    println!("Performance\n{table}");

    Ok(())
}
