use crate::error::AnalyticsError;
use crate::metrics::{max_drawdown, periodic_returns, sharpe_ratio, win_rate_pct};
use crate::report::PerformanceReport;
use chrono::{DateTime, Utc};
use std::time::Duration;
use core_types::PositionHistory;
use rust_decimal::Decimal;

/// A stateless calculator for deriving performance metrics from closed positions.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `history` - Closed positions of one account, in any order.
    /// * `equity_curve` - A time-series of the account's balance.
    /// * `initial_capital` - Capital the account started from.
    pub fn calculate(
        &self,
        history: &[PositionHistory],
        equity_curve: &[(DateTime<Utc>, Decimal)],
        initial_capital: Decimal,
    ) -> Result<PerformanceReport, AnalyticsError> {
        let mut report = PerformanceReport::new();

        if history.is_empty() {
            // Nothing closed yet: every metric stays at its zero value.
            return Ok(report);
        }

        self.calculate_profitability(history, initial_capital, &mut report);
        self.calculate_risk(equity_curve, &mut report)?;
        self.calculate_time_metrics(history, &mut report);

        tracing::debug!(
            closed = report.closed_positions,
            net = %report.total_net_profit,
            "performance report calculated"
        );
        Ok(report)
    }

    /// Calculates all profitability-related metrics.
    fn calculate_profitability(
        &self,
        history: &[PositionHistory],
        initial_capital: Decimal,
        report: &mut PerformanceReport,
    ) {
        report.closed_positions = history.len();

        let pnls: Vec<Decimal> = history.iter().map(|h| h.realized_pnl).collect();

        for &pnl in &pnls {
            report.total_net_profit += pnl;

            if pnl > Decimal::ZERO {
                report.gross_profit += pnl;
                report.winning_positions += 1;
            } else if pnl < Decimal::ZERO {
                report.gross_loss += pnl.abs();
                report.losing_positions += 1;
            }
        }

        // --- Ratios ---
        if report.gross_loss > Decimal::ZERO {
            report.profit_factor = Some(report.gross_profit / report.gross_loss);
        }

        report.win_rate_pct = win_rate_pct(&pnls);

        if report.winning_positions > 0 {
            report.average_win = report.gross_profit / Decimal::from(report.winning_positions);
        }

        if report.losing_positions > 0 {
            report.average_loss = report.gross_loss / Decimal::from(report.losing_positions);
            report.payoff_ratio = Some(report.average_win / report.average_loss);
        }

        if initial_capital > Decimal::ZERO {
            report.total_return_pct = report.total_net_profit / initial_capital * Decimal::ONE_HUNDRED;
        }
    }

    /// Drawdown, Calmar and Sharpe from the equity curve.
    fn calculate_risk(
        &self,
        equity_curve: &[(DateTime<Utc>, Decimal)],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let equity: Vec<Decimal> = equity_curve.iter().map(|(_, value)| *value).collect();

        let drawdown = max_drawdown(&equity);
        report.max_drawdown = drawdown.amount;
        report.max_drawdown_pct = drawdown.pct;

        if report.max_drawdown_pct > Decimal::ZERO {
            report.calmar_ratio = Some(report.total_return_pct / report.max_drawdown_pct);
        }

        report.sharpe_ratio = sharpe_ratio(&periodic_returns(&equity))?;
        Ok(())
    }

    /// Calculates time-based metrics.
    fn calculate_time_metrics(&self, history: &[PositionHistory], report: &mut PerformanceReport) {
        let total_secs: i64 = history.iter().map(|h| h.holding_period_secs.max(0)).sum();
        let avg_secs = total_secs / history.len() as i64;
        report.average_holding_period = Duration::from_secs(avg_secs.unsigned_abs());
    }
}
