use crate::error::AnalyticsError;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Largest peak-to-trough decline of an equity series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drawdown {
    pub amount: Decimal,
    /// Relative to the peak it was measured from, in percent.
    pub pct: Decimal,
}

/// Simple periodic returns between consecutive points. Periods starting from a
/// non-positive value are skipped since their return is undefined.
pub fn periodic_returns(equity: &[Decimal]) -> Vec<Decimal> {
    equity
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Non-annualised Sharpe ratio of a return series, risk-free rate 0.
///
/// `None` when there are fewer than two returns or the returns do not vary.
pub fn sharpe_ratio(returns: &[Decimal]) -> Result<Option<Decimal>, AnalyticsError> {
    if returns.len() < 2 {
        return Ok(None);
    }

    let count = Decimal::from(returns.len());
    let mean_return = returns.iter().sum::<Decimal>() / count;

    let variance: Decimal = returns
        .iter()
        .map(|r| (*r - mean_return) * (*r - mean_return))
        .sum::<Decimal>()
        / count;

    if variance <= Decimal::ZERO {
        return Ok(None);
    }

    let std_dev = variance.sqrt().ok_or_else(|| {
        AnalyticsError::InternalError("Failed to calculate square root for variance".to_string())
    })?;

    if std_dev.is_zero() {
        return Ok(None);
    }
    Ok(Some(mean_return / std_dev))
}

/// Maximum drawdown of an equity series.
pub fn max_drawdown(equity: &[Decimal]) -> Drawdown {
    let Some(&first) = equity.first() else {
        return Drawdown::default();
    };

    let mut peak = first;
    let mut worst = Drawdown::default();

    for &value in equity {
        if value > peak {
            peak = value;
        }
        let amount = peak - value;
        if amount > worst.amount {
            let pct = if peak > Decimal::ZERO {
                amount / peak * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };
            worst = Drawdown { amount, pct };
        }
    }
    worst
}

/// Share of strictly profitable outcomes, in percent. `None` for no outcomes.
pub fn win_rate_pct(pnls: &[Decimal]) -> Option<Decimal> {
    if pnls.is_empty() {
        return None;
    }
    let winners = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
    Some(Decimal::from(winners) / Decimal::from(pnls.len()) * Decimal::ONE_HUNDRED)
}
