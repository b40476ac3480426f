use crate::error::RiskError;
use crate::MarginValidator;
use core_types::{Account, AccountType, Instrument, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Margin held against an account's open positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRequirements {
    /// Σ quantity × mark price × margin ratio over open positions.
    pub required: Decimal,
    /// Provisional holds of open orders.
    pub used: Decimal,
    pub available: Decimal,
    /// Balance as a percentage of `required`; `None` without open exposure.
    pub level: Option<Decimal>,
    pub is_margin_call: bool,
}

/// Margin = notional × instrument margin ratio, checked against the available
/// balance and, for margin accounts, against leveraged buying power.
#[derive(Debug, Clone, Default)]
pub struct SimpleMarginValidator;

impl SimpleMarginValidator {
    pub fn new() -> Self {
        Self
    }
}

impl MarginValidator for SimpleMarginValidator {
    fn reference_price(
        &self,
        symbol: &str,
        last_price: Option<Decimal>,
        submitted_price: Option<Decimal>,
    ) -> Result<Decimal, RiskError> {
        let price = last_price
            .or(submitted_price)
            .ok_or_else(|| RiskError::NoReferencePrice(symbol.to_string()))?;
        if price <= Decimal::ZERO {
            return Err(RiskError::InvalidReferencePrice(price));
        }
        Ok(price)
    }

    fn required_margin(
        &self,
        instrument: &Instrument,
        quantity: Decimal,
        reference_price: Decimal,
    ) -> Result<Decimal, RiskError> {
        quantity
            .checked_mul(reference_price)
            .and_then(|notional| notional.checked_mul(instrument.margin_requirement))
            .ok_or(RiskError::MarginOverflow {
                quantity,
                price: reference_price,
            })
    }

    fn check_order(&self, account: &Account, required: Decimal) -> Result<(), RiskError> {
        let mut available = account.available_balance;

        if account.account_type == AccountType::Margin {
            let headroom = account.buying_power() - account.margin_used;
            available = available.min(headroom);
        }

        if available < required {
            tracing::debug!(
                account_id = %account.account_id,
                %required,
                %available,
                "margin check failed"
            );
            return Err(RiskError::InsufficientBalance { required, available });
        }
        Ok(())
    }

    fn margin_requirements(&self, account: &Account, positions: &[(Position, Decimal)]) -> MarginRequirements {
        let required: Decimal = positions
            .iter()
            .map(|(position, ratio)| {
                // A position that has never been marked is valued at entry.
                let mark = position.current_price.unwrap_or(position.average_entry_price);
                position.quantity * mark * *ratio
            })
            .sum();

        let level = if required > Decimal::ZERO {
            Some(account.balance / required * Decimal::ONE_HUNDRED)
        } else {
            None
        };

        MarginRequirements {
            required,
            used: account.margin_used,
            available: account.available_balance,
            level,
            is_margin_call: account.balance < required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{InstrumentType, PositionSide};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn instrument(margin_requirement: Decimal) -> Instrument {
        Instrument {
            symbol: "ACME".to_string(),
            instrument_type: InstrumentType::Equity,
            is_tradeable: true,
            min_trade_size: dec!(1),
            max_trade_size: dec!(10000),
            tick_size: dec!(0.01),
            margin_requirement,
        }
    }

    fn funded(account_type: AccountType, leverage: Decimal, balance: Decimal) -> Account {
        let mut account = Account::new("alice", account_type, "USD", leverage);
        account.balance = balance;
        account.available_balance = balance;
        account
    }

    #[test]
    fn reference_price_prefers_last_trade() {
        let v = SimpleMarginValidator::new();
        assert_eq!(v.reference_price("ACME", Some(dec!(101)), Some(dec!(99))).unwrap(), dec!(101));
        assert_eq!(v.reference_price("ACME", None, Some(dec!(99))).unwrap(), dec!(99));
        assert_eq!(
            v.reference_price("ACME", None, None),
            Err(RiskError::NoReferencePrice("ACME".to_string()))
        );
    }

    #[test]
    fn required_margin_scales_with_ratio() {
        let v = SimpleMarginValidator::new();
        assert_eq!(v.required_margin(&instrument(dec!(1)), dec!(10), dec!(100)), Ok(dec!(1000)));
        assert_eq!(v.required_margin(&instrument(dec!(0.25)), dec!(10), dec!(100)), Ok(dec!(250)));
    }

    #[test]
    fn required_margin_overflow_is_an_error() {
        let v = SimpleMarginValidator::new();
        assert_eq!(
            v.required_margin(&instrument(dec!(1)), dec!(10000), Decimal::MAX),
            Err(RiskError::MarginOverflow { quantity: dec!(10000), price: Decimal::MAX })
        );
    }

    #[test]
    fn check_order_reports_shortfall() {
        let v = SimpleMarginValidator::new();
        let account = funded(AccountType::Cash, dec!(1), dec!(500));
        assert!(v.check_order(&account, dec!(500)).is_ok());
        assert_eq!(
            v.check_order(&account, dec!(500.01)),
            Err(RiskError::InsufficientBalance { required: dec!(500.01), available: dec!(500) })
        );
    }

    #[test]
    fn margin_accounts_are_capped_by_buying_power() {
        let v = SimpleMarginValidator::new();
        let mut account = funded(AccountType::Margin, dec!(2), dec!(1000));
        account.margin_used = dec!(1900);
        // available_balance says 1000, but only 100 of leveraged headroom remains
        assert_eq!(
            v.check_order(&account, dec!(150)),
            Err(RiskError::InsufficientBalance { required: dec!(150), available: dec!(100) })
        );
    }

    #[test]
    fn margin_summary_flags_margin_call() {
        let v = SimpleMarginValidator::new();
        let account = funded(AccountType::Margin, dec!(2), dec!(400));
        let mut position = Position::open(Uuid::new_v4(), "ACME", PositionSide::Long, dec!(10), dec!(100));
        position.current_price = Some(dec!(90));

        let summary = v.margin_requirements(&account, &[(position, dec!(0.5))]);
        assert_eq!(summary.required, dec!(450));
        assert!(summary.is_margin_call);
        assert_eq!(summary.level.unwrap().round_dp(2), dec!(88.89));

        let flat = v.margin_requirements(&account, &[]);
        assert_eq!(flat.required, Decimal::ZERO);
        assert_eq!(flat.level, None);
        assert!(!flat.is_margin_call);
    }
}
