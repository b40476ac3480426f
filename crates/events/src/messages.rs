use crate::error::EventsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// What happened. One variant per state-changing ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    AccountOpened,
    AccountDeactivated,
    FundsDeposited,
    FundsWithdrawn,
    FeeCharged,
    OrderPlaced,
    OrderCancelled,
    TradeExecuted,
    PositionAdjusted,
    PositionClosed,
    PositionsMarked,
    TradeSettled,
    SettlementFailed,
    CorporateActionApplied,
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the serde name so logs and the database agree.
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&name)
    }
}

/// An append-only audit record.
///
/// `before` is absent for creations and `after` is absent for deletions.
///
/// Serialized as a flat JSON object, e.g.
/// `{
///   "event_id": "...",
///   "kind": "order_placed",
///   "entity_id": "...",
///   "before": null,
///   "after": { "order_id": "...", ... }
/// }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: LedgerEventKind,
    pub entity_id: Uuid,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl LedgerEvent {
    /// Builds an event from typed snapshots of the entity.
    pub fn new<B, A>(
        kind: LedgerEventKind,
        entity_id: Uuid,
        before: Option<&B>,
        after: Option<&A>,
    ) -> Result<Self, EventsError>
    where
        B: Serialize,
        A: Serialize,
    {
        Ok(Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
            entity_id,
            before: before.map(serde_json::to_value).transpose()?,
            after: after.map(serde_json::to_value).transpose()?,
        })
    }

    /// An event whose only payload is the resulting state.
    pub fn created<A: Serialize>(
        kind: LedgerEventKind,
        entity_id: Uuid,
        after: &A,
    ) -> Result<Self, EventsError> {
        Self::new::<A, A>(kind, entity_id, None, Some(after))
    }

    /// An event describing a transition of one entity.
    pub fn transition<T: Serialize>(
        kind: LedgerEventKind,
        entity_id: Uuid,
        before: &T,
        after: &T,
    ) -> Result<Self, EventsError> {
        Self::new(kind, entity_id, Some(before), Some(after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Account, AccountType};
    use rust_decimal_macros::dec;

    #[test]
    fn transition_keeps_both_snapshots() {
        let before = Account::new("alice", AccountType::Cash, "USD", dec!(1));
        let mut after = before.clone();
        after.balance = dec!(1000);
        after.available_balance = dec!(1000);

        let event =
            LedgerEvent::transition(LedgerEventKind::FundsDeposited, before.account_id, &before, &after)
                .unwrap();

        assert_eq!(event.entity_id, before.account_id);
        assert_eq!(event.before.as_ref().unwrap()["balance"], "0");
        assert_eq!(event.after.as_ref().unwrap()["balance"], "1000");
    }

    #[test]
    fn created_event_has_no_before() {
        let account = Account::new("bob", AccountType::Margin, "USD", dec!(2));
        let event = LedgerEvent::created(LedgerEventKind::AccountOpened, account.account_id, &account).unwrap();
        assert!(event.before.is_none());
        assert!(event.after.is_some());
    }

    #[test]
    fn kind_displays_as_snake_case() {
        assert_eq!(LedgerEventKind::CorporateActionApplied.to_string(), "corporate_action_applied");
    }
}
