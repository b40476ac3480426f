use crate::messages::LedgerEvent;
use std::sync::Mutex;

/// Receives audit events after an operation has committed.
///
/// Implementations must not block the caller for long and must never fail the
/// operation that produced the event.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: LedgerEvent);
}

/// Writes each event to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: LedgerEvent) {
        tracing::info!(
            target: "audit",
            event_id = %event.event_id,
            kind = %event.kind,
            entity_id = %event.entity_id,
            after = ?event.after,
            "ledger event"
        );
    }
}

/// Keeps events in memory. Used by tests and the replay tool.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every event recorded so far, in arrival order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: LedgerEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::LedgerEventKind;
    use uuid::Uuid;

    #[test]
    fn memory_sink_preserves_order() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for id in [first, second] {
            let event = LedgerEvent::created(LedgerEventKind::OrderPlaced, id, &id.to_string()).unwrap();
            sink.record(event);
        }
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entity_id, first);
        assert_eq!(events[1].entity_id, second);
    }
}
