use crate::repository::DbRepository;
use events::{AuditSink, LedgerEvent};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

/// Audit sink persisting events to the `audit_events` table.
///
/// `record` only enqueues; a background task performs the inserts in arrival
/// order. Insert failures are logged and the event is dropped.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    sender: UnboundedSender<LedgerEvent>,
}

impl PgAuditSink {
    /// Starts the writer task. It finishes once every clone of the sink has
    /// been dropped and the queue is drained, yielding the number of events
    /// written.
    pub fn spawn(repository: DbRepository) -> (Self, JoinHandle<usize>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<LedgerEvent>();

        let writer = tokio::spawn(async move {
            let mut written = 0;
            while let Some(event) = receiver.recv().await {
                match repository.save_audit_event(&event).await {
                    Ok(()) => written += 1,
                    Err(e) => tracing::error!(
                        event_id = %event.event_id,
                        kind = %event.kind,
                        error = %e,
                        "failed to persist audit event"
                    ),
                }
            }
            tracing::debug!(written, "audit writer stopped");
            written
        });

        (Self { sender }, writer)
    }
}

impl AuditSink for PgAuditSink {
    fn record(&self, event: LedgerEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(event_id = %e.0.event_id, "audit writer is gone, event dropped");
        }
    }
}
