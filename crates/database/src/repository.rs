use crate::DbError;
use events::LedgerEvent;
use sqlx::postgres::PgPool;

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one audit event. Replaying the same event is a no-op.
    pub async fn save_audit_event(&self, event: &LedgerEvent) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (event_id, occurred_at, kind, entity_id, before, after)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id)
        .bind(event.occurred_at)
        .bind(event.kind.to_string())
        .bind(event.entity_id)
        .bind(&event.before)
        .bind(&event.after)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_audit_events(&self) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
