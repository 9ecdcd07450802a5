use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    error::Result,
    repository::{invalid_column, ledger, parse_uuid, to_utc, OutboxRepository},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TaskKind {
    CommissionAccrual,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::CommissionAccrual => "commission_accrual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "commission_accrual" => Some(TaskKind::CommissionAccrual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TaskStatus::Pending),
            "Done" => Some(TaskStatus::Done),
            "Failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboxTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub order_id: Uuid,
    pub status: TaskStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OutboxRow {
    id: String,
    kind: String,
    order_id: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    available_at: NaiveDateTime,
    created_at: NaiveDateTime,
}

const OUTBOX_COLUMNS: &str = "id, kind, order_id, status, attempts, last_error, available_at, created_at";

pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: OutboxRow) -> Result<OutboxTask> {
        Ok(OutboxTask {
            id: parse_uuid(&row.id)?,
            kind: TaskKind::from_str(&row.kind).ok_or_else(|| invalid_column("task kind", &row.kind))?,
            order_id: parse_uuid(&row.order_id)?,
            status: TaskStatus::from_str(&row.status).ok_or_else(|| invalid_column("task status", &row.status))?,
            attempts: row.attempts,
            last_error: row.last_error,
            available_at: to_utc(row.available_at),
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    /// Re-arms a finished or abandoned task so it runs again.
    async fn enqueue(&self, kind: TaskKind, order_id: Uuid) -> Result<()> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE outbox_tasks
            SET status = 'Pending', attempts = 0, last_error = NULL, available_at = ?, updated_at = ?
            WHERE kind = ? AND order_id = ?
            "#
        )
        .bind(now)
        .bind(now)
        .bind(kind.as_str())
        .bind(order_id.to_string())
        .execute(&mut *tx)
        .await?;

        ledger::enqueue_task(&mut tx, kind, order_id, now).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<OutboxTask>> {
        let rows = sqlx::query_as::<_, OutboxRow>(&format!(
            "SELECT {} FROM outbox_tasks WHERE status = 'Pending' AND available_at <= ? \
             ORDER BY available_at, rowid LIMIT ?",
            OUTBOX_COLUMNS
        ))
        .bind(Utc::now().naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_task).collect()
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_tasks SET status = 'Done', attempts = attempts + 1, last_error = NULL, updated_at = ? WHERE id = ?"
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reschedule(&self, id: Uuid, error: &str, available_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_tasks
            SET attempts = attempts + 1, last_error = ?, available_at = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(error)
        .bind(available_at.naive_utc())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_abandoned(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_tasks SET status = 'Failed', attempts = attempts + 1, last_error = ?, updated_at = ? WHERE id = ?"
        )
        .bind(error)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_for_order(&self, kind: TaskKind, order_id: Uuid) -> Result<Option<OutboxTask>> {
        let row = sqlx::query_as::<_, OutboxRow>(&format!(
            "SELECT {} FROM outbox_tasks WHERE kind = ? AND order_id = ?",
            OUTBOX_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_task).transpose()
    }
}
