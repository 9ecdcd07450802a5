use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Beneficiary, BeneficiaryType, Commission, CommissionStatus, NewCommission, WalletTransaction},
    error::{AppError, Result},
    repository::{invalid_column, ledger, parse_uuid, to_utc, CommissionRepository},
};

pub(crate) const COMMISSION_COLUMNS: &str = "id, order_id, beneficiary_id, beneficiary_type, order_amount, \
     rate_bps, commission_amount, net_amount, status, paid_at, created_at, updated_at";

#[derive(FromRow)]
pub(crate) struct CommissionRow {
    id: String,
    order_id: String,
    beneficiary_id: String,
    beneficiary_type: String,
    order_amount: i64,
    rate_bps: i64,
    commission_amount: i64,
    net_amount: i64,
    status: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub(crate) fn row_to_commission(row: CommissionRow) -> Result<Commission> {
    Ok(Commission {
        id: parse_uuid(&row.id)?,
        order_id: parse_uuid(&row.order_id)?,
        beneficiary_id: parse_uuid(&row.beneficiary_id)?,
        beneficiary_type: BeneficiaryType::from_str(&row.beneficiary_type)
            .ok_or_else(|| invalid_column("beneficiary type", &row.beneficiary_type))?,
        order_amount: row.order_amount,
        rate_bps: u32::try_from(row.rate_bps)
            .map_err(|_| invalid_column("rate_bps", &row.rate_bps.to_string()))?,
        commission_amount: row.commission_amount,
        net_amount: row.net_amount,
        status: CommissionStatus::from_str(&row.status)
            .ok_or_else(|| invalid_column("commission status", &row.status))?,
        paid_at: row.paid_at.map(to_utc),
        created_at: to_utc(row.created_at),
        updated_at: to_utc(row.updated_at),
    })
}

pub struct SqliteCommissionRepository {
    pool: SqlitePool,
}

impl SqliteCommissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommissionRepository for SqliteCommissionRepository {
    async fn insert_for_order(&self, order_id: Uuid, lines: Vec<NewCommission>) -> Result<Vec<Commission>> {
        if lines.iter().any(|l| l.order_id != order_id) {
            return Err(AppError::Internal("Commission line belongs to another order".to_string()));
        }

        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        for line in &lines {
            let inserted = sqlx::query(
                r#"
                INSERT INTO commissions (
                    id, order_id, beneficiary_id, beneficiary_type, order_amount,
                    rate_bps, commission_amount, net_amount, status, created_at, updated_at
                )
                SELECT ?, ?, ?, ?, ?, ?, ?, ?, 'Pending', ?, ?
                WHERE EXISTS (SELECT 1 FROM orders WHERE id = ? AND payment_status = 'Paid')
                ON CONFLICT(order_id, beneficiary_id, beneficiary_type) DO NOTHING
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(order_id.to_string())
            .bind(line.beneficiary.id.to_string())
            .bind(line.beneficiary.kind.as_str())
            .bind(line.order_amount)
            .bind(line.rate.bps() as i64)
            .bind(line.commission_amount)
            .bind(line.net_amount)
            .bind(now)
            .bind(now)
            .bind(order_id.to_string())
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                tracing::debug!(
                    order_id = %order_id,
                    beneficiary_id = %line.beneficiary.id,
                    "Commission already accrued or order no longer paid"
                );
            }
        }

        let commissions = ledger::commissions_for_order(&mut tx, order_id).await?;
        tx.commit().await?;

        Ok(commissions)
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Commission>> {
        let mut conn = self.pool.acquire().await?;
        ledger::commissions_for_order(&mut conn, order_id).await
    }

    async fn list_by_beneficiary(&self, beneficiary: Beneficiary) -> Result<Vec<Commission>> {
        let rows = sqlx::query_as::<_, CommissionRow>(&format!(
            "SELECT {} FROM commissions WHERE beneficiary_id = ? AND beneficiary_type = ? \
             ORDER BY created_at DESC, rowid DESC",
            COMMISSION_COLUMNS
        ))
        .bind(beneficiary.id.to_string())
        .bind(beneficiary.kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_commission).collect()
    }

    async fn settle_order(&self, order_id: Uuid) -> Result<Vec<WalletTransaction>> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so concurrent settlements queue
        // on busy_timeout instead of failing the read-to-write upgrade.
        sqlx::query("UPDATE commissions SET updated_at = ? WHERE order_id = ? AND status = 'Pending'")
            .bind(now)
            .bind(order_id.to_string())
            .execute(&mut *tx)
            .await?;

        let mut credited = Vec::new();
        for commission in ledger::commissions_for_order(&mut tx, order_id).await? {
            if let Some(txn) = ledger::credit_commission(&mut tx, &commission, now).await? {
                credited.push(txn);
            }
        }

        tx.commit().await?;
        Ok(credited)
    }
}
