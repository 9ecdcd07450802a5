use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        CaptureOutcome, CaptureRecord, FailureOutcome, NewPayment, Payment, PaymentDiscrepancy, PaymentStatus,
        RefundOutcome, RefundRecord,
    },
    error::{AppError, Result},
    repository::{invalid_column, ledger, parse_uuid, to_utc, PaymentRepository, TaskKind},
};

const PAYMENT_COLUMNS: &str = "id, order_id, customer_id, gateway, method, gateway_order_id, \
     gateway_payment_id, gateway_signature, amount, currency, status, paid_at, refund_amount, \
     refund_reason, gateway_refund_id, refunded_at, created_at, updated_at";

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    customer_id: String,
    gateway: String,
    method: Option<String>,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    paid_at: Option<NaiveDateTime>,
    refund_amount: Option<i64>,
    refund_reason: Option<String>,
    gateway_refund_id: Option<String>,
    refunded_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct DiscrepancyRow {
    id: String,
    payment_id: String,
    gateway_order_id: String,
    recorded_amount: i64,
    reported_amount: i64,
    source: String,
    created_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            order_id: parse_uuid(&row.order_id)?,
            customer_id: parse_uuid(&row.customer_id)?,
            gateway: row.gateway,
            method: row.method,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            amount: row.amount,
            currency: row.currency,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| invalid_column("payment status", &row.status))?,
            paid_at: row.paid_at.map(to_utc),
            refund_amount: row.refund_amount,
            refund_reason: row.refund_reason,
            gateway_refund_id: row.gateway_refund_id,
            refunded_at: row.refunded_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_one_by(conn: &mut SqliteConnection, column: &str, value: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE {} = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            PAYMENT_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn fetch_by_gateway_order(conn: &mut SqliteConnection, gateway_order_id: &str) -> Result<Payment> {
        Self::fetch_one_by(conn, "gateway_order_id", gateway_order_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve payment".to_string()))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create_pending(&self, payment: NewPayment) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, customer_id, gateway, gateway_order_id,
                amount, currency, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'Pending', ?, ?)
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(payment.order_id.to_string())
        .bind(payment.customer_id.to_string())
        .bind(&payment.gateway)
        .bind(&payment.gateway_order_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_gateway_order_id(&payment.gateway_order_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one_by(&mut conn, "id", &id.to_string()).await
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one_by(&mut conn, "gateway_order_id", gateway_order_id).await
    }

    async fn find_by_gateway_payment_id(&self, gateway_payment_id: &str) -> Result<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one_by(&mut conn, "gateway_payment_id", gateway_payment_id).await
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = ? ORDER BY created_at, rowid",
            PAYMENT_COLUMNS
        ))
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn capture(&self, record: CaptureRecord) -> Result<CaptureOutcome> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // The unique gateway_order_id decides the race between the client
        // callback and the webhook: the first writer flips the row, the
        // loser's DO UPDATE matches nothing.
        let upsert = sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, customer_id, gateway, method, gateway_order_id,
                gateway_payment_id, gateway_signature, amount, currency, status,
                paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Completed', ?, ?, ?)
            ON CONFLICT(gateway_order_id) DO UPDATE SET
                gateway_payment_id = excluded.gateway_payment_id,
                gateway_signature = COALESCE(excluded.gateway_signature, payments.gateway_signature),
                method = COALESCE(excluded.method, payments.method),
                status = 'Completed',
                paid_at = excluded.paid_at,
                updated_at = excluded.updated_at
            WHERE payments.status IN ('Pending', 'Processing', 'Failed')
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(record.order_id.to_string())
        .bind(record.customer_id.to_string())
        .bind(&record.gateway)
        .bind(&record.method)
        .bind(&record.gateway_order_id)
        .bind(&record.gateway_payment_id)
        .bind(&record.gateway_signature)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let upsert = match upsert {
            Ok(result) => result,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::InvalidState(
                    "Order has already been paid through another gateway order".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let payment = Self::fetch_by_gateway_order(&mut tx, &record.gateway_order_id).await?;

        if payment.order_id != record.order_id {
            return Err(AppError::Validation("Gateway order does not belong to this order".to_string()));
        }

        if upsert.rows_affected() == 0 {
            tx.rollback().await?;
            return match payment.status {
                PaymentStatus::Completed | PaymentStatus::Refunded => Ok(CaptureOutcome::AlreadyCaptured(payment)),
                other => Err(AppError::InvalidState(format!(
                    "Payment is {} and cannot be captured",
                    other.as_str()
                ))),
            };
        }

        let order_updated = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = 'Paid',
                gateway_payment_id = ?,
                status = CASE WHEN status = 'Pending' THEN 'Received' ELSE status END,
                updated_at = ?
            WHERE id = ? AND payment_status IN ('Pending', 'Failed')
            "#
        )
        .bind(&record.gateway_payment_id)
        .bind(now)
        .bind(record.order_id.to_string())
        .execute(&mut *tx)
        .await?;

        if order_updated.rows_affected() == 0 {
            return Err(AppError::InvalidState("Order is not awaiting payment".to_string()));
        }

        ledger::enqueue_task(&mut tx, TaskKind::CommissionAccrual, record.order_id, now).await?;
        tx.commit().await?;

        Ok(CaptureOutcome::Captured(payment))
    }

    async fn mark_failed(&self, gateway_order_id: &str, gateway_payment_id: Option<&str>) -> Result<FailureOutcome> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Failed',
                gateway_payment_id = COALESCE(?, gateway_payment_id),
                updated_at = ?
            WHERE gateway_order_id = ? AND status IN ('Pending', 'Processing')
            "#
        )
        .bind(gateway_payment_id)
        .bind(now)
        .bind(gateway_order_id)
        .execute(&mut *tx)
        .await?;

        let Some(payment) = Self::fetch_one_by(&mut tx, "gateway_order_id", gateway_order_id).await? else {
            return Ok(FailureOutcome::Unknown);
        };

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FailureOutcome::Ignored(payment));
        }

        sqlx::query(
            "UPDATE orders SET payment_status = 'Failed', updated_at = ? WHERE id = ? AND payment_status = 'Pending'"
        )
        .bind(now)
        .bind(payment.order_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FailureOutcome::Failed(payment))
    }

    async fn record_refund(&self, record: RefundRecord) -> Result<RefundOutcome> {
        let now = Utc::now().naive_utc();
        let id_str = record.payment_id.to_string();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Refunded',
                refund_amount = ?,
                refund_reason = ?,
                gateway_refund_id = COALESCE(?, gateway_refund_id),
                refunded_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'Completed'
            "#
        )
        .bind(record.amount)
        .bind(&record.reason)
        .bind(&record.gateway_refund_id)
        .bind(now)
        .bind(now)
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        let payment = Self::fetch_one_by(&mut tx, "id", &id_str)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return match payment.status {
                PaymentStatus::Refunded => Ok(RefundOutcome::AlreadyRefunded(payment)),
                other => Err(AppError::InvalidState(format!(
                    "Payment is {} and cannot be refunded",
                    other.as_str()
                ))),
            };
        }

        sqlx::query(
            "UPDATE orders SET payment_status = 'Refunded', updated_at = ? WHERE id = ? AND payment_status = 'Paid'"
        )
        .bind(now)
        .bind(payment.order_id.to_string())
        .execute(&mut *tx)
        .await?;

        let reversed = ledger::reverse_order_commissions(&mut tx, &payment, record.amount, now).await?;
        tx.commit().await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount = record.amount,
            reversed_commissions = reversed,
            "Refund recorded"
        );

        Ok(RefundOutcome::Refunded(payment))
    }

    async fn record_discrepancy(&self, payment: &Payment, reported_amount: i64, source: &str) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_discrepancies (
                id, payment_id, gateway_order_id, recorded_amount, reported_amount, source, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(payment_id, reported_amount, source) DO NOTHING
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(payment.id.to_string())
        .bind(&payment.gateway_order_id)
        .bind(payment.amount)
        .bind(reported_amount)
        .bind(source)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }

    async fn list_discrepancies(&self, limit: i64, offset: i64) -> Result<Vec<PaymentDiscrepancy>> {
        let rows = sqlx::query_as::<_, DiscrepancyRow>(
            r#"
            SELECT id, payment_id, gateway_order_id, recorded_amount, reported_amount, source, created_at
            FROM payment_discrepancies
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(PaymentDiscrepancy {
                    id: parse_uuid(&r.id)?,
                    payment_id: parse_uuid(&r.payment_id)?,
                    gateway_order_id: r.gateway_order_id,
                    recorded_amount: r.recorded_amount,
                    reported_amount: r.reported_amount,
                    source: r.source,
                    created_at: to_utc(r.created_at),
                })
            })
            .collect()
    }
}
