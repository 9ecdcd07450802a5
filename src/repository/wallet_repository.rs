use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        ApprovalOutcome, Beneficiary, BeneficiaryType, NewWalletTransaction, NewWithdrawal, PayoutMethod,
        TransactionStatus, TransactionType, WalletBalance, WalletTransaction, WithdrawalRequest,
        WithdrawalStatus,
    },
    error::{AppError, Result},
    repository::{invalid_column, ledger, parse_opt_uuid, parse_uuid, to_utc, WalletRepository},
};

pub(crate) const TRANSACTION_COLUMNS: &str = "id, beneficiary_id, beneficiary_type, amount, txn_type, \
     description, order_id, commission_id, withdrawal_id, status, created_at";

const WITHDRAWAL_COLUMNS: &str = "id, beneficiary_id, beneficiary_type, amount, payment_method, status, \
     remarks, processed_at, created_at, updated_at";

#[derive(FromRow)]
pub(crate) struct WalletTransactionRow {
    id: String,
    beneficiary_id: String,
    beneficiary_type: String,
    amount: i64,
    txn_type: String,
    description: String,
    order_id: Option<String>,
    commission_id: Option<String>,
    withdrawal_id: Option<String>,
    status: String,
    created_at: NaiveDateTime,
}

pub(crate) fn row_to_transaction(row: WalletTransactionRow) -> Result<WalletTransaction> {
    Ok(WalletTransaction {
        id: parse_uuid(&row.id)?,
        beneficiary_id: parse_uuid(&row.beneficiary_id)?,
        beneficiary_type: BeneficiaryType::from_str(&row.beneficiary_type)
            .ok_or_else(|| invalid_column("beneficiary type", &row.beneficiary_type))?,
        amount: row.amount,
        txn_type: TransactionType::from_str(&row.txn_type)
            .ok_or_else(|| invalid_column("transaction type", &row.txn_type))?,
        description: row.description,
        order_id: parse_opt_uuid(row.order_id)?,
        commission_id: parse_opt_uuid(row.commission_id)?,
        withdrawal_id: parse_opt_uuid(row.withdrawal_id)?,
        status: TransactionStatus::from_str(&row.status)
            .ok_or_else(|| invalid_column("transaction status", &row.status))?,
        created_at: to_utc(row.created_at),
    })
}

#[derive(FromRow)]
struct WithdrawalRow {
    id: String,
    beneficiary_id: String,
    beneficiary_type: String,
    amount: i64,
    payment_method: String,
    status: String,
    remarks: Option<String>,
    processed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_withdrawal(row: WithdrawalRow) -> Result<WithdrawalRequest> {
        Ok(WithdrawalRequest {
            id: parse_uuid(&row.id)?,
            beneficiary_id: parse_uuid(&row.beneficiary_id)?,
            beneficiary_type: BeneficiaryType::from_str(&row.beneficiary_type)
                .ok_or_else(|| invalid_column("beneficiary type", &row.beneficiary_type))?,
            amount: row.amount,
            payment_method: PayoutMethod::from_str(&row.payment_method)
                .ok_or_else(|| invalid_column("payment method", &row.payment_method))?,
            status: WithdrawalStatus::from_str(&row.status)
                .ok_or_else(|| invalid_column("withdrawal status", &row.status))?,
            remarks: row.remarks,
            processed_at: row.processed_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_withdrawal(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawal_requests WHERE id = ?",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_withdrawal).transpose()
    }

    async fn finish_withdrawal(
        conn: &mut SqliteConnection,
        id: Uuid,
        status: WithdrawalStatus,
        remarks: Option<String>,
        now: NaiveDateTime,
    ) -> Result<WithdrawalRequest> {
        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = ?, remarks = COALESCE(?, remarks), processed_at = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(status.as_str())
        .bind(remarks)
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Self::fetch_withdrawal(conn, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated withdrawal".to_string())
        })
    }

    /// Claims the request for processing. Also takes the SQLite write lock so
    /// the balance read that follows cannot go stale before the debit lands.
    async fn claim_pending(conn: &mut SqliteConnection, id: Uuid, now: NaiveDateTime) -> Result<WithdrawalRequest> {
        let claimed = sqlx::query(
            "UPDATE withdrawal_requests SET updated_at = ? WHERE id = ? AND status = 'Pending'"
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        let request = Self::fetch_withdrawal(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Withdrawal request not found".to_string()))?;

        if claimed.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Withdrawal request is already {}",
                request.status.as_str()
            )));
        }

        Ok(request)
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn balance(&self, beneficiary: Beneficiary) -> Result<WalletBalance> {
        let mut conn = self.pool.acquire().await?;
        let available = ledger::available_balance(&mut conn, beneficiary).await?;
        let pending = ledger::pending_commissions(&mut conn, beneficiary).await?;

        Ok(WalletBalance { available, pending })
    }

    async fn list_transactions(&self, beneficiary: Beneficiary, limit: i64, offset: i64) -> Result<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(&format!(
            "SELECT {} FROM wallet_transactions WHERE beneficiary_id = ? AND beneficiary_type = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        ))
        .bind(beneficiary.id.to_string())
        .bind(beneficiary.kind.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn count_transactions(&self, beneficiary: Beneficiary) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM wallet_transactions WHERE beneficiary_id = ? AND beneficiary_type = ?"
        )
        .bind(beneficiary.id.to_string())
        .bind(beneficiary.kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn create_withdrawal(&self, request: NewWithdrawal) -> Result<WithdrawalRequest> {
        if request.amount <= 0 {
            return Err(AppError::Validation("Withdrawal amount must be positive".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // Insert first so the transaction holds the write lock while the
        // balance is read; dropping the transaction discards the row.
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (
                id, beneficiary_id, beneficiary_type, amount, payment_method,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 'Pending', ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.beneficiary.id.to_string())
        .bind(request.beneficiary.kind.as_str())
        .bind(request.amount)
        .bind(request.payment_method.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let available = ledger::available_balance(&mut tx, request.beneficiary).await?;
        if request.amount > available {
            tx.rollback().await?;
            return Err(AppError::InsufficientBalance {
                requested: request.amount,
                available,
            });
        }

        let created = Self::fetch_withdrawal(&mut tx, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created withdrawal".to_string())
        })?;
        tx.commit().await?;

        Ok(created)
    }

    async fn find_withdrawal(&self, id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_withdrawal(&mut conn, id).await
    }

    async fn list_withdrawals(&self, beneficiary: Beneficiary) -> Result<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawal_requests WHERE beneficiary_id = ? AND beneficiary_type = ? \
             ORDER BY created_at DESC, rowid DESC",
            WITHDRAWAL_COLUMNS
        ))
        .bind(beneficiary.id.to_string())
        .bind(beneficiary.kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_withdrawal).collect()
    }

    async fn list_withdrawals_by_status(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawal_requests WHERE (? IS NULL OR status = ?) \
             ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            WITHDRAWAL_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_withdrawal).collect()
    }

    async fn approve_withdrawal(&self, id: Uuid, remarks: Option<String>) -> Result<ApprovalOutcome> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let request = Self::claim_pending(&mut tx, id, now).await?;
        let beneficiary = Beneficiary {
            id: request.beneficiary_id,
            kind: request.beneficiary_type,
        };

        let available = ledger::available_balance(&mut tx, beneficiary).await?;
        if request.amount > available {
            let remark = format!(
                "Insufficient balance at approval: requested {}, available {}",
                request.amount, available
            );
            let rejected = Self::finish_withdrawal(&mut tx, id, WithdrawalStatus::Rejected, Some(remark), now).await?;
            tx.commit().await?;
            return Ok(ApprovalOutcome::Rejected(rejected));
        }

        let key = ledger::withdrawal_key(id);
        let debit = NewWalletTransaction {
            beneficiary,
            amount: request.amount,
            txn_type: TransactionType::Debit,
            description: format!("Withdrawal via {}", request.payment_method.as_str()),
            order_id: None,
            commission_id: None,
            withdrawal_id: Some(id),
            idempotency_key: key.clone(),
        };
        ledger::append_transaction(&mut tx, &debit, now).await?;
        let transaction = ledger::find_transaction_by_key(&mut tx, &key)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve withdrawal debit".to_string()))?;

        let completed = Self::finish_withdrawal(&mut tx, id, WithdrawalStatus::Completed, remarks, now).await?;
        tx.commit().await?;

        Ok(ApprovalOutcome::Completed {
            request: completed,
            transaction,
        })
    }

    async fn reject_withdrawal(&self, id: Uuid, remarks: String) -> Result<WithdrawalRequest> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        Self::claim_pending(&mut tx, id, now).await?;
        let rejected = Self::finish_withdrawal(&mut tx, id, WithdrawalStatus::Rejected, Some(remarks), now).await?;
        tx.commit().await?;

        Ok(rejected)
    }
}
