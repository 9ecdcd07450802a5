//! SQL steps shared by the atomic operations in the other repositories.
//!
//! Every function runs on the caller's connection so it joins whatever
//! transaction the caller has open.

use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{
    domain::{
        Beneficiary, Commission, CommissionStatus, NewWalletTransaction, Payment, TransactionType,
        WalletTransaction,
    },
    error::{AppError, Result},
    repository::{
        commission_repository::{row_to_commission, CommissionRow, COMMISSION_COLUMNS},
        outbox_repository::TaskKind,
        wallet_repository::{row_to_transaction, WalletTransactionRow, TRANSACTION_COLUMNS},
    },
};

pub(crate) fn credit_key(commission_id: Uuid) -> String {
    format!("commission:{}:credit", commission_id)
}

pub(crate) fn reversal_key(commission_id: Uuid, payment_id: Uuid) -> String {
    format!("commission:{}:reversal:{}", commission_id, payment_id)
}

pub(crate) fn withdrawal_key(withdrawal_id: Uuid) -> String {
    format!("withdrawal:{}:debit", withdrawal_id)
}

/// Returns false when an entry with the same idempotency key already exists.
pub(crate) async fn append_transaction(
    conn: &mut SqliteConnection,
    txn: &NewWalletTransaction,
    now: NaiveDateTime,
) -> Result<bool> {
    if txn.amount < 0 {
        return Err(AppError::Internal("Wallet transaction amount must not be negative".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, beneficiary_id, beneficiary_type, amount, txn_type, description,
            order_id, commission_id, withdrawal_id, status, idempotency_key, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'Completed', ?, ?)
        ON CONFLICT(idempotency_key) DO NOTHING
        "#
    )
    .bind(Uuid::new_v4().to_string())
    .bind(txn.beneficiary.id.to_string())
    .bind(txn.beneficiary.kind.as_str())
    .bind(txn.amount)
    .bind(txn.txn_type.as_str())
    .bind(&txn.description)
    .bind(txn.order_id.map(|id| id.to_string()))
    .bind(txn.commission_id.map(|id| id.to_string()))
    .bind(txn.withdrawal_id.map(|id| id.to_string()))
    .bind(&txn.idempotency_key)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn find_transaction_by_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<WalletTransaction>> {
    let row = sqlx::query_as::<_, WalletTransactionRow>(&format!(
        "SELECT {} FROM wallet_transactions WHERE idempotency_key = ?",
        TRANSACTION_COLUMNS
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(row_to_transaction).transpose()
}

/// Completed credits minus completed debits.
pub(crate) async fn available_balance(conn: &mut SqliteConnection, beneficiary: Beneficiary) -> Result<i64> {
    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(CASE WHEN txn_type = 'Credit' THEN amount ELSE -amount END), 0)
        FROM wallet_transactions
        WHERE beneficiary_id = ? AND beneficiary_type = ? AND status = 'Completed'
        "#
    )
    .bind(beneficiary.id.to_string())
    .bind(beneficiary.kind.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(balance)
}

pub(crate) async fn pending_commissions(conn: &mut SqliteConnection, beneficiary: Beneficiary) -> Result<i64> {
    let pending = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(net_amount), 0)
        FROM commissions
        WHERE beneficiary_id = ? AND beneficiary_type = ? AND status = 'Pending'
        "#
    )
    .bind(beneficiary.id.to_string())
    .bind(beneficiary.kind.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(pending)
}

pub(crate) async fn commissions_for_order(conn: &mut SqliteConnection, order_id: Uuid) -> Result<Vec<Commission>> {
    let rows = sqlx::query_as::<_, CommissionRow>(&format!(
        "SELECT {} FROM commissions WHERE order_id = ? ORDER BY created_at, rowid",
        COMMISSION_COLUMNS
    ))
    .bind(order_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_commission).collect()
}

/// Moves a Pending commission into its beneficiary's wallet. Returns `None`
/// when the commission was already credited.
pub(crate) async fn credit_commission(
    conn: &mut SqliteConnection,
    commission: &Commission,
    now: NaiveDateTime,
) -> Result<Option<WalletTransaction>> {
    if commission.status != CommissionStatus::Pending {
        return Ok(None);
    }

    let flipped = sqlx::query(
        "UPDATE commissions SET status = 'Paid', paid_at = ?, updated_at = ? WHERE id = ? AND status = 'Pending'"
    )
    .bind(now)
    .bind(now)
    .bind(commission.id.to_string())
    .execute(&mut *conn)
    .await?;

    if flipped.rows_affected() == 0 {
        return Ok(None);
    }

    let key = credit_key(commission.id);
    let credit = NewWalletTransaction {
        beneficiary: commission.beneficiary(),
        amount: commission.net_amount,
        txn_type: TransactionType::Credit,
        description: format!("Commission settlement for order {}", commission.order_id),
        order_id: Some(commission.order_id),
        commission_id: Some(commission.id),
        withdrawal_id: None,
        idempotency_key: key.clone(),
    };
    append_transaction(conn, &credit, now).await?;

    find_transaction_by_key(conn, &key).await
}

/// `round(net * refunded / captured)`, the share of a commission a refund takes back.
pub(crate) fn reversal_amount(net_amount: i64, refund_amount: i64, captured_amount: i64) -> i64 {
    if captured_amount <= 0 || net_amount <= 0 {
        return 0;
    }
    let refund_amount = refund_amount.clamp(0, captured_amount) as i128;
    let captured = captured_amount as i128;
    ((net_amount as i128 * refund_amount + captured / 2) / captured) as i64
}

/// Appends compensating debits for every commission of the refunded order.
/// Pending commissions are credited first so the ledger shows both sides.
pub(crate) async fn reverse_order_commissions(
    conn: &mut SqliteConnection,
    payment: &Payment,
    refund_amount: i64,
    now: NaiveDateTime,
) -> Result<usize> {
    let mut reversed = 0;

    for commission in commissions_for_order(conn, payment.order_id).await? {
        credit_commission(conn, &commission, now).await?;

        let amount = reversal_amount(commission.net_amount, refund_amount, payment.amount);
        if amount == 0 {
            continue;
        }

        let debit = NewWalletTransaction {
            beneficiary: commission.beneficiary(),
            amount,
            txn_type: TransactionType::Debit,
            description: format!("Commission reversal for refunded order {}", payment.order_id),
            order_id: Some(payment.order_id),
            commission_id: Some(commission.id),
            withdrawal_id: None,
            idempotency_key: reversal_key(commission.id, payment.id),
        };
        if append_transaction(conn, &debit, now).await? {
            reversed += 1;
        }
    }

    Ok(reversed)
}

pub(crate) async fn enqueue_task(
    conn: &mut SqliteConnection,
    kind: TaskKind,
    order_id: Uuid,
    now: NaiveDateTime,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox_tasks (
            id, kind, order_id, status, attempts, available_at, created_at, updated_at
        ) VALUES (?, ?, ?, 'Pending', 0, ?, ?, ?)
        ON CONFLICT(kind, order_id) DO NOTHING
        "#
    )
    .bind(Uuid::new_v4().to_string())
    .bind(kind.as_str())
    .bind(order_id.to_string())
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_refund_reverses_whole_net() {
        assert_eq!(reversal_amount(45_000, 50_000, 50_000), 45_000);
    }

    #[test]
    fn test_partial_refund_is_proportional() {
        assert_eq!(reversal_amount(45_000, 25_000, 50_000), 22_500);
        assert_eq!(reversal_amount(100, 1, 3), 33);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(reversal_amount(45_000, 10, 0), 0);
        assert_eq!(reversal_amount(0, 10, 10), 0);
        assert_eq!(reversal_amount(100, 500, 100), 100);
    }
}
