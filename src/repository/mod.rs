use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod ledger;
pub mod order_repository;
pub mod payment_repository;
pub mod commission_repository;
pub mod wallet_repository;
pub mod outbox_repository;

pub use order_repository::SqliteOrderRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use commission_repository::SqliteCommissionRepository;
pub use wallet_repository::SqliteWalletRepository;
pub use outbox_repository::{OutboxTask, SqliteOutboxRepository, TaskKind};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: CreateOrderRequest) -> Result<Order>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>>;
    async fn assign_delivery_partner(&self, id: Uuid, partner_id: Uuid) -> Result<Order>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_pending(&self, payment: NewPayment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Payment>>;
    async fn find_by_gateway_payment_id(&self, gateway_payment_id: &str) -> Result<Option<Payment>>;
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>>;
    /// Payment -> Completed, order -> Paid and the accrual task, as one unit.
    async fn capture(&self, record: CaptureRecord) -> Result<CaptureOutcome>;
    async fn mark_failed(&self, gateway_order_id: &str, gateway_payment_id: Option<&str>) -> Result<FailureOutcome>;
    /// Payment -> Refunded, order -> Refunded and commission reversal, as one unit.
    async fn record_refund(&self, record: RefundRecord) -> Result<RefundOutcome>;
    /// Returns false when the same mismatch was already on file.
    async fn record_discrepancy(&self, payment: &Payment, reported_amount: i64, source: &str) -> Result<bool>;
    async fn list_discrepancies(&self, limit: i64, offset: i64) -> Result<Vec<PaymentDiscrepancy>>;
}

#[async_trait]
pub trait CommissionRepository: Send + Sync {
    /// Inserts lines that do not exist yet and returns every line for the order.
    /// Writes nothing unless the order is still Paid inside the insert's own
    /// transaction, so a refund racing the accrual either reverses the lines
    /// or keeps them out.
    async fn insert_for_order(&self, order_id: Uuid, lines: Vec<NewCommission>) -> Result<Vec<Commission>>;
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Commission>>;
    async fn list_by_beneficiary(&self, beneficiary: Beneficiary) -> Result<Vec<Commission>>;
    /// Credits every Pending line of the order to its beneficiary's wallet.
    async fn settle_order(&self, order_id: Uuid) -> Result<Vec<WalletTransaction>>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn balance(&self, beneficiary: Beneficiary) -> Result<WalletBalance>;
    async fn list_transactions(&self, beneficiary: Beneficiary, limit: i64, offset: i64) -> Result<Vec<WalletTransaction>>;
    async fn count_transactions(&self, beneficiary: Beneficiary) -> Result<i64>;
    /// Persists a Pending request only if the available balance covers it.
    async fn create_withdrawal(&self, request: NewWithdrawal) -> Result<WithdrawalRequest>;
    async fn find_withdrawal(&self, id: Uuid) -> Result<Option<WithdrawalRequest>>;
    async fn list_withdrawals(&self, beneficiary: Beneficiary) -> Result<Vec<WithdrawalRequest>>;
    async fn list_withdrawals_by_status(&self, status: Option<WithdrawalStatus>, limit: i64, offset: i64) -> Result<Vec<WithdrawalRequest>>;
    /// Re-checks the balance and either debits the wallet or rejects the request.
    async fn approve_withdrawal(&self, id: Uuid, remarks: Option<String>) -> Result<ApprovalOutcome>;
    async fn reject_withdrawal(&self, id: Uuid, remarks: String) -> Result<WithdrawalRequest>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, kind: TaskKind, order_id: Uuid) -> Result<()>;
    async fn claim_due(&self, limit: i64) -> Result<Vec<OutboxTask>>;
    async fn mark_done(&self, id: Uuid) -> Result<()>;
    async fn reschedule(&self, id: Uuid, error: &str, available_at: DateTime<Utc>) -> Result<()>;
    async fn mark_abandoned(&self, id: Uuid, error: &str) -> Result<()>;
    async fn find_for_order(&self, kind: TaskKind, order_id: Uuid) -> Result<Option<OutboxTask>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

pub(crate) fn invalid_column(column: &str, value: &str) -> AppError {
    AppError::Database(format!("Invalid {}: {}", column, value))
}
