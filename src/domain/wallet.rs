use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commission::{Beneficiary, BeneficiaryType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "Credit",
            TransactionType::Debit => "Debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Credit" => Some(TransactionType::Credit),
            "Debit" => Some(TransactionType::Debit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Failed => "Failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TransactionStatus::Pending),
            "Completed" => Some(TransactionStatus::Completed),
            "Failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only ledger entry. `amount` is always positive; `txn_type` gives the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub beneficiary_id: Uuid,
    pub beneficiary_type: BeneficiaryType,
    pub amount: i64,
    pub txn_type: TransactionType,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub commission_id: Option<Uuid>,
    pub withdrawal_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry to append. Replaying the same `idempotency_key` is a no-op.
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub beneficiary: Beneficiary,
    pub amount: i64,
    pub txn_type: TransactionType,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub commission_id: Option<Uuid>,
    pub withdrawal_id: Option<Uuid>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletBalance {
    /// Completed credits minus completed debits.
    pub available: i64,
    /// Net amount of commissions accrued but not yet credited.
    pub pending: i64,
}

/// The schema also allows `Approved` for a future two-step payout; approval
/// here settles in one step, so that state is never produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Pending,
    Rejected,
    Completed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "Pending",
            WithdrawalStatus::Rejected => "Rejected",
            WithdrawalStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(WithdrawalStatus::Pending),
            "Rejected" => Some(WithdrawalStatus::Rejected),
            "Completed" => Some(WithdrawalStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PayoutMethod {
    BankTransfer,
    Upi,
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::BankTransfer => "BankTransfer",
            PayoutMethod::Upi => "Upi",
        }
    }

    /// Accepts the stored form as well as the looser spellings clients send.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "banktransfer" | "bank" => Some(PayoutMethod::BankTransfer),
            "upi" => Some(PayoutMethod::Upi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub beneficiary_id: Uuid,
    pub beneficiary_type: BeneficiaryType,
    pub amount: i64,
    pub payment_method: PayoutMethod,
    pub status: WithdrawalStatus,
    pub remarks: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub beneficiary: Beneficiary,
    pub amount: i64,
    pub payment_method: PayoutMethod,
}

#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Completed {
        request: WithdrawalRequest,
        transaction: WalletTransaction,
    },
    /// Balance no longer covered the request when it was re-checked.
    Rejected(WithdrawalRequest),
}
