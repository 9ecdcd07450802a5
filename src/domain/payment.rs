use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One capture attempt against a gateway order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub gateway: String,
    pub method: Option<String>,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Processing" => Some(PaymentStatus::Processing),
            "Completed" => Some(PaymentStatus::Completed),
            "Failed" => Some(PaymentStatus::Failed),
            "Refunded" => Some(PaymentStatus::Refunded),
            "Cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Money has been received for this attempt (possibly returned since).
    pub fn is_captured(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

/// Pending row written when a gateway order is minted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub gateway: String,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
}

/// Everything needed to move a gateway order to Completed, from either the
/// client callback or the `payment.captured` webhook.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub gateway: String,
    pub method: Option<String>,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Captured(Payment),
    AlreadyCaptured(Payment),
}

impl CaptureOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            CaptureOutcome::Captured(p) | CaptureOutcome::AlreadyCaptured(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            CaptureOutcome::Captured(p) | CaptureOutcome::AlreadyCaptured(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FailureOutcome {
    Failed(Payment),
    /// Payment had already moved past Pending; the failure is stale.
    Ignored(Payment),
    Unknown,
}

#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub payment_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub gateway_refund_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RefundOutcome {
    Refunded(Payment),
    AlreadyRefunded(Payment),
}

impl RefundOutcome {
    pub fn into_payment(self) -> Payment {
        match self {
            RefundOutcome::Refunded(p) | RefundOutcome::AlreadyRefunded(p) => p,
        }
    }
}

/// A gateway-reported amount that disagrees with what was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDiscrepancy {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub gateway_order_id: String,
    pub recorded_amount: i64,
    pub reported_amount: i64,
    pub source: String,
    pub created_at: DateTime<Utc>,
}
