//! Gateway webhook bodies.
//!
//! The body is read in two passes: first the `event` name, then a typed
//! parser for that event that extracts only the fields we act on. Unknown
//! events are surfaced as [`GatewayEvent::Unsupported`] and acknowledged
//! without side effects.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const REFUND_CREATED: &str = "refund.created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentCaptured {
        gateway_order_id: String,
        gateway_payment_id: String,
        amount: i64,
        currency: String,
        method: Option<String>,
        /// Our order id, echoed back from the notes attached at order creation.
        order_ref: Option<Uuid>,
    },
    PaymentFailed {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    RefundCreated {
        gateway_payment_id: String,
        refund_id: String,
        amount: i64,
    },
    Unsupported(String),
}

impl GatewayEvent {
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::PaymentCaptured { .. } => PAYMENT_CAPTURED,
            GatewayEvent::PaymentFailed { .. } => PAYMENT_FAILED,
            GatewayEvent::RefundCreated { .. } => REFUND_CREATED,
            GatewayEvent::Unsupported(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
}

#[derive(Deserialize)]
struct PaymentBody {
    payload: PaymentPayload,
}

#[derive(Deserialize)]
struct PaymentPayload {
    payment: Entity<PaymentEntity>,
}

#[derive(Deserialize)]
struct RefundBody {
    payload: RefundPayload,
}

#[derive(Deserialize)]
struct RefundPayload {
    refund: Entity<RefundEntity>,
}

#[derive(Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: i64,
    currency: String,
    method: Option<String>,
    // An object when set, an empty array when not.
    #[serde(default)]
    notes: serde_json::Value,
}

#[derive(Deserialize)]
struct RefundEntity {
    id: String,
    payment_id: String,
    amount: i64,
}

fn malformed(event: &str, err: serde_json::Error) -> AppError {
    AppError::Validation(format!("Malformed {} webhook: {}", event, err))
}

pub fn parse(body: &str) -> Result<GatewayEvent> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook body: {}", e)))?;

    match envelope.event.as_str() {
        PAYMENT_CAPTURED => {
            let payment = parse_payment(body, PAYMENT_CAPTURED)?;
            let order_ref = payment
                .notes
                .get("order_id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok());

            Ok(GatewayEvent::PaymentCaptured {
                gateway_order_id: require_order_id(payment.order_id, PAYMENT_CAPTURED)?,
                gateway_payment_id: payment.id,
                amount: payment.amount,
                currency: payment.currency,
                method: payment.method,
                order_ref,
            })
        }
        PAYMENT_FAILED => {
            let payment = parse_payment(body, PAYMENT_FAILED)?;
            Ok(GatewayEvent::PaymentFailed {
                gateway_order_id: require_order_id(payment.order_id, PAYMENT_FAILED)?,
                gateway_payment_id: payment.id,
            })
        }
        REFUND_CREATED => {
            let body: RefundBody = serde_json::from_str(body).map_err(|e| malformed(REFUND_CREATED, e))?;
            let refund = body.payload.refund.entity;
            Ok(GatewayEvent::RefundCreated {
                gateway_payment_id: refund.payment_id,
                refund_id: refund.id,
                amount: refund.amount,
            })
        }
        _ => Ok(GatewayEvent::Unsupported(envelope.event)),
    }
}

fn parse_payment(body: &str, event: &str) -> Result<PaymentEntity> {
    let body: PaymentBody = serde_json::from_str(body).map_err(|e| malformed(event, e))?;
    Ok(body.payload.payment.entity)
}

fn require_order_id(order_id: Option<String>, event: &str) -> Result<String> {
    order_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} webhook has no order_id", event)))
}
