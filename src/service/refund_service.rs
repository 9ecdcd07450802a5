use std::sync::Arc;

use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::PaymentGateway,
    repository::PaymentRepository,
};

pub struct RefundService {
    payment_repo: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundService {
    pub fn new(payment_repo: Arc<dyn PaymentRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { payment_repo, gateway }
    }

    /// Refunds `amount` (default: everything captured) at the gateway, then
    /// records it and reverses the order's commissions.
    pub async fn refund(&self, payment_id: Uuid, amount: Option<i64>, reason: Option<String>) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status == PaymentStatus::Refunded {
            return Err(AppError::InvalidState("Payment has already been refunded".to_string()));
        }
        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Payment is {} and cannot be refunded",
                payment.status.as_str()
            )));
        }
        let Some(gateway_payment_id) = payment.gateway_payment_id.clone() else {
            return Err(AppError::InvalidState("Payment has no gateway payment id".to_string()));
        };

        let amount = amount.unwrap_or(payment.amount);
        if amount <= 0 || amount > payment.amount {
            return Err(AppError::Validation(format!(
                "Refund amount must be between 1 and {}",
                payment.amount
            )));
        }

        let gateway_refund = self.gateway.refund(&gateway_payment_id, amount).await?;

        let outcome = self
            .payment_repo
            .record_refund(RefundRecord {
                payment_id: payment.id,
                amount,
                reason,
                gateway_refund_id: Some(gateway_refund.id),
            })
            .await?;

        Ok(outcome.into_payment())
    }
}
