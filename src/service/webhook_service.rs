use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{signature, webhook, GatewayEvent},
    repository::{OrderRepository, PaymentRepository},
};

/// What a verified webhook did. All of these are acknowledged to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// Already reflected in our records.
    Duplicate,
    /// Nothing we can or should act on.
    Ignored,
}

pub struct WebhookService {
    order_repo: Arc<dyn OrderRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    gateway_name: String,
    webhook_secret: Secret<String>,
    accrual_signal: Arc<Notify>,
}

impl WebhookService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        gateway_name: impl Into<String>,
        webhook_secret: Secret<String>,
        accrual_signal: Arc<Notify>,
    ) -> Self {
        Self {
            order_repo,
            payment_repo,
            gateway_name: gateway_name.into(),
            webhook_secret,
            accrual_signal,
        }
    }

    /// Verifies `raw_body` against the webhook secret before anything is parsed.
    pub async fn ingest(&self, raw_body: &str, provided_signature: Option<&str>) -> Result<WebhookOutcome> {
        let provided = provided_signature.unwrap_or_default();
        if !signature::verify(raw_body.as_bytes(), provided, self.webhook_secret.expose_secret()) {
            tracing::warn!("Webhook signature rejected");
            return Err(AppError::InvalidSignature);
        }

        // Signed by the gateway, so retrying will not make it parse
        let event = match webhook::parse(raw_body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed webhook payload");
                return Ok(WebhookOutcome::Ignored);
            }
        };
        let name = event.name().to_string();

        let outcome = match event {
            GatewayEvent::PaymentCaptured {
                gateway_order_id,
                gateway_payment_id,
                amount,
                currency,
                method,
                order_ref,
            } => {
                self.payment_captured(gateway_order_id, gateway_payment_id, amount, currency, method, order_ref)
                    .await?
            }
            GatewayEvent::PaymentFailed {
                gateway_order_id,
                gateway_payment_id,
            } => self.payment_failed(&gateway_order_id, &gateway_payment_id).await?,
            GatewayEvent::RefundCreated {
                gateway_payment_id,
                refund_id,
                amount,
            } => self.refund_created(&gateway_payment_id, refund_id, amount).await?,
            GatewayEvent::Unsupported(_) => WebhookOutcome::Ignored,
        };

        tracing::info!(event = %name, outcome = ?outcome, "Webhook processed");
        Ok(outcome)
    }

    async fn payment_captured(
        &self,
        gateway_order_id: String,
        gateway_payment_id: String,
        reported_amount: i64,
        currency: String,
        method: Option<String>,
        order_ref: Option<Uuid>,
    ) -> Result<WebhookOutcome> {
        let existing = self.payment_repo.find_by_gateway_order_id(&gateway_order_id).await?;

        let (order_id, customer_id, amount, currency) = match &existing {
            Some(payment) => (payment.order_id, payment.customer_id, payment.amount, payment.currency.clone()),
            None => {
                // The event beat our own bookkeeping; fall back to the order
                // reference we attached when minting the gateway order.
                let order = match order_ref {
                    Some(id) => self.order_repo.find_by_id(id).await?,
                    None => None,
                };
                match order {
                    Some(order) => (order.id, order.customer_id, order.total_amount, order.currency),
                    None => {
                        tracing::warn!(gateway_order_id = %gateway_order_id, "Captured payment for unknown order");
                        return Ok(WebhookOutcome::Ignored);
                    }
                }
            }
        };

        if let Some(payment) = existing.as_ref().filter(|p| p.status.is_captured()) {
            self.flag_amount_mismatch(payment, reported_amount).await?;
            return Ok(WebhookOutcome::Duplicate);
        }

        let record = CaptureRecord {
            order_id,
            customer_id,
            gateway: self.gateway_name.clone(),
            method,
            gateway_order_id,
            gateway_payment_id,
            gateway_signature: None,
            amount,
            currency,
        };

        let outcome = match self.payment_repo.capture(record).await {
            Ok(outcome) => outcome,
            Err(AppError::InvalidState(reason)) | Err(AppError::Validation(reason)) => {
                tracing::warn!(order_id = %order_id, %reason, "Captured webhook not applied");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        self.flag_amount_mismatch(outcome.payment(), reported_amount).await?;

        Ok(match outcome {
            CaptureOutcome::Captured(_) => {
                self.accrual_signal.notify_one();
                WebhookOutcome::Applied
            }
            CaptureOutcome::AlreadyCaptured(_) => WebhookOutcome::Duplicate,
        })
    }

    async fn flag_amount_mismatch(&self, payment: &Payment, reported_amount: i64) -> Result<()> {
        if payment.amount == reported_amount {
            return Ok(());
        }

        let recorded = self
            .payment_repo
            .record_discrepancy(payment, reported_amount, webhook::PAYMENT_CAPTURED)
            .await?;

        if recorded {
            tracing::error!(
                payment_id = %payment.id,
                recorded = payment.amount,
                reported = reported_amount,
                "Gateway reported a different captured amount"
            );
        }

        Ok(())
    }

    async fn payment_failed(&self, gateway_order_id: &str, gateway_payment_id: &str) -> Result<WebhookOutcome> {
        match self.payment_repo.mark_failed(gateway_order_id, Some(gateway_payment_id)).await? {
            FailureOutcome::Failed(payment) => {
                tracing::info!(payment_id = %payment.id, order_id = %payment.order_id, "Payment failed");
                Ok(WebhookOutcome::Applied)
            }
            FailureOutcome::Ignored(payment) if payment.status == PaymentStatus::Failed => Ok(WebhookOutcome::Duplicate),
            FailureOutcome::Ignored(_) | FailureOutcome::Unknown => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn refund_created(&self, gateway_payment_id: &str, refund_id: String, amount: i64) -> Result<WebhookOutcome> {
        let Some(payment) = self.payment_repo.find_by_gateway_payment_id(gateway_payment_id).await? else {
            tracing::warn!(gateway_payment_id, "Refund for unknown payment");
            return Ok(WebhookOutcome::Ignored);
        };

        if payment.status == PaymentStatus::Refunded {
            return Ok(WebhookOutcome::Duplicate);
        }
        if amount <= 0 {
            return Ok(WebhookOutcome::Ignored);
        }

        let record = RefundRecord {
            payment_id: payment.id,
            amount: amount.min(payment.amount),
            reason: Some("Refund issued at gateway".to_string()),
            gateway_refund_id: Some(refund_id),
        };

        match self.payment_repo.record_refund(record).await {
            Ok(RefundOutcome::Refunded(_)) => Ok(WebhookOutcome::Applied),
            Ok(RefundOutcome::AlreadyRefunded(_)) => Ok(WebhookOutcome::Duplicate),
            Err(AppError::InvalidState(reason)) => {
                tracing::warn!(payment_id = %payment.id, %reason, "Refund webhook not applied");
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }
}
