use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{signature, PaymentGateway},
    repository::{OrderRepository, PaymentRepository},
};

/// What the client needs to open the gateway's checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub publishable_key: String,
    pub amount_minor_units: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "gatewayOrderId is required"))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, message = "gatewayPaymentId is required"))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
    pub method: Option<String>,
}

pub struct CaptureService {
    order_repo: Arc<dyn OrderRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    key_secret: Secret<String>,
    accrual_signal: Arc<Notify>,
}

impl CaptureService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        key_secret: Secret<String>,
        accrual_signal: Arc<Notify>,
    ) -> Self {
        Self {
            order_repo,
            payment_repo,
            gateway,
            key_secret,
            accrual_signal,
        }
    }

    async fn owned_order(&self, order_id: Uuid, customer_id: Uuid) -> Result<Order> {
        let order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.customer_id != customer_id {
            return Err(AppError::Forbidden("Order belongs to another customer".to_string()));
        }

        Ok(order)
    }

    pub async fn create_gateway_order(&self, order_id: Uuid, customer_id: Uuid) -> Result<CheckoutSession> {
        let order = self.owned_order(order_id, customer_id).await?;

        if order.payment_status != OrderPaymentStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Order payment is {}",
                order.payment_status.as_str()
            )));
        }

        // Nothing is written until the gateway answers, so a failed or timed
        // out call leaves no trace and the client can simply retry.
        let gateway_order = self
            .gateway
            .create_order(order.total_amount, &order.currency, &order.id.to_string())
            .await?;

        self.payment_repo
            .create_pending(NewPayment {
                order_id: order.id,
                customer_id: order.customer_id,
                gateway: self.gateway.name().to_string(),
                gateway_order_id: gateway_order.id.clone(),
                amount: order.total_amount,
                currency: order.currency.clone(),
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            amount = order.total_amount,
            "Gateway order created"
        );

        Ok(CheckoutSession {
            order_id: order.id,
            gateway_order_id: gateway_order.id,
            publishable_key: self.gateway.publishable_key().to_string(),
            amount_minor_units: order.total_amount,
            currency: order.currency,
        })
    }

    pub async fn verify_and_capture(&self, customer_id: Uuid, request: VerifyPaymentRequest) -> Result<CaptureOutcome> {
        request.validate()?;
        let order = self.owned_order(request.order_id, customer_id).await?;

        let payload = signature::checkout_payload(&request.gateway_order_id, &request.gateway_payment_id);
        if !signature::verify(payload.as_bytes(), &request.signature, self.key_secret.expose_secret()) {
            tracing::warn!(
                order_id = %order.id,
                gateway_order_id = %request.gateway_order_id,
                "Checkout signature rejected"
            );
            return Err(AppError::InvalidSignature);
        }

        let outcome = self
            .payment_repo
            .capture(CaptureRecord {
                order_id: order.id,
                customer_id: order.customer_id,
                gateway: self.gateway.name().to_string(),
                method: request.method,
                gateway_order_id: request.gateway_order_id,
                gateway_payment_id: request.gateway_payment_id,
                gateway_signature: Some(request.signature),
                amount: order.total_amount,
                currency: order.currency,
            })
            .await?;

        match &outcome {
            CaptureOutcome::Captured(payment) => {
                tracing::info!(order_id = %order.id, payment_id = %payment.id, "Payment captured");
                self.accrual_signal.notify_one();
            }
            CaptureOutcome::AlreadyCaptured(payment) => {
                tracing::debug!(order_id = %order.id, payment_id = %payment.id, "Payment already captured");
            }
        }

        Ok(outcome)
    }
}
