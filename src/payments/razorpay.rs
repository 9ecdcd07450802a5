//! HTTP client for a Razorpay-compatible Orders/Refunds API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    config::GatewayConfig,
    error::{AppError, Result},
    payments::{GatewayOrder, GatewayRefund, PaymentGateway},
};

pub struct RazorpayGateway {
    client: Client,
    key_id: String,
    key_secret: Secret<String>,
    api_base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes<'a>,
}

/// Echoed back on webhook payment entities, which lets a webhook that beats
/// the client callback find the order.
#[derive(Debug, Serialize)]
struct OrderNotes<'a> {
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RefundBody {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    payment_id: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    description: String,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build gateway client: {}", e)))?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Gateway(format!("Gateway timed out calling {}", path))
                } else {
                    AppError::Gateway(format!("Gateway unreachable: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to read gateway response: {}", e)))?;

        tracing::debug!(status = %status, path, "Gateway response");

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| AppError::Gateway(format!("Unexpected gateway response: {}", e)));
        }

        let message = match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(err) => format!("{} - {}", err.error.code, err.error.description),
            Err(_) => format!("HTTP {}: {}", status, text),
        };
        Err(AppError::Gateway(message))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &str {
        "razorpay"
    }

    fn publishable_key(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        let body = CreateOrderBody {
            amount,
            currency,
            receipt,
            notes: OrderNotes { order_id: receipt },
        };

        let order: OrderResponse = self.post("/orders", &body).await.map_err(|e| {
            tracing::error!(receipt, amount, error = %e, "Gateway order creation failed");
            e
        })?;

        tracing::info!(gateway_order_id = %order.id, amount = order.amount, "Gateway order created");

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }

    async fn refund(&self, gateway_payment_id: &str, amount: i64) -> Result<GatewayRefund> {
        let path = format!("/payments/{}/refund", gateway_payment_id);

        let refund: RefundResponse = self.post(&path, &RefundBody { amount }).await.map_err(|e| {
            tracing::error!(gateway_payment_id, amount, error = %e, "Gateway refund failed");
            e
        })?;

        tracing::info!(refund_id = %refund.id, gateway_payment_id, amount = refund.amount, "Gateway refund created");

        Ok(GatewayRefund {
            id: refund.id,
            payment_id: refund.payment_id,
            amount: refund.amount,
        })
    }
}
