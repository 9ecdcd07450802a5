//! In-process gateway for local development and tests.
//!
//! Mints gateway orders without network access and can play the customer's
//! side of checkout by producing correctly signed confirmations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};

use crate::{
    error::{AppError, Result},
    payments::{signature, GatewayOrder, GatewayRefund, PaymentGateway},
};

/// Signed confirmation the client would post after paying.
#[derive(Debug, Clone)]
pub struct SandboxCheckout {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Default)]
struct SandboxState {
    orders: HashMap<String, GatewayOrder>,
    refunds: Vec<GatewayRefund>,
    fail_next: Option<String>,
}

pub struct SandboxGateway {
    key_id: String,
    key_secret: Secret<String>,
    state: Mutex<SandboxState>,
}

fn random_id(prefix: &str) -> String {
    let mut bytes = [0u8; 7];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}_{}", prefix, hex::encode(bytes))
}

impl SandboxGateway {
    pub fn new(key_id: impl Into<String>, key_secret: Secret<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret,
            state: Mutex::new(SandboxState::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SandboxState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Sandbox gateway state poisoned".to_string()))
    }

    /// Makes the next gateway call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) -> Result<()> {
        self.lock()?.fail_next = Some(message.into());
        Ok(())
    }

    /// Pays for a previously minted order and signs the confirmation.
    pub fn complete_checkout(&self, gateway_order_id: &str) -> Result<SandboxCheckout> {
        if !self.lock()?.orders.contains_key(gateway_order_id) {
            return Err(AppError::NotFound(format!("Unknown gateway order {}", gateway_order_id)));
        }

        let gateway_payment_id = random_id("pay");
        let payload = signature::checkout_payload(gateway_order_id, &gateway_payment_id);

        Ok(SandboxCheckout {
            gateway_order_id: gateway_order_id.to_string(),
            signature: signature::sign(payload.as_bytes(), self.key_secret.expose_secret())?,
            gateway_payment_id,
        })
    }

    pub fn refunds(&self) -> Result<Vec<GatewayRefund>> {
        Ok(self.lock()?.refunds.clone())
    }

    fn take_failure(&self) -> Result<()> {
        match self.lock()?.fail_next.take() {
            Some(message) => Err(AppError::Gateway(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn publishable_key(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        self.take_failure()?;

        let order = GatewayOrder {
            id: random_id("order"),
            amount,
            currency: currency.to_string(),
        };
        self.lock()?.orders.insert(order.id.clone(), order.clone());

        tracing::debug!(gateway_order_id = %order.id, receipt, amount, "Sandbox order created");
        Ok(order)
    }

    async fn refund(&self, gateway_payment_id: &str, amount: i64) -> Result<GatewayRefund> {
        self.take_failure()?;

        let refund = GatewayRefund {
            id: random_id("rfnd"),
            payment_id: gateway_payment_id.to_string(),
            amount,
        };
        self.lock()?.refunds.push(refund.clone());

        Ok(refund)
    }
}
