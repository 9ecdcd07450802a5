use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod razorpay;
pub mod sandbox;
pub mod signature;
pub mod webhook;

pub use razorpay::RazorpayGateway;
pub use sandbox::SandboxGateway;
pub use webhook::GatewayEvent;

/// Checkout session minted at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
}

/// The external card/UPI gateway contract. Amounts are minor currency units.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;
    /// Key the client needs to open checkout.
    fn publishable_key(&self) -> &str;
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder>;
    async fn refund(&self, gateway_payment_id: &str, amount: i64) -> Result<GatewayRefund>;
}
