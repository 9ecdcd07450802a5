#![allow(dead_code)]

use std::sync::Arc;

use bazaar::{
    config::Settings,
    domain::{Beneficiary, CaptureOutcome, CreateOrderRequest, NewOrderItem, Order, Payment},
    payments::{sandbox::SandboxCheckout, signature, PaymentGateway, SandboxGateway},
    repository::{CommissionRepository, OrderRepository},
    service::{
        capture_service::{CheckoutSession, VerifyPaymentRequest},
        rate_provider::{CommissionRateProvider, StaticRateProvider},
        ServiceContext,
    },
};
use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<SandboxGateway>,
    pub settings: Settings,
    _dir: Option<TempDir>,
}

/// One connection keeps the in-memory database alive for the whole test.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// A WAL database on disk with several connections, so writers really race.
pub async fn file_pool(dir: &TempDir) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("bazaar.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn setup_on_disk() -> anyhow::Result<TestApp> {
    let settings = Settings::default();
    let rates = Arc::new(StaticRateProvider::from_config(&settings.commission)?);
    let dir = tempfile::tempdir()?;
    let pool = file_pool(&dir).await?;
    Ok(build(pool, settings, rates, Some(dir)))
}

pub async fn setup() -> anyhow::Result<TestApp> {
    setup_with(Settings::default()).await
}

pub async fn setup_with(settings: Settings) -> anyhow::Result<TestApp> {
    let rates = Arc::new(StaticRateProvider::from_config(&settings.commission)?);
    setup_with_rates(settings, rates).await
}

pub async fn setup_with_rates(
    settings: Settings,
    rates: Arc<dyn CommissionRateProvider>,
) -> anyhow::Result<TestApp> {
    let pool = test_pool().await?;
    Ok(build(pool, settings, rates, None))
}

fn build(
    pool: SqlitePool,
    settings: Settings,
    rates: Arc<dyn CommissionRateProvider>,
    dir: Option<TempDir>,
) -> TestApp {
    let gateway = Arc::new(SandboxGateway::new(
        settings.gateway.key_id.clone(),
        settings.gateway.key_secret.clone(),
    ));
    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();

    let ctx = Arc::new(ServiceContext::new(pool.clone(), dyn_gateway, rates, &settings));

    TestApp {
        pool,
        ctx,
        gateway,
        settings,
        _dir: dir,
    }
}

impl TestApp {
    /// One line item per `(seller, unit_price, quantity)`.
    pub async fn create_order(
        &self,
        customer: Uuid,
        lines: &[(Uuid, i64, i64)],
        delivery_partner: Option<Uuid>,
    ) -> anyhow::Result<Order> {
        let items = lines
            .iter()
            .enumerate()
            .map(|(n, (seller, price, qty))| NewOrderItem {
                product_id: Uuid::new_v4(),
                seller_id: *seller,
                product_name: format!("Product {}", n + 1),
                unit_price: *price,
                quantity: *qty,
            })
            .collect();

        Ok(self
            .ctx
            .order_repo
            .create(CreateOrderRequest {
                customer_id: customer,
                delivery_partner_id: delivery_partner,
                currency: "INR".to_string(),
                items,
            })
            .await?)
    }

    pub async fn start_checkout(&self, order: &Order) -> anyhow::Result<(CheckoutSession, SandboxCheckout)> {
        let session = self
            .ctx
            .capture_service
            .create_gateway_order(order.id, order.customer_id)
            .await?;
        let checkout = self.gateway.complete_checkout(&session.gateway_order_id)?;
        Ok((session, checkout))
    }

    pub fn verify_request(&self, order: &Order, checkout: &SandboxCheckout) -> VerifyPaymentRequest {
        VerifyPaymentRequest {
            order_id: order.id,
            gateway_order_id: checkout.gateway_order_id.clone(),
            gateway_payment_id: checkout.gateway_payment_id.clone(),
            signature: checkout.signature.clone(),
            method: Some("upi".to_string()),
        }
    }

    /// Full client-side checkout: mint, pay, verify.
    pub async fn pay(&self, order: &Order) -> anyhow::Result<Payment> {
        let (_, checkout) = self.start_checkout(order).await?;
        let outcome = self
            .ctx
            .capture_service
            .verify_and_capture(order.customer_id, self.verify_request(order, &checkout))
            .await?;

        match outcome {
            CaptureOutcome::Captured(payment) => Ok(payment),
            CaptureOutcome::AlreadyCaptured(_) => anyhow::bail!("expected a fresh capture"),
        }
    }

    /// Pays, accrues and settles an order with a single seller line, leaving
    /// `subtotal` minus commission in the seller's wallet.
    pub async fn fund_seller(&self, seller: Uuid, subtotal: i64) -> anyhow::Result<(Order, Payment)> {
        let order = self.create_order(Uuid::new_v4(), &[(seller, subtotal, 1)], None).await?;
        let payment = self.pay(&order).await?;
        self.ctx.commission_service.accrue_for_order(order.id).await?;
        self.ctx.commission_service.settle_order(order.id).await?;
        Ok((order, payment))
    }

    pub async fn order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.ctx
            .order_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("order {} missing", id))
    }

    pub async fn available(&self, beneficiary: Beneficiary) -> anyhow::Result<i64> {
        Ok(self.ctx.wallet_service.balance(beneficiary).await?.available)
    }

    pub async fn commission_count(&self, order_id: Uuid) -> anyhow::Result<usize> {
        Ok(self.ctx.commission_repo.list_by_order(order_id).await?.len())
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?)
    }

    pub fn sign_webhook(&self, body: &str) -> String {
        signature::sign(body.as_bytes(), self.settings.gateway.webhook_secret.expose_secret()).unwrap()
    }

    /// Signs and ingests a webhook body.
    pub async fn deliver(&self, body: &str) -> bazaar::error::Result<bazaar::service::webhook_service::WebhookOutcome> {
        let signature = self.sign_webhook(body);
        self.ctx.webhook_service.ingest(body, Some(&signature)).await
    }
}

pub fn captured_event(gateway_order_id: &str, gateway_payment_id: &str, amount: i64, order_ref: Option<Uuid>) -> String {
    let notes = match order_ref {
        Some(id) => json!({ "order_id": id.to_string() }),
        None => json!([]),
    };
    json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": gateway_payment_id,
            "order_id": gateway_order_id,
            "amount": amount,
            "currency": "INR",
            "status": "captured",
            "method": "card",
            "notes": notes
        }}}
    })
    .to_string()
}

pub fn failed_event(gateway_order_id: &str, gateway_payment_id: &str, amount: i64) -> String {
    json!({
        "entity": "event",
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": gateway_payment_id,
            "order_id": gateway_order_id,
            "amount": amount,
            "currency": "INR",
            "status": "failed"
        }}}
    })
    .to_string()
}

pub fn refund_event(gateway_payment_id: &str, refund_id: &str, amount: i64) -> String {
    json!({
        "entity": "event",
        "event": "refund.created",
        "payload": { "refund": { "entity": {
            "id": refund_id,
            "payment_id": gateway_payment_id,
            "amount": amount,
            "currency": "INR"
        }}}
    })
    .to_string()
}
