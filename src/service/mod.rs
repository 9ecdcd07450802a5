pub mod accrual_worker;
pub mod capture_service;
pub mod commission_service;
pub mod rate_provider;
pub mod refund_service;
pub mod wallet_service;
pub mod webhook_service;

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::{
    config::Settings,
    payments::PaymentGateway,
    repository::*,
};
use accrual_worker::AccrualWorker;
use capture_service::CaptureService;
use commission_service::CommissionService;
use rate_provider::CommissionRateProvider;
use refund_service::RefundService;
use wallet_service::WalletService;
use webhook_service::WebhookService;

pub struct ServiceContext {
    pub order_repo: Arc<dyn OrderRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub commission_repo: Arc<dyn CommissionRepository>,
    pub wallet_repo: Arc<dyn WalletRepository>,
    pub outbox_repo: Arc<dyn OutboxRepository>,
    pub capture_service: Arc<CaptureService>,
    pub webhook_service: Arc<WebhookService>,
    pub commission_service: Arc<CommissionService>,
    pub wallet_service: Arc<WalletService>,
    pub refund_service: Arc<RefundService>,
    pub accrual_signal: Arc<Notify>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        rates: Arc<dyn CommissionRateProvider>,
        settings: &Settings,
    ) -> Self {
        let order_repo: Arc<dyn OrderRepository> = Arc::new(SqliteOrderRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let commission_repo: Arc<dyn CommissionRepository> =
            Arc::new(SqliteCommissionRepository::new(db_pool.clone()));
        let wallet_repo: Arc<dyn WalletRepository> = Arc::new(SqliteWalletRepository::new(db_pool.clone()));
        let outbox_repo: Arc<dyn OutboxRepository> = Arc::new(SqliteOutboxRepository::new(db_pool.clone()));

        let accrual_signal = Arc::new(Notify::new());

        let capture_service = Arc::new(CaptureService::new(
            order_repo.clone(),
            payment_repo.clone(),
            gateway.clone(),
            settings.gateway.key_secret.clone(),
            accrual_signal.clone(),
        ));
        let webhook_service = Arc::new(WebhookService::new(
            order_repo.clone(),
            payment_repo.clone(),
            gateway.name(),
            settings.gateway.webhook_secret.clone(),
            accrual_signal.clone(),
        ));
        let commission_service = Arc::new(CommissionService::new(
            order_repo.clone(),
            commission_repo.clone(),
            rates,
            settings.commission.auto_credit,
        ));
        let wallet_service = Arc::new(WalletService::new(wallet_repo.clone()));
        let refund_service = Arc::new(RefundService::new(payment_repo.clone(), gateway));

        Self {
            order_repo,
            payment_repo,
            commission_repo,
            wallet_repo,
            outbox_repo,
            capture_service,
            webhook_service,
            commission_service,
            wallet_service,
            refund_service,
            accrual_signal,
            db_pool,
        }
    }

    pub fn accrual_worker(&self, settings: &Settings) -> AccrualWorker {
        AccrualWorker::new(
            self.outbox_repo.clone(),
            self.commission_service.clone(),
            self.accrual_signal.clone(),
            settings.worker.clone(),
        )
    }
}
