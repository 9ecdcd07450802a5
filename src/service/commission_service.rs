use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{CommissionRepository, OrderRepository},
    service::rate_provider::CommissionRateProvider,
};

#[derive(Debug, Clone, Serialize)]
pub struct CommissionSummary {
    pub commissions: Vec<Commission>,
    #[serde(flatten)]
    pub totals: CommissionTotals,
}

pub struct CommissionService {
    order_repo: Arc<dyn OrderRepository>,
    commission_repo: Arc<dyn CommissionRepository>,
    rates: Arc<dyn CommissionRateProvider>,
    auto_credit: bool,
}

impl CommissionService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        commission_repo: Arc<dyn CommissionRepository>,
        rates: Arc<dyn CommissionRateProvider>,
        auto_credit: bool,
    ) -> Self {
        Self {
            order_repo,
            commission_repo,
            rates,
            auto_credit,
        }
    }

    /// One line per distinct seller plus one for the delivery partner, if any.
    /// Safe to repeat: lines already on file are left untouched.
    pub async fn accrue_for_order(&self, order_id: Uuid) -> Result<Vec<Commission>> {
        let order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.payment_status != OrderPaymentStatus::Paid {
            tracing::debug!(
                order_id = %order.id,
                payment_status = order.payment_status.as_str(),
                "Skipping accrual for unpaid order"
            );
            return Ok(Vec::new());
        }

        // Resolve every rate before writing so a lookup failure leaves nothing behind.
        let mut lines = Vec::new();
        for (seller_id, subtotal) in order.seller_subtotals() {
            let rate = self.rates.seller_rate(seller_id).await?;
            lines.push(NewCommission::compute(order.id, Beneficiary::seller(seller_id), subtotal, rate));
        }
        if let Some(partner_id) = order.delivery_partner_id {
            let rate = self.rates.delivery_partner_rate().await?;
            lines.push(NewCommission::compute(
                order.id,
                Beneficiary::delivery_partner(partner_id),
                order.total_amount,
                rate,
            ));
        }

        let commissions = self.commission_repo.insert_for_order(order.id, lines).await?;
        tracing::info!(order_id = %order.id, lines = commissions.len(), "Commissions accrued");

        if self.auto_credit {
            self.commission_repo.settle_order(order.id).await?;
            return self.commission_repo.list_by_order(order.id).await;
        }

        Ok(commissions)
    }

    /// Credits the order's Pending commissions to their beneficiaries' wallets.
    pub async fn settle_order(&self, order_id: Uuid) -> Result<Vec<WalletTransaction>> {
        if self.order_repo.find_by_id(order_id).await?.is_none() {
            return Err(AppError::NotFound("Order not found".to_string()));
        }

        let credited = self.commission_repo.settle_order(order_id).await?;
        tracing::info!(order_id = %order_id, credited = credited.len(), "Commissions settled");

        Ok(credited)
    }

    pub async fn summary(&self, beneficiary: Beneficiary) -> Result<CommissionSummary> {
        let commissions = self.commission_repo.list_by_beneficiary(beneficiary).await?;
        let totals = CommissionTotals::from_commissions(&commissions);
        Ok(CommissionSummary { commissions, totals })
    }
}
