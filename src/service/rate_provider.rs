use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::CommissionConfig,
    domain::CommissionRate,
    error::{AppError, Result},
};

/// Source of commission rates. Lookups may be remote and may fail; callers
/// retry through the accrual outbox.
#[async_trait]
pub trait CommissionRateProvider: Send + Sync {
    async fn seller_rate(&self, seller_id: Uuid) -> Result<CommissionRate>;
    async fn delivery_partner_rate(&self) -> Result<CommissionRate>;
}

/// Rates read once from configuration.
pub struct StaticRateProvider {
    default_seller_rate: CommissionRate,
    delivery_partner_rate: CommissionRate,
    seller_rates: HashMap<Uuid, CommissionRate>,
}

fn rate(percent: f64, what: &str) -> Result<CommissionRate> {
    CommissionRate::from_percent(percent)
        .ok_or_else(|| AppError::Validation(format!("Invalid {} commission rate: {}", what, percent)))
}

impl StaticRateProvider {
    pub fn from_config(config: &CommissionConfig) -> Result<Self> {
        let seller_rates = config
            .seller_rates
            .iter()
            .map(|(seller, percent)| Ok((*seller, rate(*percent, "seller")?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            default_seller_rate: rate(config.default_seller_rate, "default seller")?,
            delivery_partner_rate: rate(config.delivery_partner_rate, "delivery partner")?,
            seller_rates,
        })
    }
}

#[async_trait]
impl CommissionRateProvider for StaticRateProvider {
    async fn seller_rate(&self, seller_id: Uuid) -> Result<CommissionRate> {
        Ok(self
            .seller_rates
            .get(&seller_id)
            .copied()
            .unwrap_or(self.default_seller_rate))
    }

    async fn delivery_partner_rate(&self) -> Result<CommissionRate> {
        Ok(self.delivery_partner_rate)
    }
}
