use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BeneficiaryType {
    Seller,
    DeliveryPartner,
}

impl BeneficiaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeneficiaryType::Seller => "Seller",
            BeneficiaryType::DeliveryPartner => "DeliveryPartner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Seller" => Some(BeneficiaryType::Seller),
            "DeliveryPartner" => Some(BeneficiaryType::DeliveryPartner),
            _ => None,
        }
    }
}

/// Seller or delivery partner entitled to wallet credits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Beneficiary {
    pub id: Uuid,
    pub kind: BeneficiaryType,
}

impl Beneficiary {
    pub fn seller(id: Uuid) -> Self {
        Self { id, kind: BeneficiaryType::Seller }
    }

    pub fn delivery_partner(id: Uuid) -> Self {
        Self { id, kind: BeneficiaryType::DeliveryPartner }
    }
}

/// Commission rate in basis points (1% = 100 bps).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionRate(u32);

impl CommissionRate {
    pub const MAX_BPS: u32 = 10_000;

    pub fn from_bps(bps: u32) -> Option<Self> {
        (bps <= Self::MAX_BPS).then_some(Self(bps))
    }

    pub fn from_percent(percent: f64) -> Option<Self> {
        if !percent.is_finite() || percent < 0.0 {
            return None;
        }
        Self::from_bps((percent * 100.0).round() as u32)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `round(amount * rate / 100)`, rounding half away from zero.
    pub fn apply(&self, amount: i64) -> i64 {
        let scaled = amount as i128 * self.0 as i128;
        let half = if scaled >= 0 { 5_000 } else { -5_000 };
        ((scaled + half) / 10_000) as i64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommissionStatus {
    Pending,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "Pending",
            CommissionStatus::Paid => "Paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(CommissionStatus::Pending),
            "Paid" => Some(CommissionStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub id: Uuid,
    pub order_id: Uuid,
    pub beneficiary_id: Uuid,
    pub beneficiary_type: BeneficiaryType,
    pub order_amount: i64,
    pub rate_bps: u32,
    pub commission_amount: i64,
    pub net_amount: i64,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    pub fn beneficiary(&self) -> Beneficiary {
        Beneficiary { id: self.beneficiary_id, kind: self.beneficiary_type }
    }
}

/// A commission line computed for one beneficiary of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommission {
    pub order_id: Uuid,
    pub beneficiary: Beneficiary,
    pub order_amount: i64,
    pub rate: CommissionRate,
    pub commission_amount: i64,
    pub net_amount: i64,
}

impl NewCommission {
    /// Sellers are owed what the platform does not keep; delivery partners are
    /// owed the fee itself.
    pub fn compute(
        order_id: Uuid,
        beneficiary: Beneficiary,
        order_amount: i64,
        rate: CommissionRate,
    ) -> Self {
        let commission_amount = rate.apply(order_amount);
        let net_amount = match beneficiary.kind {
            BeneficiaryType::Seller => order_amount - commission_amount,
            BeneficiaryType::DeliveryPartner => commission_amount,
        };

        Self {
            order_id,
            beneficiary,
            order_amount,
            rate,
            commission_amount,
            net_amount,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionTotals {
    pub total: i64,
    pub paid: i64,
    pub pending: i64,
}

impl CommissionTotals {
    pub fn from_commissions(commissions: &[Commission]) -> Self {
        commissions.iter().fold(Self::default(), |mut acc, c| {
            acc.total += c.net_amount;
            match c.status {
                CommissionStatus::Paid => acc.paid += c.net_amount,
                CommissionStatus::Pending => acc.pending += c.net_amount,
            }
            acc
        })
    }
}
