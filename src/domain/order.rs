use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub delivery_partner_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    /// Minor currency units.
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of each seller's line items, in first-seen order.
    pub fn seller_subtotals(&self) -> Vec<(Uuid, i64)> {
        let mut subtotals: Vec<(Uuid, i64)> = Vec::new();
        for item in &self.items {
            match subtotals.iter_mut().find(|(seller, _)| *seller == item.seller_id) {
                Some((_, amount)) => *amount += item.line_total(),
                None => subtotals.push((item.seller_id, item.line_total())),
            }
        }
        subtotals
    }
}

/// Product, seller and price as they were when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Received,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Received => "Received",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "OutForDelivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Received" => Some(OrderStatus::Received),
            "Processing" => Some(OrderStatus::Processing),
            "Shipped" => Some(OrderStatus::Shipped),
            "OutForDelivery" => Some(OrderStatus::OutForDelivery),
            "Delivered" => Some(OrderStatus::Delivered),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Moves Pending -> Paid -> Refunded or Pending -> Failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "Pending",
            OrderPaymentStatus::Paid => "Paid",
            OrderPaymentStatus::Failed => "Failed",
            OrderPaymentStatus::Refunded => "Refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderPaymentStatus::Pending),
            "Paid" => Some(OrderPaymentStatus::Paid),
            "Failed" => Some(OrderPaymentStatus::Failed),
            "Refunded" => Some(OrderPaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub delivery_partner_id: Option<Uuid>,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
}

impl CreateOrderRequest {
    pub fn total_amount(&self) -> i64 {
        self.items.iter().map(|i| i.unit_price * i.quantity).sum()
    }
}
