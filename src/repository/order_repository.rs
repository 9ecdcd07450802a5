use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateOrderRequest, Order, OrderItem, OrderPaymentStatus, OrderStatus},
    error::{AppError, Result},
    repository::{invalid_column, parse_opt_uuid, parse_uuid, to_utc, OrderRepository},
};

#[derive(FromRow)]
struct OrderRow {
    id: String,
    customer_id: String,
    delivery_partner_id: Option<String>,
    total_amount: i64,
    currency: String,
    status: String,
    payment_status: String,
    gateway_payment_id: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct OrderItemRow {
    id: String,
    product_id: String,
    seller_id: String,
    product_name: String,
    unit_price: i64,
    quantity: i64,
}

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: parse_uuid(&row.id)?,
            customer_id: parse_uuid(&row.customer_id)?,
            delivery_partner_id: parse_opt_uuid(row.delivery_partner_id)?,
            items,
            total_amount: row.total_amount,
            currency: row.currency,
            status: OrderStatus::from_str(&row.status)
                .ok_or_else(|| invalid_column("order status", &row.status))?,
            payment_status: OrderPaymentStatus::from_str(&row.payment_status)
                .ok_or_else(|| invalid_column("order payment status", &row.payment_status))?,
            gateway_payment_id: row.gateway_payment_id,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn row_to_item(row: OrderItemRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: parse_uuid(&row.id)?,
            product_id: parse_uuid(&row.product_id)?,
            seller_id: parse_uuid(&row.seller_id)?,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
        })
    }

    async fn load_items(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, product_id, seller_id, product_name, unit_price, quantity
            FROM order_items
            WHERE order_id = ?
            ORDER BY rowid
            "#
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn create(&self, order: CreateOrderRequest) -> Result<Order> {
        if order.items.is_empty() {
            return Err(AppError::Validation("Order must contain at least one item".to_string()));
        }
        if order.items.iter().any(|i| i.quantity <= 0 || i.unit_price < 0) {
            return Err(AppError::Validation("Order items need a positive quantity and price".to_string()));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();
        let total_amount = order.total_amount();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, delivery_partner_id, total_amount, currency,
                status, payment_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 'Pending', 'Pending', ?, ?)
            "#
        )
        .bind(&id_str)
        .bind(order.customer_id.to_string())
        .bind(order.delivery_partner_id.map(|p| p.to_string()))
        .bind(total_amount)
        .bind(&order.currency)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, seller_id, product_name, unit_price, quantity
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id_str)
            .bind(item.product_id.to_string())
            .bind(item.seller_id.to_string())
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created order".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, delivery_partner_id, total_amount, currency,
                   status, payment_status, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE id = ?
            "#
        )
        .bind(&id_str)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let items = self.load_items(&id_str).await?;
                Ok(Some(Self::row_to_order(r, items)?))
            }
            None => Ok(None),
        }
    }

    async fn assign_delivery_partner(&self, id: Uuid, partner_id: Uuid) -> Result<Order> {
        let result = sqlx::query(
            "UPDATE orders SET delivery_partner_id = ?, updated_at = ? WHERE id = ?"
        )
        .bind(partner_id.to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated order".to_string())
        })
    }
}
