//! 订单仓储
//!
//! 定义仓储接口并提供 PostgreSQL 实现。服务层依赖接口而非具体实现，
//! 便于 mock 测试。订单、订单项与地址的写入在同一事务内完成。

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use commerce_shared::error::CommerceError;

use crate::error::Result;
use crate::models::{Order, OrderAddress, OrderItem};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 原子写入订单、订单项与两类地址
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        addresses: &[OrderAddress],
    ) -> Result<()>;

    /// 按 ID 获取订单，软删除的订单视为不存在
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// 覆盖更新订单可变字段
    async fn update_order(&self, order: &Order) -> Result<()>;
}

/// 订单仓储 PostgreSQL 实现
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryTrait for PgOrderRepository {
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        addresses: &[OrderAddress],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(CommerceError::from)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, order_number, status,
                total_amount, tax_amount, shipping_amount, discount_amount,
                order_date, shipped_date, delivered_date, notes,
                created_at, updated_at, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(order.tax_amount)
        .bind(order.shipping_amount)
        .bind(order.discount_amount)
        .bind(order.order_date)
        .bind(order.shipped_date)
        .bind(order.delivered_date)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.is_deleted)
        .execute(&mut *tx)
        .await
        .map_err(CommerceError::from)?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name,
                    quantity, unit_price, total_price, product_image_url,
                    created_at, updated_at, is_deleted
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(&item.product_image_url)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.is_deleted)
            .execute(&mut *tx)
            .await
            .map_err(CommerceError::from)?;
        }

        for address in addresses {
            sqlx::query(
                r#"
                INSERT INTO order_addresses (
                    id, order_id, address_type,
                    first_name, last_name, street_address, street_address2,
                    city, state, postal_code, country, phone_number, email,
                    created_at, updated_at, is_deleted
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(address.id)
            .bind(address.order_id)
            .bind(address.address_type)
            .bind(&address.first_name)
            .bind(&address.last_name)
            .bind(&address.street_address)
            .bind(&address.street_address2)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.postal_code)
            .bind(&address.country)
            .bind(&address.phone_number)
            .bind(&address.email)
            .bind(address.created_at)
            .bind(address.updated_at)
            .bind(address.is_deleted)
            .execute(&mut *tx)
            .await
            .map_err(CommerceError::from)?;
        }

        tx.commit().await.map_err(CommerceError::from)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, order_number, status,
                   total_amount, tax_amount, shipping_amount, discount_amount,
                   order_date, shipped_date, delivered_date, notes,
                   created_at, updated_at, is_deleted
            FROM orders
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(order)
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                total_amount = $3,
                tax_amount = $4,
                shipping_amount = $5,
                discount_amount = $6,
                shipped_date = $7,
                delivered_date = $8,
                notes = $9,
                updated_at = $10
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(order.tax_amount)
        .bind(order.shipping_amount)
        .bind(order.discount_amount)
        .bind(order.shipped_date)
        .bind(order.delivered_date)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(())
    }
}
