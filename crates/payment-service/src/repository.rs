//! 支付仓储
//!
//! 定义仓储接口并提供 PostgreSQL 实现，服务层依赖接口以支持 mock 测试。

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use commerce_shared::error::CommerceError;

use crate::error::Result;
use crate::models::Payment;

/// 支付仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepositoryTrait: Send + Sync {
    async fn create_payment(&self, payment: &Payment) -> Result<()>;

    /// 按 ID 获取支付，软删除的记录视为不存在
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>>;

    async fn update_payment(&self, payment: &Payment) -> Result<()>;
}

/// 支付仓储 PostgreSQL 实现
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PgPaymentRepository {
    async fn create_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, payment_number, amount, currency, payment_method,
                status, transaction_id, description, failure_reason, processed_at,
                refunded_at, refund_amount, refund_reason,
                gateway_payment_intent_id, gateway_customer_id, gateway_refund_id,
                created_at, updated_at, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.payment_number)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(payment.status)
        .bind(&payment.transaction_id)
        .bind(&payment.description)
        .bind(&payment.failure_reason)
        .bind(payment.processed_at)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount)
        .bind(&payment.refund_reason)
        .bind(&payment.gateway_payment_intent_id)
        .bind(&payment.gateway_customer_id)
        .bind(&payment.gateway_refund_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, payment_number, amount, currency, payment_method,
                   status, transaction_id, description, failure_reason, processed_at,
                   refunded_at, refund_amount, refund_reason,
                   gateway_payment_intent_id, gateway_customer_id, gateway_refund_id,
                   created_at, updated_at, is_deleted
            FROM payments
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(payment)
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                transaction_id = $3,
                failure_reason = $4,
                processed_at = $5,
                refunded_at = $6,
                refund_amount = $7,
                refund_reason = $8,
                gateway_payment_intent_id = $9,
                gateway_customer_id = $10,
                gateway_refund_id = $11,
                updated_at = $12
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(payment.id)
        .bind(payment.status)
        .bind(&payment.transaction_id)
        .bind(&payment.failure_reason)
        .bind(payment.processed_at)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount)
        .bind(&payment.refund_reason)
        .bind(&payment.gateway_payment_intent_id)
        .bind(&payment.gateway_customer_id)
        .bind(&payment.gateway_refund_id)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(())
    }
}
