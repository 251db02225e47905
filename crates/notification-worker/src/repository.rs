//! 通知仓储
//!
//! 通知与模板的仓储接口及 PostgreSQL 实现。
//! list_due_retries 是重试调度器的扫描入口。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use commerce_shared::error::CommerceError;

use crate::error::Result;
use crate::models::{Notification, NotificationTemplate};

/// 通知仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepositoryTrait: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> Result<()>;

    async fn update_notification(&self, notification: &Notification) -> Result<()>;

    /// 到期待重试的失败通知（next_retry_at <= now），按到期时间排序
    async fn list_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>>;
}

/// 模板仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRepositoryTrait: Send + Sync {
    /// 按名称获取启用中的模板；停用或不存在都返回 None
    async fn get_active_template(&self, name: &str) -> Result<Option<NotificationTemplate>>;
}

/// 通知仓储 PostgreSQL 实现
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_COLUMNS: &str = r#"
    id, customer_id, notification_number, notification_type, subject, content,
    recipient, status, sent_at, delivered_at, failure_reason,
    retry_count, next_retry_at, external_id, metadata,
    order_id, payment_id, product_id,
    created_at, updated_at, is_deleted
"#;

#[async_trait]
impl NotificationRepositoryTrait for PgNotificationRepository {
    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, customer_id, notification_number, notification_type, subject, content,
                recipient, status, sent_at, delivered_at, failure_reason,
                retry_count, next_retry_at, external_id, metadata,
                order_id, payment_id, product_id,
                created_at, updated_at, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(notification.id)
        .bind(notification.customer_id)
        .bind(&notification.notification_number)
        .bind(notification.notification_type)
        .bind(&notification.subject)
        .bind(&notification.content)
        .bind(&notification.recipient)
        .bind(notification.status)
        .bind(notification.sent_at)
        .bind(notification.delivered_at)
        .bind(&notification.failure_reason)
        .bind(notification.retry_count)
        .bind(notification.next_retry_at)
        .bind(&notification.external_id)
        .bind(&notification.metadata)
        .bind(notification.order_id)
        .bind(notification.payment_id)
        .bind(notification.product_id)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .bind(notification.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(())
    }

    async fn update_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2,
                sent_at = $3,
                delivered_at = $4,
                failure_reason = $5,
                retry_count = $6,
                next_retry_at = $7,
                external_id = $8,
                updated_at = $9
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(notification.id)
        .bind(notification.status)
        .bind(notification.sent_at)
        .bind(notification.delivered_at)
        .bind(&notification.failure_reason)
        .bind(notification.retry_count)
        .bind(notification.next_retry_at)
        .bind(&notification.external_id)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(())
    }

    async fn list_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let due = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE status = 'Failed'
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= $1
              AND is_deleted = FALSE
            ORDER BY next_retry_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(due)
    }
}

/// 模板仓储 PostgreSQL 实现
pub struct PgTemplateRepository {
    pool: PgPool,
}

impl PgTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepositoryTrait for PgTemplateRepository {
    async fn get_active_template(&self, name: &str) -> Result<Option<NotificationTemplate>> {
        let template = sqlx::query_as::<_, NotificationTemplate>(
            r#"
            SELECT id, name, notification_type, subject, content, description,
                   is_active, created_at, updated_at, is_deleted
            FROM notification_templates
            WHERE name = $1 AND is_active = TRUE AND is_deleted = FALSE
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(CommerceError::from)?;

        Ok(template)
    }
}
