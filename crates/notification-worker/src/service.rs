//! 通知发送服务
//!
//! send 在同一次调用里完成落库与投递：Pending 落库 -> 渠道投递 ->
//! Sent/Failed 回写。投递失败不是调用方错误，结果体现在返回的
//! 通知状态上，同时把通知排进重试调度。
//! send_from_template 只渲染并登记 Pending，不触发渠道投递。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use commerce_shared::entity::generate_reference;
use commerce_shared::error::CommerceError;
use commerce_shared::retry::RetryPolicy;

use crate::channels::ChannelAdapter;
use crate::error::{NotificationError, Result};
use crate::models::{Notification, NotificationStatus, NotificationTemplate, NotificationType};
use crate::repository::{NotificationRepositoryTrait, TemplateRepositoryTrait};
use crate::templates::render;

// ---------------------------------------------------------------------------
// 命令定义
// ---------------------------------------------------------------------------

/// 业务关联标识
#[derive(Debug, Clone, Default)]
pub struct CorrelationIds {
    pub order_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

/// 发送通知命令
#[derive(Debug, Clone)]
pub struct SendNotificationCommand {
    pub customer_id: Uuid,
    pub notification_type: NotificationType,
    pub subject: String,
    pub content: String,
    pub recipient: String,
    pub correlation: CorrelationIds,
    pub metadata: Option<String>,
}

/// 发送模板通知命令
#[derive(Debug, Clone)]
pub struct SendTemplateNotificationCommand {
    pub customer_id: Uuid,
    pub template_name: String,
    pub recipient: String,
    pub variables: HashMap<String, String>,
    pub correlation: CorrelationIds,
}

// ---------------------------------------------------------------------------
// NotificationService
// ---------------------------------------------------------------------------

/// 通知服务
///
/// 渠道适配器按通知类型注册；没有注册适配器的类型无法发送。
pub struct NotificationService {
    repo: Arc<dyn NotificationRepositoryTrait>,
    templates: Arc<dyn TemplateRepositoryTrait>,
    adapters: HashMap<NotificationType, Arc<dyn ChannelAdapter>>,
    retry_policy: RetryPolicy,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepositoryTrait>,
        templates: Arc<dyn TemplateRepositoryTrait>,
        adapters: HashMap<NotificationType, Arc<dyn ChannelAdapter>>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            templates,
            adapters,
            retry_policy,
        }
    }

    /// 发送通知
    ///
    /// 状态转移在本次调用内完成；投递失败的通知带着 Failed 状态和
    /// 下次重试时间正常返回。没有适配器的类型落库为 Failed 并报
    /// UnsupportedType 错误。
    #[instrument(skip(self, command), fields(customer_id = %command.customer_id))]
    pub async fn send(&self, command: SendNotificationCommand) -> Result<Notification> {
        let now = Utc::now();
        let mut notification = Notification {
            id: Uuid::new_v4(),
            customer_id: command.customer_id,
            notification_number: generate_reference("NOT"),
            notification_type: command.notification_type,
            subject: command.subject,
            content: command.content,
            recipient: command.recipient,
            status: NotificationStatus::Pending,
            sent_at: None,
            delivered_at: None,
            failure_reason: None,
            retry_count: 0,
            next_retry_at: None,
            external_id: None,
            metadata: command.metadata,
            order_id: command.correlation.order_id,
            payment_id: command.correlation.payment_id,
            product_id: command.correlation.product_id,
            created_at: now,
            updated_at: None,
            is_deleted: false,
        };

        self.repo.create_notification(&notification).await?;

        let Some(adapter) = self.adapters.get(&notification.notification_type) else {
            let now = Utc::now();
            notification.status = NotificationStatus::Failed;
            notification.failure_reason = Some(format!(
                "不支持的通知类型: {}",
                notification.notification_type
            ));
            notification.updated_at = Some(now);
            self.repo.update_notification(&notification).await?;

            return Err(NotificationError::UnsupportedType {
                notification_type: notification.notification_type.to_string(),
            });
        };

        match adapter
            .deliver(
                &notification.recipient,
                &notification.subject,
                &notification.content,
            )
            .await
        {
            Ok(external_id) => {
                let now = Utc::now();
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(now);
                notification.external_id = Some(external_id).filter(|id| !id.is_empty());
                notification.updated_at = Some(now);

                info!(
                    notification_id = %notification.id,
                    notification_number = %notification.notification_number,
                    external_id = ?notification.external_id,
                    "通知已发送"
                );
            }
            Err(e) => {
                let now = Utc::now();
                notification.status = NotificationStatus::Failed;
                notification.failure_reason = Some(e.to_string());
                notification.next_retry_at = Some(self.next_retry_time(now, 0));
                notification.updated_at = Some(now);

                warn!(
                    notification_id = %notification.id,
                    error = %e,
                    next_retry_at = ?notification.next_retry_at,
                    "通知发送失败，已排入重试"
                );
            }
        }

        self.repo.update_notification(&notification).await?;
        Ok(notification)
    }

    /// 按模板登记通知
    ///
    /// 查启用中的模板并做 `{variableName}` 字面替换，落库为 Pending。
    /// 只登记通知内容，不触发渠道投递。
    #[instrument(skip(self, command), fields(template = %command.template_name))]
    pub async fn send_from_template(
        &self,
        command: SendTemplateNotificationCommand,
    ) -> Result<Notification> {
        let template = self
            .templates
            .get_active_template(&command.template_name)
            .await?
            .ok_or_else(|| {
                NotificationError::Shared(CommerceError::NotFound {
                    entity: "NotificationTemplate".to_string(),
                    id: command.template_name.clone(),
                })
            })?;

        let subject = render(&template.subject, &command.variables);
        let content = render(&template.content, &command.variables);

        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            customer_id: command.customer_id,
            notification_number: generate_reference("NOT"),
            notification_type: template.notification_type,
            subject,
            content,
            recipient: command.recipient,
            status: NotificationStatus::Pending,
            sent_at: None,
            delivered_at: None,
            failure_reason: None,
            retry_count: 0,
            next_retry_at: None,
            external_id: None,
            metadata: None,
            order_id: command.correlation.order_id,
            payment_id: command.correlation.payment_id,
            product_id: command.correlation.product_id,
            created_at: now,
            updated_at: None,
            is_deleted: false,
        };

        self.repo.create_notification(&notification).await?;

        info!(
            notification_id = %notification.id,
            template = %command.template_name,
            "模板通知已登记"
        );

        Ok(notification)
    }

    /// 按名称查启用中的模板
    pub async fn active_template(&self, name: &str) -> Result<Option<NotificationTemplate>> {
        self.templates.get_active_template(name).await
    }

    /// 重试一条失败的通知（重试调度器调用）
    ///
    /// 成功则转 Sent 并清空重试排期；仍失败时按指数退避排下一次，
    /// 重试次数耗尽后清空 next_retry_at，通知停留在 Failed 终态。
    pub async fn retry_failed(&self, mut notification: Notification) -> Result<Notification> {
        let now = Utc::now();

        let Some(adapter) = self.adapters.get(&notification.notification_type) else {
            // 没有适配器的类型不再调度
            notification.next_retry_at = None;
            notification.updated_at = Some(now);
            self.repo.update_notification(&notification).await?;
            return Ok(notification);
        };

        notification.retry_count += 1;

        match adapter
            .deliver(
                &notification.recipient,
                &notification.subject,
                &notification.content,
            )
            .await
        {
            Ok(external_id) => {
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(now);
                notification.external_id = Some(external_id).filter(|id| !id.is_empty());
                notification.failure_reason = None;
                notification.next_retry_at = None;

                info!(
                    notification_id = %notification.id,
                    retry_count = notification.retry_count,
                    "通知重试成功"
                );
            }
            Err(e) => {
                notification.failure_reason = Some(e.to_string());
                let attempt = notification.retry_count.max(0) as u32;
                if self.retry_policy.should_retry(attempt) {
                    notification.next_retry_at = Some(self.next_retry_time(now, attempt));
                } else {
                    notification.next_retry_at = None;
                    warn!(
                        notification_id = %notification.id,
                        retry_count = notification.retry_count,
                        error = %e,
                        "重试次数耗尽，通知终态失败"
                    );
                }
            }
        }

        notification.updated_at = Some(now);
        self.repo.update_notification(&notification).await?;
        Ok(notification)
    }

    fn next_retry_time(&self, now: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        let delay = self.retry_policy.delay_for_attempt(attempt);
        now + chrono::Duration::seconds(delay.as_secs() as i64)
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{DeliveryError, MockChannelAdapter};
    use crate::repository::{MockNotificationRepositoryTrait, MockTemplateRepositoryTrait};

    fn adapters_with(
        notification_type: NotificationType,
        adapter: MockChannelAdapter,
    ) -> HashMap<NotificationType, Arc<dyn ChannelAdapter>> {
        HashMap::from([(
            notification_type,
            Arc::new(adapter) as Arc<dyn ChannelAdapter>,
        )])
    }

    fn send_command(notification_type: NotificationType) -> SendNotificationCommand {
        SendNotificationCommand {
            customer_id: Uuid::new_v4(),
            notification_type,
            subject: "订单已确认".to_string(),
            content: "您的订单已确认".to_string(),
            recipient: "ann@example.com".to_string(),
            correlation: CorrelationIds::default(),
            metadata: None,
        }
    }

    fn active_template(name: &str, subject: &str, content: &str) -> NotificationTemplate {
        NotificationTemplate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            notification_type: NotificationType::Email,
            subject: subject.to_string(),
            content: content.to_string(),
            description: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
        }
    }

    fn failed_notification(retry_count: i32) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            notification_number: "NOT-20250115-1A2B3C4D".to_string(),
            notification_type: NotificationType::Email,
            subject: "订单已确认".to_string(),
            content: "您的订单已确认".to_string(),
            recipient: "ann@example.com".to_string(),
            status: NotificationStatus::Failed,
            sent_at: None,
            delivered_at: None,
            failure_reason: Some("HTTP 503".to_string()),
            retry_count,
            next_retry_at: Some(Utc::now()),
            external_id: None,
            metadata: None,
            order_id: None,
            payment_id: None,
            product_id: None,
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn test_send_success_transitions_to_sent_in_same_call() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_create_notification()
            .withf(|n| {
                n.status == NotificationStatus::Pending && n.notification_number.starts_with("NOT-")
            })
            .returning(|_| Ok(()));
        repo.expect_update_notification()
            .withf(|n| {
                n.status == NotificationStatus::Sent
                    && n.sent_at.is_some()
                    && n.external_id.as_deref() == Some("msg-1")
            })
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .returning(|_, _, _| Ok("msg-1".to_string()));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        let notification = service.send(send_command(NotificationType::Email)).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Sent);
        assert_eq!(notification.external_id.as_deref(), Some("msg-1"));
    }

    /// 投递失败不是调用方错误：返回 Failed 状态并排入重试
    #[tokio::test]
    async fn test_send_failure_returns_failed_notification_with_retry_scheduled() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_create_notification().returning(|_| Ok(()));
        repo.expect_update_notification()
            .withf(|n| n.status == NotificationStatus::Failed && n.next_retry_at.is_some())
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .returning(|_, _, _| Err(DeliveryError::Provider("HTTP 503".to_string())));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        let notification = service.send(send_command(NotificationType::Email)).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Failed);
        assert!(notification.failure_reason.as_deref().unwrap().contains("HTTP 503"));
        assert!(notification.next_retry_at.is_some());
        assert_eq!(notification.retry_count, 0);
    }

    /// 没有注册适配器的类型：Failed 落库并报 UnsupportedType
    #[tokio::test]
    async fn test_send_unsupported_type_persists_failed_and_errors() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_create_notification().returning(|_| Ok(()));
        repo.expect_update_notification()
            .withf(|n| n.status == NotificationStatus::Failed)
            .returning(|_| Ok(()));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            HashMap::new(),
            RetryPolicy::default(),
        );

        let result = service.send(send_command(NotificationType::Push)).await;
        assert!(matches!(
            result,
            Err(NotificationError::UnsupportedType { .. })
        ));
    }

    /// 模板路径只登记 Pending，不触碰渠道适配器
    #[tokio::test]
    async fn test_send_from_template_records_pending_without_dispatch() {
        let mut templates = MockTemplateRepositoryTrait::new();
        templates.expect_get_active_template().returning(|_| {
            Ok(Some(active_template(
                "order-shipped",
                "订单已发货",
                "Hello {name}, order {orderId} shipped",
            )))
        });

        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_create_notification()
            .withf(|n| {
                n.status == NotificationStatus::Pending
                    && n.content == "Hello Ann, order {orderId} shipped"
            })
            .returning(|_| Ok(()));
        repo.expect_update_notification().never();

        let mut adapter = MockChannelAdapter::new();
        adapter.expect_deliver().never();

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(templates),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        let notification = service
            .send_from_template(SendTemplateNotificationCommand {
                customer_id: Uuid::new_v4(),
                template_name: "order-shipped".to_string(),
                recipient: "ann@example.com".to_string(),
                variables: HashMap::from([("name".to_string(), "Ann".to_string())]),
                correlation: CorrelationIds::default(),
            })
            .await
            .unwrap();

        assert_eq!(notification.status, NotificationStatus::Pending);
        // 变量表里没有 orderId，占位符原样保留
        assert_eq!(notification.content, "Hello Ann, order {orderId} shipped");
        assert!(notification.sent_at.is_none());
    }

    #[tokio::test]
    async fn test_send_from_template_missing_or_inactive_is_not_found() {
        let mut templates = MockTemplateRepositoryTrait::new();
        templates
            .expect_get_active_template()
            .returning(|_| Ok(None));

        let service = NotificationService::new(
            Arc::new(MockNotificationRepositoryTrait::new()),
            Arc::new(templates),
            HashMap::new(),
            RetryPolicy::default(),
        );

        let result = service
            .send_from_template(SendTemplateNotificationCommand {
                customer_id: Uuid::new_v4(),
                template_name: "missing".to_string(),
                recipient: "ann@example.com".to_string(),
                variables: HashMap::new(),
                correlation: CorrelationIds::default(),
            })
            .await;

        assert!(matches!(
            result,
            Err(NotificationError::Shared(CommerceError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_retry_failed_success_transitions_to_sent() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_update_notification()
            .withf(|n| {
                n.status == NotificationStatus::Sent
                    && n.retry_count == 1
                    && n.next_retry_at.is_none()
                    && n.failure_reason.is_none()
            })
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .returning(|_, _, _| Ok("msg-retry".to_string()));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        let retried = service.retry_failed(failed_notification(0)).await.unwrap();
        assert_eq!(retried.status, NotificationStatus::Sent);
        assert_eq!(retried.retry_count, 1);
    }

    #[tokio::test]
    async fn test_retry_failed_below_cap_schedules_next_attempt() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_update_notification()
            .withf(|n| n.status == NotificationStatus::Failed && n.next_retry_at.is_some())
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .returning(|_, _, _| Err(DeliveryError::Transport("timeout".to_string())));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        let retried = service.retry_failed(failed_notification(0)).await.unwrap();
        assert_eq!(retried.status, NotificationStatus::Failed);
        assert_eq!(retried.retry_count, 1);
        assert!(retried.next_retry_at.is_some());
    }

    /// 达到重试上限后不再排期：next_retry_at 清空，通知停留在 Failed
    #[tokio::test]
    async fn test_retry_failed_at_cap_becomes_terminal() {
        let mut repo = MockNotificationRepositoryTrait::new();
        repo.expect_update_notification()
            .withf(|n| {
                n.status == NotificationStatus::Failed
                    && n.retry_count == 3
                    && n.next_retry_at.is_none()
            })
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .returning(|_, _, _| Err(DeliveryError::Transport("timeout".to_string())));

        let service = NotificationService::new(
            Arc::new(repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            adapters_with(NotificationType::Email, adapter),
            RetryPolicy::default(),
        );

        // 已执行过 2 次重试，本次是第 3 次（默认上限 3）
        let retried = service.retry_failed(failed_notification(2)).await.unwrap();
        assert_eq!(retried.retry_count, 3);
        assert!(retried.next_retry_at.is_none());
    }
}
