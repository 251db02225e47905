//! 失败通知重试调度器
//!
//! 周期性扫描 next_retry_at 到期的 Failed 通知并重新投递。
//! 退避与次数上限由 NotificationService::retry_failed 维护；
//! 调度器只负责按时扫描与逐条驱动。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::repository::NotificationRepositoryTrait;
use crate::service::NotificationService;

/// 单轮扫描最多处理的通知条数
const SWEEP_BATCH_SIZE: i64 = 100;

/// 重试调度器
pub struct RetryScheduler {
    repo: Arc<dyn NotificationRepositoryTrait>,
    service: Arc<NotificationService>,
    interval: Duration,
}

impl RetryScheduler {
    pub fn new(
        repo: Arc<dyn NotificationRepositoryTrait>,
        service: Arc<NotificationService>,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            service,
            interval,
        }
    }

    /// 运行调度循环直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_seconds = self.interval.as_secs(), "重试调度器已启动");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，重试调度器退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "重试扫描失败");
                    }
                }
            }
        }
    }

    /// 执行一轮扫描
    ///
    /// 单条通知的重试失败不中断本轮其余通知。
    pub async fn sweep(&self) -> Result<usize> {
        let due = self.repo.list_due_retries(Utc::now(), SWEEP_BATCH_SIZE).await?;
        if due.is_empty() {
            return Ok(0);
        }

        debug!(count = due.len(), "扫描到待重试通知");

        let mut retried = 0;
        for notification in due {
            let notification_id = notification.id;
            match self.service.retry_failed(notification).await {
                Ok(_) => retried += 1,
                Err(e) => {
                    error!(
                        notification_id = %notification_id,
                        error = %e,
                        "单条通知重试驱动失败"
                    );
                }
            }
        }

        Ok(retried)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelAdapter, MockChannelAdapter};
    use crate::models::{Notification, NotificationStatus, NotificationType};
    use crate::repository::{MockNotificationRepositoryTrait, MockTemplateRepositoryTrait};
    use commerce_shared::retry::RetryPolicy;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn due_notification() -> Notification {
        Notification {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            notification_number: "NOT-20250115-AAAA1111".to_string(),
            notification_type: NotificationType::Email,
            subject: "订单已确认".to_string(),
            content: "您的订单已确认".to_string(),
            recipient: "ann@example.com".to_string(),
            status: NotificationStatus::Failed,
            sent_at: None,
            delivered_at: None,
            failure_reason: Some("HTTP 503".to_string()),
            retry_count: 0,
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
    async fn test_sweep_retries_each_due_notification() {
        let mut scan_repo = MockNotificationRepositoryTrait::new();
        scan_repo
            .expect_list_due_retries()
            .returning(|_, _| Ok(vec![due_notification(), due_notification()]));

        let mut service_repo = MockNotificationRepositoryTrait::new();
        service_repo
            .expect_update_notification()
            .times(2)
            .returning(|_| Ok(()));

        let mut adapter = MockChannelAdapter::new();
        adapter
            .expect_deliver()
            .times(2)
            .returning(|_, _, _| Ok("msg-retry".to_string()));

        let service = Arc::new(NotificationService::new(
            Arc::new(service_repo),
            Arc::new(MockTemplateRepositoryTrait::new()),
            HashMap::from([(
                NotificationType::Email,
                Arc::new(adapter) as Arc<dyn ChannelAdapter>,
            )]),
            RetryPolicy::default(),
        ));

        let scheduler = RetryScheduler::new(
            Arc::new(scan_repo),
            service,
            Duration::from_secs(30),
        );

        let retried = scheduler.sweep().await.unwrap();
        assert_eq!(retried, 2);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_due_is_a_noop() {
        let mut scan_repo = MockNotificationRepositoryTrait::new();
        scan_repo
            .expect_list_due_retries()
            .returning(|_, _| Ok(Vec::new()));

        let service = Arc::new(NotificationService::new(
            Arc::new(MockNotificationRepositoryTrait::new()),
            Arc::new(MockTemplateRepositoryTrait::new()),
            HashMap::new(),
            RetryPolicy::default(),
        ));

        let scheduler = RetryScheduler::new(
            Arc::new(scan_repo),
            service,
            Duration::from_secs(30),
        );

        let retried = scheduler.sweep().await.unwrap();
        assert_eq!(retried, 0);
    }
}
