//! 通知服务入口
//!
//! 装配仓储、渠道适配器、通知服务、订单事件消费与重试调度器，
//! 通过 watch 通道做优雅关闭：收到 Ctrl-C 后广播关闭信号，
//! 等消费循环与调度器自然退出。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use commerce_shared::channel::MessageSubscriber;
use commerce_shared::config::AppConfig;
use commerce_shared::database::Database;
use commerce_shared::kafka::KafkaSubscriber;
use commerce_shared::observability;
use commerce_shared::retry::RetryPolicy;

use notification_worker::channels::{ChannelAdapter, SendGridMailer, TwilioTexter};
use notification_worker::consumer::OrderEventsConsumer;
use notification_worker::directory::StaticDirectory;
use notification_worker::models::NotificationType;
use notification_worker::repository::{PgNotificationRepository, PgTemplateRepository};
use notification_worker::retry::RetryScheduler;
use notification_worker::service::NotificationService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("notification-worker").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    observability::init(&config.observability)?;

    info!("Starting notification-worker...");
    info!(environment = %config.environment, "Configuration loaded");

    let db = Database::connect(&config.database).await?;
    sqlx::migrate!().run(db.pool()).await?;
    info!("Database connection established");

    let repo = Arc::new(PgNotificationRepository::new(db.pool().clone()));
    let templates = Arc::new(PgTemplateRepository::new(db.pool().clone()));

    let mut adapters: HashMap<NotificationType, Arc<dyn ChannelAdapter>> = HashMap::new();
    adapters.insert(
        NotificationType::Email,
        Arc::new(SendGridMailer::new(config.email.clone())),
    );
    adapters.insert(
        NotificationType::Sms,
        Arc::new(TwilioTexter::new(config.sms.clone())),
    );

    let retry_policy = RetryPolicy::from_config(&config.notification_retry);
    let service = Arc::new(NotificationService::new(
        repo.clone(),
        templates,
        adapters,
        retry_policy,
    ));
    info!("Notification service initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 重试调度器
    let scheduler = RetryScheduler::new(
        repo.clone(),
        service.clone(),
        Duration::from_secs(config.notification_retry.sweep_interval_seconds),
    );
    let scheduler_shutdown = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    // 订单事件消费
    let subscriber: Arc<dyn MessageSubscriber> =
        Arc::new(KafkaSubscriber::new(&config.kafka, Some("order-events"))?);
    let consumer = OrderEventsConsumer::new(service.clone(), Arc::new(StaticDirectory::with_defaults()));
    let consumer_shutdown = shutdown_rx.clone();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(subscriber, consumer_shutdown).await {
            error!(error = %e, "订单事件消费循环异常退出");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down notification-worker");

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    let _ = consumer_task.await;

    db.close().await;
    Ok(())
}
