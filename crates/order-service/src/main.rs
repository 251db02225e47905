//! 订单服务入口
//!
//! 加载配置、连接数据库与消息通道，构建订单服务实例。
//! 命令入口（HTTP 路由层）不在本进程范围内，由外层挂载。

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use commerce_shared::{config::AppConfig, database::Database, kafka::KafkaProducer, observability};
use order_service::catalog::FixedPriceCatalog;
use order_service::repository::PgOrderRepository;
use order_service::service::OrderService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("order-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    observability::init(&config.observability)?;

    info!("Starting order-service...");
    info!(environment = %config.environment, "Configuration loaded");

    let db = Database::connect(&config.database).await?;
    sqlx::migrate!().run(db.pool()).await?;
    info!("Database connection established");

    let producer = Arc::new(KafkaProducer::new(&config.kafka)?);
    let repo = Arc::new(PgOrderRepository::new(db.pool().clone()));
    let catalog = Arc::new(FixedPriceCatalog::with_defaults());
    let _service = Arc::new(OrderService::new(repo, catalog, producer));
    info!("Order service initialized");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down order-service");
    db.close().await;
    Ok(())
}
