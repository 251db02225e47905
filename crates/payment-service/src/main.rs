//! 支付服务入口
//!
//! 加载配置、连接数据库与消息通道，构建支付服务实例。
//! 命令入口（HTTP 路由层）不在本进程范围内，由外层挂载。

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use commerce_shared::{config::AppConfig, database::Database, kafka::KafkaProducer, observability};
use payment_service::gateway::StripeGateway;
use payment_service::repository::PgPaymentRepository;
use payment_service::service::PaymentService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("payment-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    observability::init(&config.observability)?;

    info!("Starting payment-service...");
    info!(environment = %config.environment, "Configuration loaded");

    let db = Database::connect(&config.database).await?;
    sqlx::migrate!().run(db.pool()).await?;
    info!("Database connection established");

    let producer = Arc::new(KafkaProducer::new(&config.kafka)?);
    let repo = Arc::new(PgPaymentRepository::new(db.pool().clone()));
    let gateway = Arc::new(StripeGateway::new(config.payment_gateway.clone()));
    let _service = Arc::new(PaymentService::new(repo, gateway, producer));
    info!("Payment service initialized");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down payment-service");
    db.close().await;
    Ok(())
}
