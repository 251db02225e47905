//! 日志初始化模块
//!
//! 统一各服务的结构化日志输出。格式与级别来自配置，
//! RUST_LOG 环境变量优先于配置文件中的级别。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 初始化全局日志订阅器
///
/// 进程内只能调用一次；重复初始化返回错误。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志订阅器失败: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_accepts_default_config() {
        // 同进程内其他测试可能已初始化全局订阅器，这里只验证不 panic
        let _ = init(&ObservabilityConfig::default());
    }
}
