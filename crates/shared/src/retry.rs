//! 重试策略
//!
//! 提供指数退避的等待时间计算，由通知服务的重试调度器使用。
//! 业务逻辑错误（如参数无效）不应进入重试——是否重试由调用方决定。

use std::time::Duration;

use crate::config::NotificationRetryConfig;

/// 重试策略配置
///
/// 指数退避：首次失败等 initial_delay，之后每次乘以 multiplier，
/// 直到达到 max_delay 或重试次数耗尽。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
    /// 每次重试的退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 从通知重试配置构造
    pub fn from_config(config: &NotificationRetryConfig) -> Self {
        Self {
            max_retries: config.max_attempts,
            initial_delay: Duration::from_secs(config.initial_delay_seconds),
            max_delay: Duration::from_secs(config.max_delay_seconds),
            multiplier: config.multiplier,
        }
    }

    /// 计算第 N 次重试的等待时间（attempt 从 0 开始）
    ///
    /// 公式: initial_delay * multiplier^attempt，结果不超过 max_delay。
    /// f64 运算带来的微秒级精度损失对秒级退避完全可接受。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// 是否应继续重试（attempt 为已失败的重试轮次，从 0 计数）
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            multiplier: 3.0,
        };

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(60));
    }

    #[test]
    fn test_should_retry_until_limit() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_from_config() {
        let config = NotificationRetryConfig {
            max_attempts: 5,
            initial_delay_seconds: 30,
            multiplier: 1.5,
            max_delay_seconds: 600,
            sweep_interval_seconds: 10,
        };

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_secs(30));
        assert_eq!(policy.max_delay, Duration::from_secs(600));
    }
}
