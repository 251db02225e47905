//! 通知渠道适配器
//!
//! 以窄接口（deliver）封装外部投递提供商，各渠道（邮件、短信）
//! 提供独立实现。配置缺失在任何网络请求之前以 Misconfigured
//! 返回，区别于提供商拒绝与网络故障。

mod email;
mod sms;

pub use email::SendGridMailer;
pub use sms::TwilioTexter;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::NotificationType;

/// 投递错误
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("投递渠道配置缺失: {reason}")]
    Misconfigured { reason: String },

    #[error("投递提供商拒绝: {0}")]
    Provider(String),

    #[error("投递网络错误: {0}")]
    Transport(String),
}

/// 通知渠道能力接口
///
/// 成功时返回提供商侧的消息标识（ExternalId）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// 该适配器服务的通知类型
    fn channel(&self) -> NotificationType;

    /// 投递一条通知
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> std::result::Result<String, DeliveryError>;
}
