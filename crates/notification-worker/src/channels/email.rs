//! 邮件渠道
//!
//! 通过 SendGrid 的 v3 mail/send API 投递邮件，
//! 消息标识取响应头 X-Message-Id。

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use commerce_shared::config::EmailConfig;

use super::{ChannelAdapter, DeliveryError};
use crate::models::NotificationType;

/// SendGrid 邮件适配器
pub struct SendGridMailer {
    config: EmailConfig,
    client: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> std::result::Result<&str, DeliveryError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| DeliveryError::Misconfigured {
                reason: "SendGrid api_key 未配置".to_string(),
            })
    }
}

#[async_trait]
impl ChannelAdapter for SendGridMailer {
    fn channel(&self) -> NotificationType {
        NotificationType::Email
    }

    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> std::result::Result<String, DeliveryError> {
        let api_key = self.api_key()?;

        let body = json!({
            "personalizations": [{ "to": [{ "email": recipient }] }],
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name,
            },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": content },
                { "type": "text/html", "value": content },
            ],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.config.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;
            return Err(DeliveryError::Provider(format!("HTTP {status}: {body}")));
        }

        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        debug!(recipient, message_id, "邮件已提交投递");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_without_api_key_is_misconfigured() {
        let mailer = SendGridMailer::new(EmailConfig::default());

        let result = mailer
            .deliver("ann@example.com", "订单已确认", "您的订单已确认")
            .await;
        assert!(matches!(result, Err(DeliveryError::Misconfigured { .. })));
    }

    #[test]
    fn test_channel_type() {
        let mailer = SendGridMailer::new(EmailConfig::default());
        assert_eq!(mailer.channel(), NotificationType::Email);
    }
}
