//! 短信渠道
//!
//! 通过 Twilio Messages API 投递短信，消息标识取响应中的 sid。
//! 短信没有主题概念，deliver 的 subject 参数被忽略。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use commerce_shared::config::SmsConfig;

use super::{ChannelAdapter, DeliveryError};
use crate::models::NotificationType;

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

/// Twilio 短信适配器
pub struct TwilioTexter {
    config: SmsConfig,
    client: reqwest::Client,
}

impl TwilioTexter {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> std::result::Result<(&str, &str), DeliveryError> {
        match (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
        ) {
            (Some(sid), Some(token)) => Ok((sid, token)),
            _ => Err(DeliveryError::Misconfigured {
                reason: "Twilio account_sid/auth_token 未配置".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChannelAdapter for TwilioTexter {
    fn channel(&self) -> NotificationType {
        NotificationType::Sms
    }

    async fn deliver(
        &self,
        recipient: &str,
        _subject: &str,
        content: &str,
    ) -> std::result::Result<String, DeliveryError> {
        let (account_sid, auth_token) = self.credentials()?;

        let form = [
            ("To", recipient),
            ("From", self.config.from_number.as_str()),
            ("Body", content),
        ];

        let response = self
            .client
            .post(format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                self.config.api_base, account_sid
            ))
            .basic_auth(account_sid, Some(auth_token))
            .form(&form)
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

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Provider(format!("响应解析失败: {e}")))?;

        debug!(recipient, sid = %message.sid, "短信已提交投递");
        Ok(message.sid)
    }
}
