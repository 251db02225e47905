//! 支付网关适配器
//!
//! 以窄接口（capture/refund）封装外部支付处理商，业务逻辑只依赖
//! 此接口，不接触具体 SDK 类型。拒付（decline）以数据形式返回，
//! 不是错误；只有网络/鉴权/意外响应才以 GatewayError 传播。

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use commerce_shared::config::PaymentGatewayConfig;

/// 网关错误
///
/// Misconfigured 在发起任何网络请求之前检查并返回。
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("网关配置缺失: {reason}")]
    Misconfigured { reason: String },

    #[error("网关网络错误: {0}")]
    Transport(String),

    #[error("网关异常响应: {0}")]
    Unexpected(String),
}

/// 捕获请求
///
/// 金额以网关的最小货币单位表示（如美分）。
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method_token: String,
    pub customer_ref: Option<String>,
    pub description: Option<String>,
}

/// 捕获结果
///
/// Declined 是网关明确报告的业务性拒付；intent_id 在网关已创建
/// 支付意图时存在。
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Succeeded { intent_id: String },
    Declined {
        intent_id: Option<String>,
        reason: String,
    },
}

/// 退款结果
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_id: String,
}

/// 支付网关能力接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 捕获一笔支付
    async fn capture(
        &self,
        request: CaptureRequest,
    ) -> std::result::Result<CaptureOutcome, GatewayError>;

    /// 按支付意图退款；amount_minor 为 None 时退全款
    async fn refund(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
        reason: &str,
    ) -> std::result::Result<RefundOutcome, GatewayError>;
}

// ---------------------------------------------------------------------------
// Stripe 实现
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<PaymentIntentError>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payment_intent: Option<PaymentIntentRef>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentRef {
    id: String,
}

/// Stripe 支付网关
///
/// 通过 REST API 创建并确认支付意图、发起退款。
/// `api_base` 可配置，测试环境可指向本地桩服务。
pub struct StripeGateway {
    config: PaymentGatewayConfig,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: PaymentGatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn secret_key(&self) -> std::result::Result<&str, GatewayError> {
        self.config
            .secret_key
            .as_deref()
            .ok_or_else(|| GatewayError::Misconfigured {
                reason: "secret_key 未配置".to_string(),
            })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn capture(
        &self,
        request: CaptureRequest,
    ) -> std::result::Result<CaptureOutcome, GatewayError> {
        let secret_key = self.secret_key()?;

        let mut form = vec![
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("payment_method", request.payment_method_token.clone()),
            ("confirm", "true".to_string()),
        ];
        if let Some(customer) = &request.customer_ref {
            form.push(("customer", customer.clone()));
        }
        if let Some(description) = &request.description {
            form.push(("description", description.clone()));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = %status, "payment_intents 响应");

        if status.is_success() {
            let intent: PaymentIntentResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Unexpected(format!("响应解析失败: {e}")))?;

            if intent.status == "succeeded" {
                return Ok(CaptureOutcome::Succeeded {
                    intent_id: intent.id,
                });
            }
            let reason = intent
                .last_payment_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("payment intent 状态为 {}", intent.status));
            return Ok(CaptureOutcome::Declined {
                intent_id: Some(intent.id),
                reason,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // 客户端错误里的 card_error 是业务性拒付，其余按异常响应处理
        if status.is_client_error()
            && let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&body)
            && envelope.error.error_type.as_deref() == Some("card_error")
        {
            return Ok(CaptureOutcome::Declined {
                intent_id: envelope.error.payment_intent.map(|intent| intent.id),
                reason: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "card declined".to_string()),
            });
        }

        Err(GatewayError::Unexpected(format!(
            "HTTP {status}: {body}"
        )))
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
        reason: &str,
    ) -> std::result::Result<RefundOutcome, GatewayError> {
        let secret_key = self.secret_key()?;

        let mut form = vec![
            ("payment_intent", intent_id.to_string()),
            ("reason", reason.to_string()),
        ];
        if let Some(amount) = amount_minor {
            form.push(("amount", amount.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.config.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
            return Err(GatewayError::Unexpected(format!("HTTP {status}: {body}")));
        }

        let refund: RefundResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unexpected(format!("响应解析失败: {e}")))?;

        Ok(RefundOutcome { refund_id: refund.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_without_secret_key_is_misconfigured() {
        let gateway = StripeGateway::new(PaymentGatewayConfig::default());

        let result = gateway
            .capture(CaptureRequest {
                amount_minor: 1000,
                currency: "usd".to_string(),
                payment_method_token: "pm_test".to_string(),
                customer_ref: None,
                description: None,
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Misconfigured { .. })));
    }

    #[tokio::test]
    async fn test_refund_without_secret_key_is_misconfigured() {
        let gateway = StripeGateway::new(PaymentGatewayConfig::default());

        let result = gateway.refund("pi_test", None, "requested_by_customer").await;
        assert!(matches!(result, Err(GatewayError::Misconfigured { .. })));
    }

    #[test]
    fn test_card_error_body_parses_as_decline() {
        let body = r#"{"error":{"type":"card_error","message":"Your card was declined.","payment_intent":{"id":"pi_123"}}}"#;
        let envelope: ApiErrorEnvelope = serde_json::from_str(body).unwrap();

        assert_eq!(envelope.error.error_type.as_deref(), Some("card_error"));
        assert_eq!(
            envelope.error.message.as_deref(),
            Some("Your card was declined.")
        );
        assert_eq!(
            envelope.error.payment_intent.map(|p| p.id).as_deref(),
            Some("pi_123")
        );
    }
}
