//! 支付生命周期服务
//!
//! 支付单创建（纯记账，不触网关）、捕获与退款。
//! 捕获路径的约定：网关拒付记录为 Failed 并作为正常结果返回；
//! 网关异常同样记录为 Failed 并发布 PaymentFailed，但错误继续向
//! 调用方传播。退款路径的网关异常不做本地记账，直接传播。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use commerce_shared::channel::MessageProducer;
use commerce_shared::entity::generate_reference;
use commerce_shared::error::CommerceError;
use commerce_shared::events::{DomainEvent, EventEnvelope, topics};

use crate::error::{PaymentError, Result};
use crate::gateway::{CaptureOutcome, CaptureRequest, PaymentGateway};
use crate::models::{Payment, PaymentStatus};
use crate::repository::PaymentRepositoryTrait;

// ---------------------------------------------------------------------------
// 命令定义
// ---------------------------------------------------------------------------

/// 创建支付命令
#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// PaymentService
// ---------------------------------------------------------------------------

/// 支付服务
pub struct PaymentService {
    repo: Arc<dyn PaymentRepositoryTrait>,
    gateway: Arc<dyn PaymentGateway>,
    producer: Arc<dyn MessageProducer>,
}

impl PaymentService {
    pub fn new(
        repo: Arc<dyn PaymentRepositoryTrait>,
        gateway: Arc<dyn PaymentGateway>,
        producer: Arc<dyn MessageProducer>,
    ) -> Self {
        Self {
            repo,
            gateway,
            producer,
        }
    }

    /// 创建支付单
    ///
    /// 纯记账步骤：落一条 Pending 记录，不调用网关。支付意图的
    /// 创建与客户确认解耦，捕获由 process_payment 单独触发。
    #[instrument(skip(self, command), fields(order_id = %command.order_id))]
    pub async fn create_payment(&self, command: CreatePaymentCommand) -> Result<Payment> {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: command.order_id,
            payment_number: generate_reference("PAY"),
            amount: command.amount,
            currency: command.currency,
            payment_method: command.payment_method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            description: command.description,
            failure_reason: None,
            processed_at: now,
            refunded_at: None,
            refund_amount: None,
            refund_reason: None,
            gateway_payment_intent_id: None,
            gateway_customer_id: None,
            gateway_refund_id: None,
            created_at: now,
            updated_at: None,
            is_deleted: false,
        };

        self.repo.create_payment(&payment).await?;

        info!(
            payment_id = %payment.id,
            payment_number = %payment.payment_number,
            "支付单已创建"
        );

        Ok(payment)
    }

    /// 通过网关捕获支付
    #[instrument(skip(self, payment_method_token, customer_ref))]
    pub async fn process_payment(
        &self,
        payment_id: Uuid,
        payment_method_token: &str,
        customer_ref: Option<String>,
    ) -> Result<Payment> {
        let mut payment = self.require_payment(payment_id).await?;

        let request = CaptureRequest {
            amount_minor: to_minor_units(payment.amount)?,
            currency: payment.currency.to_lowercase(),
            payment_method_token: payment_method_token.to_string(),
            customer_ref: customer_ref.clone(),
            description: payment.description.clone(),
        };

        let now = Utc::now();
        match self.gateway.capture(request).await {
            Ok(CaptureOutcome::Succeeded { intent_id }) => {
                payment.status = PaymentStatus::Succeeded;
                payment.transaction_id = Some(intent_id.clone());
                payment.gateway_payment_intent_id = Some(intent_id.clone());
                payment.gateway_customer_id = customer_ref;
                payment.processed_at = now;
                payment.updated_at = Some(now);

                self.repo.update_payment(&payment).await?;

                self.publish_best_effort(DomainEvent::PaymentProcessed {
                    payment_id: payment.id,
                    order_id: payment.order_id,
                    amount: payment.amount,
                    payment_method: payment.payment_method.clone(),
                    status: payment.status.to_string(),
                    transaction_id: intent_id,
                    processed_at: now,
                })
                .await;

                info!(payment_id = %payment.id, "支付捕获成功");
                Ok(payment)
            }
            Ok(CaptureOutcome::Declined { intent_id, reason }) => {
                // 拒付是正常完成的结果：落库、发事件，不向调用方报错
                payment.status = PaymentStatus::Failed;
                payment.failure_reason = Some(reason.clone());
                payment.transaction_id = intent_id.clone();
                payment.gateway_payment_intent_id = intent_id;
                payment.processed_at = now;
                payment.updated_at = Some(now);

                self.repo.update_payment(&payment).await?;

                self.publish_best_effort(DomainEvent::PaymentFailed {
                    payment_id: payment.id,
                    order_id: payment.order_id,
                    amount: payment.amount,
                    payment_method: payment.payment_method.clone(),
                    error_message: reason.clone(),
                    failed_at: now,
                })
                .await;

                info!(payment_id = %payment.id, reason, "支付被网关拒绝");
                Ok(payment)
            }
            Err(e) => {
                // 网关异常：失败信息同样落库并发事件，但错误继续向上传播
                payment.status = PaymentStatus::Failed;
                payment.failure_reason = Some(e.to_string());
                payment.updated_at = Some(now);

                self.repo.update_payment(&payment).await?;

                self.publish_best_effort(DomainEvent::PaymentFailed {
                    payment_id: payment.id,
                    order_id: payment.order_id,
                    amount: payment.amount,
                    payment_method: payment.payment_method.clone(),
                    error_message: e.to_string(),
                    failed_at: now,
                })
                .await;

                error!(payment_id = %payment.id, error = %e, "支付捕获异常");
                Err(PaymentError::Gateway(e))
            }
        }
    }

    /// 退款
    ///
    /// 退款金额等于原金额时状态为 Refunded，小于时为 PartiallyRefunded；
    /// 省略金额表示全额退款。
    #[instrument(skip(self, reason))]
    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        amount: Option<Decimal>,
        reason: &str,
    ) -> Result<Payment> {
        let mut payment = self.require_payment(payment_id).await?;

        // 两项校验都在任何网关调用之前完成
        let Some(intent_id) = payment.gateway_payment_intent_id.clone() else {
            return Err(PaymentError::Shared(CommerceError::Validation(
                "支付未经网关捕获，无法退款".to_string(),
            )));
        };

        let refund_amount = amount.unwrap_or(payment.amount);
        if refund_amount > payment.amount {
            return Err(PaymentError::Shared(CommerceError::Validation(format!(
                "退款金额 {refund_amount} 超过原支付金额 {}",
                payment.amount
            ))));
        }

        let amount_minor = amount.map(to_minor_units).transpose()?;

        // 退款的网关异常不做本地记账，直接向上传播
        let refund = self
            .gateway
            .refund(&intent_id, amount_minor, reason)
            .await
            .map_err(PaymentError::Gateway)?;

        let now = Utc::now();
        payment.refund_amount = Some(refund_amount);
        payment.refund_reason = Some(reason.to_string());
        payment.refunded_at = Some(now);
        payment.gateway_refund_id = Some(refund.refund_id);
        payment.status = if refund_amount < payment.amount {
            PaymentStatus::PartiallyRefunded
        } else {
            PaymentStatus::Refunded
        };
        payment.updated_at = Some(now);

        self.repo.update_payment(&payment).await?;

        self.publish_best_effort(DomainEvent::PaymentRefunded {
            payment_id: payment.id,
            order_id: payment.order_id,
            refund_amount,
            reason: reason.to_string(),
            refunded_at: now,
        })
        .await;

        info!(
            payment_id = %payment.id,
            refund_amount = %refund_amount,
            status = %payment.status,
            "退款完成"
        );

        Ok(payment)
    }

    async fn require_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| {
                PaymentError::Shared(CommerceError::NotFound {
                    entity: "Payment".to_string(),
                    id: payment_id.to_string(),
                })
            })
    }

    /// 事件发布是尽力而为：失败只记录日志，已提交的存储写入不回滚
    async fn publish_best_effort(&self, event: DomainEvent) {
        let envelope = EventEnvelope::new(event);
        if let Err(e) = self
            .producer
            .publish(topics::PAYMENT_EVENTS, &envelope)
            .await
        {
            warn!(
                topic = topics::PAYMENT_EVENTS,
                event_type = envelope.event_type(),
                error = %e,
                "事件发布失败，存储写入不回滚"
            );
        }
    }
}

/// 转换为网关的最小货币单位（分）
fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::from(100)).to_i64().ok_or_else(|| {
        PaymentError::Shared(CommerceError::Validation(format!(
            "金额 {amount} 无法转换为最小货币单位"
        )))
    })
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
