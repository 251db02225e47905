//! 订单事件消费
//!
//! 订阅 order-events，对 OrderCreated 发送订单确认通知：
//! 从客户目录解析联系方式，按模板渲染后走 send 路径投递。
//! 不按 event_id 去重，重复投递的事件会产生重复通知。
//! 支付与状态变更事件的负载不携带客户标识，无法在本服务内解析
//! 收件人，维持命令触发。

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use commerce_shared::channel::{EventHandler, MessageSubscriber};
use commerce_shared::error::CommerceError;
use commerce_shared::events::{DomainEvent, EventEnvelope, topics};

use crate::directory::CustomerDirectory;
use crate::error::NotificationError;
use crate::models::NotificationType;
use crate::service::{CorrelationIds, NotificationService, SendNotificationCommand};
use crate::templates::render;

/// 订单确认通知使用的模板名称
pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order-confirmation";

/// 订单事件消费者
pub struct OrderEventsConsumer {
    service: Arc<NotificationService>,
    directory: Arc<dyn CustomerDirectory>,
}

impl OrderEventsConsumer {
    pub fn new(service: Arc<NotificationService>, directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { service, directory }
    }

    /// 在当前任务中运行消费循环直到收到关闭信号
    pub async fn run(
        &self,
        subscriber: Arc<dyn MessageSubscriber>,
        shutdown: watch::Receiver<bool>,
    ) -> commerce_shared::error::Result<()> {
        subscriber
            .subscribe(topics::ORDER_EVENTS, shutdown, self.handler())
            .await
    }

    /// 构造订阅 handler
    pub fn handler(&self) -> EventHandler {
        let service = self.service.clone();
        let directory = self.directory.clone();
        Arc::new(move |envelope| {
            let service = service.clone();
            let directory = directory.clone();
            async move { handle_order_event(&service, directory.as_ref(), envelope).await }.boxed()
        })
    }
}

/// 把通知服务的错误折叠为通道错误
///
/// 基础设施错误原样向订阅循环传播（触发重投）；
/// 其余折叠为 Internal。
fn infra(err: NotificationError) -> CommerceError {
    match err {
        NotificationError::Shared(e) => e,
        other => CommerceError::Internal(other.to_string()),
    }
}

/// 处理一条订单事件
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造订阅循环。
#[instrument(skip_all, fields(event_type = envelope.event_type()))]
pub async fn handle_order_event(
    service: &NotificationService,
    directory: &dyn CustomerDirectory,
    envelope: EventEnvelope,
) -> commerce_shared::error::Result<()> {
    let DomainEvent::OrderCreated {
        order_id,
        customer_id,
        total_amount,
        status,
        ..
    } = envelope.event
    else {
        debug!("非 OrderCreated 事件，忽略");
        return Ok(());
    };

    let Some(contact) = directory.contact(customer_id).await.map_err(infra)? else {
        debug!(%customer_id, "客户联系方式缺失，跳过事件通知");
        return Ok(());
    };

    let Some(template) = service
        .active_template(ORDER_CONFIRMATION_TEMPLATE)
        .await
        .map_err(infra)?
    else {
        warn!(
            template = ORDER_CONFIRMATION_TEMPLATE,
            "模板缺失或停用，跳过事件通知"
        );
        return Ok(());
    };

    // 按模板的通知类型选择收件地址
    let recipient = match template.notification_type {
        NotificationType::Email => contact.email,
        NotificationType::Sms => contact.phone,
        NotificationType::Push => None,
    };
    let Some(recipient) = recipient else {
        debug!(
            %customer_id,
            notification_type = %template.notification_type,
            "客户缺少该渠道的联系方式，跳过事件通知"
        );
        return Ok(());
    };

    let variables = HashMap::from([
        ("orderId".to_string(), order_id.to_string()),
        ("totalAmount".to_string(), total_amount.to_string()),
        ("status".to_string(), status),
    ]);

    let command = SendNotificationCommand {
        customer_id,
        notification_type: template.notification_type,
        subject: render(&template.subject, &variables),
        content: render(&template.content, &variables),
        recipient,
        correlation: CorrelationIds {
            order_id: Some(order_id),
            ..Default::default()
        },
        metadata: None,
    };

    match service.send(command).await {
        Ok(notification) => {
            info!(
                notification_id = %notification.id,
                %order_id,
                status = %notification.status,
                "订单确认通知已处理"
            );
            Ok(())
        }
        // 重投不会改变结果的失败不阻塞位点
        Err(NotificationError::UnsupportedType { notification_type }) => {
            warn!(notification_type, "模板指向不支持的通知类型，跳过");
            Ok(())
        }
        Err(NotificationError::Shared(e)) => Err(e),
    }
}
