//! 消息通道契约
//!
//! 定义发布端与订阅端的能力接口。各服务持有显式注入的通道实例，
//! 不通过全局/静态状态访问 broker 客户端。
//!
//! 投递语义：
//! - 发布方：发布成功返回投递回执；批量发布并发展开，每条事件的结果
//!   彼此独立，部分成功是常态，只能通过逐条结果观察到。
//! - 订阅方：至少一次。handler 先执行，成功返回后才提交位点；handler
//!   出错时位点不推进，同一条消息在下个轮询周期重投。没有死信路由、
//!   没有退避——毒消息会无限重投。单个 topic 内消费严格串行。

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::Result;
use crate::events::EventEnvelope;

// ---------------------------------------------------------------------------
// DeliveryReceipt
// ---------------------------------------------------------------------------

/// 投递回执
///
/// 记录事件在 broker 中落盘的位置，供调用方记录日志或排查投递问题。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// MessageProducer
// ---------------------------------------------------------------------------

/// 事件发布能力接口
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// 以显式分区键发布单条事件
    async fn publish_with_key(
        &self,
        topic: &str,
        key: &str,
        envelope: &EventEnvelope,
    ) -> Result<DeliveryReceipt>;

    /// 发布单条事件，分区键默认取事件的聚合 ID
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<DeliveryReceipt> {
        self.publish_with_key(topic, &envelope.partition_key(), envelope)
            .await
    }

    /// 并发批量发布
    ///
    /// 逐条返回结果：单条失败不影响其余事件的投递，调用方不能假设
    /// 全有或全无。
    async fn publish_batch(
        &self,
        topic: &str,
        envelopes: &[EventEnvelope],
    ) -> Vec<Result<DeliveryReceipt>> {
        futures::future::join_all(envelopes.iter().map(|envelope| self.publish(topic, envelope)))
            .await
    }
}

// ---------------------------------------------------------------------------
// MessageSubscriber
// ---------------------------------------------------------------------------

/// 订阅 handler
///
/// 由服务侧构造：`Arc::new(move |envelope| async move { … }.boxed())`。
pub type EventHandler =
    Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// 事件订阅能力接口
///
/// `subscribe` 在当前任务中运行消费循环直到 shutdown 信号变为 true，
/// 每个订阅实例只服务一个 topic。
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    async fn subscribe(
        &self,
        topic: &str,
        shutdown: watch::Receiver<bool>,
        handler: EventHandler,
    ) -> Result<()>;
}
