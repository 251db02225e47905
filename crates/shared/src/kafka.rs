//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为消息通道契约（channel 模块）的实现，
//! 统一消息序列化、错误映射和优雅关闭语义，避免各服务重复编写样板代码。

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::Offset;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::channel::{DeliveryReceipt, EventHandler, MessageProducer, MessageSubscriber};
use crate::config::KafkaConfig;
use crate::error::{CommerceError, Result};
use crate::events::EventEnvelope;

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// Kafka 事件发布端
///
/// 封装 `FutureProducer` 并以 JSON 发送事件信封，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建发布端
    ///
    /// 设置 `message.timeout.ms` 为 5 秒——5 秒内仍无法投递的事件
    /// 交由上层按发布失败处理，而非无限等待。
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| CommerceError::Publish(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn publish_with_key(
        &self,
        topic: &str,
        key: &str,
        envelope: &EventEnvelope,
    ) -> Result<DeliveryReceipt> {
        // 序列化与网络发送拆分为两步，便于独立定位故障原因
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| CommerceError::Serialization(format!("事件序列化失败: {e}")))?;

        let record = FutureRecord::to(topic).key(key).payload(&payload);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| CommerceError::Publish(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            event_type = envelope.event_type(),
            partition = delivery.partition,
            offset = delivery.offset,
            "事件已发布"
        );

        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            partition: delivery.partition,
            offset: delivery.offset,
        })
    }
}

// ---------------------------------------------------------------------------
// KafkaSubscriber
// ---------------------------------------------------------------------------

/// Kafka 事件订阅端
///
/// 手动提交位点：handler 成功返回后才提交；失败时把消费位置回退到
/// 出错消息的偏移，下个轮询周期重投同一条消息。每个实例只运行一个
/// 消费循环，服务一个 topic。
pub struct KafkaSubscriber {
    consumer: StreamConsumer,
}

impl KafkaSubscriber {
    /// 创建订阅端
    ///
    /// `group_id_suffix` 允许同一服务内不同消费逻辑使用独立的消费组，
    /// 例如 "notification-worker.order-events"。
    pub fn new(config: &KafkaConfig, group_id_suffix: Option<&str>) -> Result<Self> {
        let group_id = match group_id_suffix {
            Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
            None => config.consumer_group.clone(),
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| CommerceError::Consume(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self { consumer })
    }

    /// 处理单条消息：反序列化 -> handler -> 提交或回退
    async fn dispatch(&self, msg: &BorrowedMessage<'_>, handler: &EventHandler) {
        let Some(payload) = msg.payload() else {
            // 空负载无法处理，提交跳过
            warn!(topic = msg.topic(), offset = msg.offset(), "收到空负载消息，跳过");
            if let Err(e) = self.consumer.commit_message(msg, CommitMode::Async) {
                error!(error = %e, "提交空消息位点失败");
            }
            return;
        };

        let envelope: EventEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    topic = msg.topic(),
                    partition = msg.partition(),
                    offset = msg.offset(),
                    error = %e,
                    "事件反序列化失败，位点不推进"
                );
                self.rewind(msg);
                return;
            }
        };

        debug!(
            topic = msg.topic(),
            partition = msg.partition(),
            offset = msg.offset(),
            event_type = envelope.event_type(),
            "收到事件"
        );

        match handler(envelope).await {
            Ok(()) => {
                if let Err(e) = self.consumer.commit_message(msg, CommitMode::Async) {
                    error!(error = %e, "提交位点失败");
                }
            }
            Err(e) => {
                error!(
                    topic = msg.topic(),
                    partition = msg.partition(),
                    offset = msg.offset(),
                    error = %e,
                    "事件处理失败，位点不推进，消息将重投"
                );
                self.rewind(msg);
            }
        }
    }

    /// 回退消费位置到失败消息的偏移
    fn rewind(&self, msg: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.seek(
            msg.topic(),
            msg.partition(),
            Offset::Offset(msg.offset()),
            Duration::from_secs(5),
        ) {
            error!(
                topic = msg.topic(),
                partition = msg.partition(),
                offset = msg.offset(),
                error = %e,
                "回退消费位置失败"
            );
        }
    }
}

#[async_trait]
impl MessageSubscriber for KafkaSubscriber {
    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 一条消息完整处理（含存储写入）后才拉取下一条，保证分区内有序。
    /// - 关闭信号变为 `true` 时退出循环，让正在执行的 handler 自然完成。
    async fn subscribe(
        &self,
        topic: &str,
        mut shutdown: watch::Receiver<bool>,
        handler: EventHandler,
    ) -> Result<()> {
        use futures::StreamExt;

        self.consumer
            .subscribe(&[topic])
            .map_err(|e| CommerceError::Consume(format!("订阅 topic 失败: {e}")))?;

        info!(topic, "Kafka 消费循环已启动");

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(topic, "收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!(topic, "Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => self.dispatch(&borrowed_msg, &handler).await,
                        Err(e) => {
                            // 瞬时 broker 错误只记录日志，循环继续
                            error!(topic, error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
