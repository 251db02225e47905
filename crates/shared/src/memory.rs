//! 内存消息通道实现
//!
//! 与 Kafka 实现遵循同一份契约与投递语义：单 topic 单分区、
//! handler 成功返回后才推进位点、失败消息在下个轮询周期重投。
//! 用于单元/集成测试和无 broker 的本地开发。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::channel::{DeliveryReceipt, EventHandler, MessageProducer, MessageSubscriber};
use crate::error::{CommerceError, Result};
use crate::events::EventEnvelope;

#[derive(Clone)]
struct StoredMessage {
    key: String,
    payload: Vec<u8>,
}

/// 内存 broker
///
/// 每个 topic 是一条仅追加的消息日志；订阅者各自维护消费位点。
/// Clone 共享同一份日志。
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<String, Vec<StoredMessage>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某 topic 当前的消息总数
    pub fn log_len(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .expect("broker 锁中毒")
            .get(topic)
            .map(|log| log.len())
            .unwrap_or(0)
    }

    /// 读取某 topic 已发布的全部事件（按发布顺序）
    ///
    /// 测试断言用；反序列化失败的消息会被跳过。
    pub fn published(&self, topic: &str) -> Vec<EventEnvelope> {
        self.topics
            .lock()
            .expect("broker 锁中毒")
            .get(topic)
            .map(|log| {
                log.iter()
                    .filter_map(|msg| serde_json::from_slice(&msg.payload).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 读取某 topic 各消息的分区键（按发布顺序）
    pub fn keys(&self, topic: &str) -> Vec<String> {
        self.topics
            .lock()
            .expect("broker 锁中毒")
            .get(topic)
            .map(|log| log.iter().map(|msg| msg.key.clone()).collect())
            .unwrap_or_default()
    }

    fn fetch(&self, topic: &str, offset: usize) -> Option<StoredMessage> {
        self.topics
            .lock()
            .expect("broker 锁中毒")
            .get(topic)
            .and_then(|log| log.get(offset).cloned())
    }
}

#[async_trait]
impl MessageProducer for InMemoryBroker {
    async fn publish_with_key(
        &self,
        topic: &str,
        key: &str,
        envelope: &EventEnvelope,
    ) -> Result<DeliveryReceipt> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| CommerceError::Serialization(format!("事件序列化失败: {e}")))?;

        let offset = {
            let mut topics = self.topics.lock().expect("broker 锁中毒");
            let log = topics.entry(topic.to_string()).or_default();
            log.push(StoredMessage {
                key: key.to_string(),
                payload,
            });
            (log.len() - 1) as i64
        };

        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            partition: 0,
            offset,
        })
    }
}

#[async_trait]
impl MessageSubscriber for InMemoryBroker {
    /// 消费循环
    ///
    /// 位点只在 handler 成功后推进；失败时位点原地不动，下一轮
    /// 取到的仍是同一条消息。出错后让出调度，以便测试中的其他任务推进。
    async fn subscribe(
        &self,
        topic: &str,
        mut shutdown: watch::Receiver<bool>,
        handler: EventHandler,
    ) -> Result<()> {
        let mut committed: usize = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(message) = self.fetch(topic, committed) else {
                // 没有新消息时等待，同时保持对关闭信号的响应
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                }
                continue;
            };

            match serde_json::from_slice::<EventEnvelope>(&message.payload) {
                Ok(envelope) => match handler(envelope).await {
                    Ok(()) => committed += 1,
                    Err(e) => {
                        warn!(
                            topic,
                            offset = committed,
                            error = %e,
                            "事件处理失败，位点不推进，消息将重投"
                        );
                        tokio::task::yield_now().await;
                    }
                },
                Err(e) => {
                    error!(topic, offset = committed, error = %e, "事件反序列化失败，位点不推进");
                    tokio::task::yield_now().await;
                }
            }
        }

        Ok(())
    }
}
