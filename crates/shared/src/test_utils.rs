//! 测试工具模块
//!
//! 提供各服务单元测试共用的消息通道替身：记录发布内容的生产者、
//! 始终失败的生产者。保持与真实实现相同的契约，便于在不依赖
//! broker 的情况下验证服务层的事件发布行为。

use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::{DeliveryReceipt, MessageProducer};
use crate::error::{CommerceError, Result};
use crate::events::EventEnvelope;

// ==================== 记录型生产者 ====================

/// 记录所有发布调用的生产者
///
/// 测试中通过 `published` / `envelopes_for` 断言服务发布了
/// 预期的事件与分区键。
#[derive(Default)]
pub struct CapturingProducer {
    records: Mutex<Vec<(String, String, EventEnvelope)>>,
}

impl CapturingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部发布记录：(topic, key, envelope)
    pub fn published(&self) -> Vec<(String, String, EventEnvelope)> {
        self.records.lock().expect("记录锁中毒").clone()
    }

    /// 指定 topic 下发布的事件信封
    pub fn envelopes_for(&self, topic: &str) -> Vec<EventEnvelope> {
        self.records
            .lock()
            .expect("记录锁中毒")
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, _, envelope)| envelope.clone())
            .collect()
    }
}

#[async_trait]
impl MessageProducer for CapturingProducer {
    async fn publish_with_key(
        &self,
        topic: &str,
        key: &str,
        envelope: &EventEnvelope,
    ) -> Result<DeliveryReceipt> {
        let mut records = self.records.lock().expect("记录锁中毒");
        records.push((topic.to_string(), key.to_string(), envelope.clone()));

        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            partition: 0,
            offset: (records.len() - 1) as i64,
        })
    }
}

// ==================== 失败型生产者 ====================

/// 发布恒定失败的生产者
///
/// 用于验证"发布失败不回滚已提交的存储写入"的行为。
#[derive(Default)]
pub struct FailingProducer;

impl FailingProducer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageProducer for FailingProducer {
    async fn publish_with_key(
        &self,
        _topic: &str,
        _key: &str,
        _envelope: &EventEnvelope,
    ) -> Result<DeliveryReceipt> {
        Err(CommerceError::Publish("broker 不可达（测试替身）".to_string()))
    }
}
