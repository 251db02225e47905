//! 领域事件模型
//!
//! 定义所有服务共享的事件信封格式与各业务域的事件负载。
//! 信封在 JSON 线格式中平铺：信封元数据（eventId、occurredOn、
//! aggregateId、version）与事件字段处于同一层级，事件类型由
//! `eventType` 字段区分。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    pub const ORDER_EVENTS: &str = "order-events";
    pub const ORDER_STATUS_UPDATED: &str = "order-status-updated";
    pub const ORDER_CANCELLED: &str = "order-cancelled";
    pub const PAYMENT_EVENTS: &str = "payment-events";
    pub const PRODUCT_EVENTS: &str = "product-events";
}

// ---------------------------------------------------------------------------
// OrderLine — 事件中的订单行
// ---------------------------------------------------------------------------

/// 订单事件携带的订单行快照
///
/// 与订单服务内部的 OrderItem 实体解耦：事件只承载下游需要的字段，
/// 不暴露存储层的审计信息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

// ---------------------------------------------------------------------------
// DomainEvent — 各业务域事件负载
// ---------------------------------------------------------------------------

/// 领域事件负载
///
/// `eventType` 作为区分标签写入 JSON 顶层，变体名即线上的事件类型名。
/// product-* 事件属于共享线上契约的一部分，本工作区内无服务发布或
/// 消费它们。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    // 订单域
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        items: Vec<OrderLine>,
        total_amount: Decimal,
        status: String,
        order_date: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
        updated_at: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: String,
        cancelled_at: DateTime<Utc>,
    },

    // 支付域
    PaymentProcessed {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        payment_method: String,
        status: String,
        transaction_id: String,
        processed_at: DateTime<Utc>,
    },
    PaymentFailed {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        payment_method: String,
        error_message: String,
        failed_at: DateTime<Utc>,
    },
    PaymentRefunded {
        payment_id: Uuid,
        order_id: Uuid,
        refund_amount: Decimal,
        reason: String,
        refunded_at: DateTime<Utc>,
    },

    // 商品域（共享 schema，本工作区不发布）
    ProductCreated {
        product_id: Uuid,
        name: String,
        description: String,
        price: Decimal,
        stock_quantity: i32,
        category: String,
    },
    ProductUpdated {
        product_id: Uuid,
        name: String,
        description: String,
        price: Decimal,
        stock_quantity: i32,
        category: String,
    },
    ProductStockUpdated {
        product_id: Uuid,
        old_stock_quantity: i32,
        new_stock_quantity: i32,
    },
    ProductDeleted {
        product_id: Uuid,
    },
}

impl DomainEvent {
    /// 事件类型名（与 JSON 中的 eventType 字段一致）
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "OrderCreated",
            Self::OrderStatusChanged { .. } => "OrderStatusChanged",
            Self::OrderCancelled { .. } => "OrderCancelled",
            Self::PaymentProcessed { .. } => "PaymentProcessed",
            Self::PaymentFailed { .. } => "PaymentFailed",
            Self::PaymentRefunded { .. } => "PaymentRefunded",
            Self::ProductCreated { .. } => "ProductCreated",
            Self::ProductUpdated { .. } => "ProductUpdated",
            Self::ProductStockUpdated { .. } => "ProductStockUpdated",
            Self::ProductDeleted { .. } => "ProductDeleted",
        }
    }

    /// 事件所属聚合的标识（作为默认分区键）
    pub fn aggregate_id(&self) -> Option<String> {
        let id = match self {
            Self::OrderCreated { order_id, .. }
            | Self::OrderStatusChanged { order_id, .. }
            | Self::OrderCancelled { order_id, .. } => order_id,
            Self::PaymentProcessed { payment_id, .. }
            | Self::PaymentFailed { payment_id, .. }
            | Self::PaymentRefunded { payment_id, .. } => payment_id,
            Self::ProductCreated { product_id, .. }
            | Self::ProductUpdated { product_id, .. }
            | Self::ProductStockUpdated { product_id, .. }
            | Self::ProductDeleted { product_id, .. } => product_id,
        };
        Some(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// EventEnvelope — 事件信封
// ---------------------------------------------------------------------------

/// 事件信封
///
/// 所有发布到 broker 的事件都包装在此信封中。`version` 当前恒为 1，
/// 不是按聚合递增的序号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_on: DateTime<Utc>,
    pub aggregate_id: Option<String>,
    pub version: i64,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    /// 包装一个领域事件，聚合 ID 取自事件本身
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_on: Utc::now(),
            aggregate_id: event.aggregate_id(),
            version: 1,
            event,
        }
    }

    /// 事件类型名
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// 默认分区键
    ///
    /// 聚合 ID 缺失时退回随机键——该事件将失去分区内有序性。
    pub fn partition_key(&self) -> String {
        self.aggregate_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order_created() -> DomainEvent {
        DomainEvent::OrderCreated {
            order_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            items: vec![OrderLine {
                product_id: Uuid::new_v4(),
                product_name: "Product A".to_string(),
                quantity: 2,
                unit_price: Decimal::new(1000, 2),
                total_price: Decimal::new(2000, 2),
            }],
            total_amount: Decimal::new(3159, 2),
            status: "Pending".to_string(),
            order_date: Utc::now(),
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = EventEnvelope::new(sample_order_created());
        let json = serde_json::to_value(&envelope).unwrap();

        // 信封元数据与事件字段平铺在同一层级
        assert!(json.get("eventId").is_some());
        assert!(json.get("occurredOn").is_some());
        assert!(json.get("aggregateId").is_some());
        assert_eq!(json["version"], 1);
        assert_eq!(json["eventType"], "OrderCreated");
        assert!(json.get("orderId").is_some());
        assert!(json.get("customerId").is_some());
        assert!(json.get("totalAmount").is_some());
        assert!(json["items"][0].get("unitPrice").is_some());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = EventEnvelope::new(DomainEvent::PaymentRefunded {
            payment_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            refund_amount: Decimal::new(500, 2),
            reason: "requested_by_customer".to_string(),
            refunded_at: Utc::now(),
        });

        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: EventEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.event_type(), "PaymentRefunded");
        assert_eq!(decoded.event, envelope.event);
    }

    #[test]
    fn test_aggregate_id_is_owning_aggregate() {
        let order_id = Uuid::new_v4();
        let event = DomainEvent::OrderCancelled {
            order_id,
            reason: "customer request".to_string(),
            cancelled_at: Utc::now(),
        };
        assert_eq!(event.aggregate_id(), Some(order_id.to_string()));

        let envelope = EventEnvelope::new(event);
        assert_eq!(envelope.partition_key(), order_id.to_string());
    }

    #[test]
    fn test_partition_key_falls_back_to_random_when_aggregate_absent() {
        let mut envelope = EventEnvelope::new(sample_order_created());
        envelope.aggregate_id = None;

        let first = envelope.partition_key();
        let second = envelope.partition_key();
        assert_ne!(first, second);
    }

    #[test]
    fn test_topic_constants() {
        assert_eq!(topics::ORDER_EVENTS, "order-events");
        assert_eq!(topics::ORDER_STATUS_UPDATED, "order-status-updated");
        assert_eq!(topics::ORDER_CANCELLED, "order-cancelled");
        assert_eq!(topics::PAYMENT_EVENTS, "payment-events");
        assert_eq!(topics::PRODUCT_EVENTS, "product-events");
    }
}
