//! 订单聚合实体定义
//!
//! 所有实体携带审计字段（id/created_at/updated_at/is_deleted），
//! 状态与地址类型以 varchar 落库，保持与事件负载中的字符串一致。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 订单状态
///
/// 正常流转 Pending -> Confirmed -> Processing -> Shipped -> Delivered；
/// Cancelled 可从任意非终态进入，Refunded 在 Delivered 之后出现。
/// 状态写入不做迁移表校验，任何状态都可以覆盖任何状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

/// 地址类型
///
/// 每个订单每种类型只允许一条地址（存储层唯一约束）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum AddressType {
    Shipping,
    Billing,
}

/// 订单
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// 人类可读编号，格式 ORD-<yyyyMMdd>-<8 位十六进制>
    pub order_number: String,
    pub status: OrderStatus,
    /// total_amount = Σ(订单项小计) + tax + shipping - discount
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub order_date: DateTime<Utc>,
    #[sqlx(default)]
    pub shipped_date: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub delivered_date: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

/// 订单项
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    /// quantity >= 1，创建时校验
    pub quantity: i32,
    pub unit_price: Decimal,
    /// total_price = quantity × unit_price
    pub total_price: Decimal,
    #[sqlx(default)]
    pub product_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

/// 订单地址
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderAddress {
    pub id: Uuid,
    pub order_id: Uuid,
    pub address_type: AddressType,
    pub first_name: String,
    pub last_name: String,
    pub street_address: String,
    #[sqlx(default)]
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_wire_strings() {
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
        assert_eq!(OrderStatus::Shipped.to_string(), "Shipped");
        assert_eq!(OrderStatus::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_status_json_roundtrip() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"Delivered\"");

        let decoded: OrderStatus = serde_json::from_str("\"Refunded\"").unwrap();
        assert_eq!(decoded, OrderStatus::Refunded);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }
}
