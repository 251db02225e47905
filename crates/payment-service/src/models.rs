//! 支付聚合实体定义
//!
//! 同一订单允许存在多条支付记录（重试、部分退款各自成行）。
//! 网关侧的关联标识（payment intent / customer / refund）单独落库，
//! 退款的前提是 gateway_payment_intent_id 已有值。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 支付状态
///
/// Pending -> Processing -> {Succeeded | Failed}；
/// Succeeded 之后可进入 Refunded 或 PartiallyRefunded。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
            Self::PartiallyRefunded => "PartiallyRefunded",
        };
        write!(f, "{s}")
    }
}

/// 支付
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    /// 所属订单，仅按标识符关联，不跨库引用
    pub order_id: Uuid,
    /// 人类可读编号，格式 PAY-<yyyyMMdd>-<8 位十六进制>
    pub payment_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    #[sqlx(default)]
    pub transaction_id: Option<String>,
    #[sqlx(default)]
    pub description: Option<String>,
    #[sqlx(default)]
    pub failure_reason: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[sqlx(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub refund_amount: Option<Decimal>,
    #[sqlx(default)]
    pub refund_reason: Option<String>,
    #[sqlx(default)]
    pub gateway_payment_intent_id: Option<String>,
    #[sqlx(default)]
    pub gateway_customer_id: Option<String>,
    #[sqlx(default)]
    pub gateway_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}
