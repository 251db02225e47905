//! 通知聚合实体定义
//!
//! Notification 携带投递状态机（Pending -> {Sent | Failed}，
//! Sent -> Delivered 由提供商回执驱动）与重试字段；
//! NotificationTemplate 是按名称查找的可启停模板。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 通知类型
///
/// Email 与 SMS 有注册的渠道适配器；Push 目前没有，发送请求
/// 会以不支持的类型失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum NotificationType {
    Email,
    #[serde(rename = "SMS")]
    #[sqlx(rename = "SMS")]
    Sms,
    Push,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Email => "Email",
            Self::Sms => "SMS",
            Self::Push => "Push",
        };
        write!(f, "{s}")
    }
}

/// 通知状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sending,
    Sent,
    Delivered,
    Failed,
    Cancelled,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Sending => "Sending",
            Self::Sent => "Sent",
            Self::Delivered => "Delivered",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

/// 通知
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// 人类可读编号，格式 NOT-<yyyyMMdd>-<8 位十六进制>
    pub notification_number: String,
    pub notification_type: NotificationType,
    pub subject: String,
    pub content: String,
    /// 邮箱地址或手机号，依通知类型而定
    pub recipient: String,
    pub status: NotificationStatus,
    #[sqlx(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub failure_reason: Option<String>,
    /// 已执行的重试次数，重试调度器维护
    pub retry_count: i32,
    /// 下次重试时间；None 表示不再重试
    #[sqlx(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    /// 投递提供商返回的消息标识
    #[sqlx(default)]
    pub external_id: Option<String>,
    /// 附加数据（JSON 字符串）
    #[sqlx(default)]
    pub metadata: Option<String>,
    #[sqlx(default)]
    pub order_id: Option<Uuid>,
    #[sqlx(default)]
    pub payment_id: Option<Uuid>,
    #[sqlx(default)]
    pub product_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

/// 通知模板
///
/// subject/content 中的 `{variableName}` 占位符在发送时做字面替换。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTemplate {
    pub id: Uuid,
    /// 模板名称，全局唯一
    pub name: String,
    pub notification_type: NotificationType,
    pub subject: String,
    pub content: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display_matches_wire_strings() {
        assert_eq!(NotificationType::Email.to_string(), "Email");
        assert_eq!(NotificationType::Sms.to_string(), "SMS");
        assert_eq!(NotificationType::Push.to_string(), "Push");
    }

    #[test]
    fn test_sms_serializes_uppercase() {
        let json = serde_json::to_string(&NotificationType::Sms).unwrap();
        assert_eq!(json, "\"SMS\"");

        let decoded: NotificationType = serde_json::from_str("\"SMS\"").unwrap();
        assert_eq!(decoded, NotificationType::Sms);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(NotificationStatus::default(), NotificationStatus::Pending);
    }
}
