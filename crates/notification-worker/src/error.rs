//! 通知服务错误类型
//!
//! 渠道投递失败不在此处作为错误传播：投递结果记录在通知的
//! Sent/Failed 状态里返回给调用方。只有不支持的通知类型和
//! 基础设施故障才构成错误。

use thiserror::Error;

use commerce_shared::error::CommerceError;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("不支持的通知类型: {notification_type}")]
    UnsupportedType { notification_type: String },

    #[error(transparent)]
    Shared(#[from] CommerceError),
}

pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotificationError::UnsupportedType {
            notification_type: "Push".to_string(),
        };
        assert_eq!(err.to_string(), "不支持的通知类型: Push");

        let err = NotificationError::Shared(CommerceError::NotFound {
            entity: "NotificationTemplate".to_string(),
            id: "order-confirmation".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "记录未找到: NotificationTemplate id=order-confirmation"
        );
    }
}
