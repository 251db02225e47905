//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 网关拒付（decline）不属于错误分类——拒付是一次正常完成的业务结果，
//! 由支付网关适配器以数据形式返回，记录为 Failed 状态。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum CommerceError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部网关错误 ====================
    #[error("适配器配置缺失: {service} - {reason}")]
    Misconfigured { service: String, reason: String },

    #[error("网关调用失败: {service} - {message}")]
    GatewayFault { service: String, message: String },

    // ==================== 消息通道错误 ====================
    #[error("事件发布失败: {0}")]
    Publish(String),

    #[error("事件消费失败: {0}")]
    Consume(String),

    #[error("序列化失败: {0}")]
    Serialization(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CommerceError>;

impl CommerceError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Misconfigured { .. } => "MISCONFIGURED",
            Self::GatewayFault { .. } => "GATEWAY_FAULT",
            Self::Publish(_) => "PUBLISH_FAULT",
            Self::Consume(_) => "CONSUME_FAULT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Publish(_) | Self::Consume(_) | Self::GatewayFault { .. }
        )
    }

    /// 映射到 HTTP 状态码
    ///
    /// 客户端错误（未找到、验证失败）映射 4xx，基础设施故障映射 5xx。
    /// 由外层请求路由在构造响应时使用。
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            _ => 500,
        }
    }
}
