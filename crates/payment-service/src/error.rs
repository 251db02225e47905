//! 支付服务错误类型
//!
//! 网关拒付不在此处：拒付是正常完成的业务结果，以 Failed 状态
//! 返回给调用方。只有网关异常（网络/鉴权/意外响应）才作为错误传播。

use thiserror::Error;

use commerce_shared::error::CommerceError;

use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Shared(#[from] CommerceError),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PaymentError::Gateway(GatewayError::Transport("connection reset".to_string()));
        assert_eq!(err.to_string(), "网关网络错误: connection reset");

        let err = PaymentError::Shared(CommerceError::Validation("退款金额超限".to_string()));
        assert_eq!(err.to_string(), "参数验证失败: 退款金额超限");
    }
}
