//! 订单服务错误类型

use thiserror::Error;
use uuid::Uuid;

use commerce_shared::error::CommerceError;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("订单项不能为空")]
    EmptyItems,

    #[error("订单项数量无效: product_id={product_id}, quantity={quantity}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },

    #[error(transparent)]
    Shared(#[from] CommerceError),
}

pub type Result<T> = std::result::Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(OrderError::EmptyItems.to_string(), "订单项不能为空");

        let err = OrderError::Shared(CommerceError::NotFound {
            entity: "Order".to_string(),
            id: "o-1".to_string(),
        });
        assert_eq!(err.to_string(), "记录未找到: Order id=o-1");
    }
}
