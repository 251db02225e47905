//! 定价目录协作方
//!
//! 订单服务不持有商品主数据：单价与商品名通过目录接口解析。
//! 通过 trait 抽象以支持单元测试中的 mock 注入，以及后续接入
//! 真实商品服务时替换实现。

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;

/// 商品报价
#[derive(Debug, Clone)]
pub struct ProductQuote {
    pub product_name: String,
    pub unit_price: Decimal,
}

/// 定价目录接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// 解析商品的名称与单价
    async fn quote(&self, product_id: Uuid) -> Result<ProductQuote>;
}

/// 固定单价目录
///
/// 商品服务接入前的占位实现：所有商品统一报价，
/// 商品名由商品 ID 拼出。
pub struct FixedPriceCatalog {
    unit_price: Decimal,
}

impl FixedPriceCatalog {
    pub fn new(unit_price: Decimal) -> Self {
        Self { unit_price }
    }

    /// 默认统一单价 29.99
    pub fn with_defaults() -> Self {
        Self::new(Decimal::new(2999, 2))
    }
}

#[async_trait]
impl ProductCatalog for FixedPriceCatalog {
    async fn quote(&self, product_id: Uuid) -> Result<ProductQuote> {
        Ok(ProductQuote {
            product_name: format!("Product {product_id}"),
            unit_price: self.unit_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_price_catalog_quotes_flat_price() {
        let catalog = FixedPriceCatalog::with_defaults();
        let product_id = Uuid::new_v4();

        let quote = catalog.quote(product_id).await.unwrap();
        assert_eq!(quote.unit_price, Decimal::new(2999, 2));
        assert_eq!(quote.product_name, format!("Product {product_id}"));
    }
}
