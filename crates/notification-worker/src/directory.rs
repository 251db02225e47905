//! 客户联系方式协作方
//!
//! 事件负载只携带客户标识，收件人（邮箱/手机号）需要从客户主数据
//! 解析。通知服务不持有客户主数据，通过此接口查询。

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// 客户联系方式
#[derive(Debug, Clone, Default)]
pub struct CustomerContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// 客户联系方式查询接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// 查询客户的联系方式；客户不存在时返回 None
    async fn contact(&self, customer_id: Uuid) -> Result<Option<CustomerContact>>;
}

/// 固定联系方式目录
///
/// 客户主数据服务接入前的占位实现：对所有客户返回同一份联系方式。
/// 默认构造没有任何联系方式，事件驱动的通知会被跳过。
pub struct StaticDirectory {
    contact: CustomerContact,
}

impl StaticDirectory {
    pub fn new(email: Option<String>, phone: Option<String>) -> Self {
        Self {
            contact: CustomerContact { email, phone },
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl CustomerDirectory for StaticDirectory {
    async fn contact(&self, _customer_id: Uuid) -> Result<Option<CustomerContact>> {
        if self.contact.email.is_none() && self.contact.phone.is_none() {
            return Ok(None);
        }
        Ok(Some(self.contact.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_directory_has_no_contact() {
        let directory = StaticDirectory::with_defaults();
        let contact = directory.contact(Uuid::new_v4()).await.unwrap();
        assert!(contact.is_none());
    }

    #[tokio::test]
    async fn test_static_directory_returns_fixed_contact() {
        let directory = StaticDirectory::new(Some("ops@example.com".to_string()), None);
        let contact = directory.contact(Uuid::new_v4()).await.unwrap().unwrap();
        assert_eq!(contact.email.as_deref(), Some("ops@example.com"));
        assert!(contact.phone.is_none());
    }
}
