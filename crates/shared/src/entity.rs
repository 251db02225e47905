//! 聚合根公共约定
//!
//! 所有聚合（订单、支付、通知）共享 id / created_at / updated_at /
//! is_deleted 审计字段。聚合永不物理删除：要么打软删除标记，
//! 要么迁移到终态状态。各聚合的业务编号（订单号、支付单号、通知编号）
//! 由统一的生成规则产生。

use chrono::Utc;
use uuid::Uuid;

/// 生成带日期前缀的业务编号
///
/// 格式：`<前缀>-<yyyyMMdd>-<8 位大写十六进制>`，
/// 如 `ORD-20250115-1A2B3C4D`。后 8 位取自 UUID v4 的十六进制表示。
pub fn generate_reference(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d"),
        hex[..8].to_uppercase()
    )
}
