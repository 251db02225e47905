//! 通知服务
//!
//! 拥有通知聚合：命令触发的单条/模板通知、订单事件触发的
//! 模板通知、失败通知的重试调度。邮件与短信通过各自的渠道
//! 适配器投递，适配器失败不会破坏本地通知状态。

pub mod channels;
pub mod consumer;
pub mod directory;
pub mod error;
pub mod models;
pub mod repository;
pub mod retry;
pub mod service;
pub mod templates;
