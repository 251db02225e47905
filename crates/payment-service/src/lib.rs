//! 支付服务
//!
//! 拥有支付聚合：支付单的创建、通过网关捕获、退款，
//! 并向消息通道发布支付结果事件。网关被封装在窄接口之后，
//! 业务逻辑不接触任何具体 SDK 类型。

pub mod error;
pub mod gateway;
pub mod models;
pub mod repository;
pub mod service;
