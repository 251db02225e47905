//! 订单服务
//!
//! 拥有订单聚合：创建订单、状态流转、取消、发货与妥投，
//! 并向消息通道发布订单生命周期事件。单价与商品信息来自
//! 定价目录协作方，订单服务自身不持有商品主数据。

pub mod catalog;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
