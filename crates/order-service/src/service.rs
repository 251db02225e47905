//! 订单生命周期服务
//!
//! 处理订单的创建与状态流转，并发布对应的领域事件。
//! 事件发布在存储写入提交之后进行，是尽力而为的：发布失败
//! 只记录日志，不回滚已提交的订单数据。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use commerce_shared::channel::MessageProducer;
use commerce_shared::entity::generate_reference;
use commerce_shared::error::CommerceError;
use commerce_shared::events::{DomainEvent, EventEnvelope, OrderLine, topics};

use crate::catalog::ProductCatalog;
use crate::error::{OrderError, Result};
use crate::models::{AddressType, Order, OrderAddress, OrderItem, OrderStatus};
use crate::repository::OrderRepositoryTrait;

/// 税率 8%
fn tax_rate() -> Decimal {
    Decimal::new(8, 2)
}

/// 固定运费 9.99
fn shipping_fee() -> Decimal {
    Decimal::new(999, 2)
}

// ---------------------------------------------------------------------------
// 命令定义
// ---------------------------------------------------------------------------

/// 创建订单的订单行请求
#[derive(Debug, Clone)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// 地址输入
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: String,
    pub email: String,
}

/// 创建订单命令
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub customer_id: Uuid,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: AddressInput,
    pub billing_address: AddressInput,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// OrderService
// ---------------------------------------------------------------------------

/// 订单服务
///
/// 仓储、定价目录与消息通道均为显式注入的能力接口。
pub struct OrderService {
    repo: Arc<dyn OrderRepositoryTrait>,
    catalog: Arc<dyn ProductCatalog>,
    producer: Arc<dyn MessageProducer>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepositoryTrait>,
        catalog: Arc<dyn ProductCatalog>,
        producer: Arc<dyn MessageProducer>,
    ) -> Self {
        Self {
            repo,
            catalog,
            producer,
        }
    }

    /// 创建订单
    ///
    /// 校验订单行、从定价目录解析单价、计算各项金额，订单/订单项/地址
    /// 原子落库后发布 OrderCreated。
    #[instrument(skip(self, command), fields(customer_id = %command.customer_id))]
    pub async fn create_order(&self, command: CreateOrderCommand) -> Result<Order> {
        if command.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        for item in &command.items {
            if item.quantity < 1 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let mut items = Vec::with_capacity(command.items.len());
        let mut subtotal = Decimal::ZERO;
        for request in &command.items {
            let quote = self.catalog.quote(request.product_id).await?;
            let total_price = quote.unit_price * Decimal::from(request.quantity);
            subtotal += total_price;

            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: request.product_id,
                product_name: quote.product_name,
                quantity: request.quantity,
                unit_price: quote.unit_price,
                total_price,
                product_image_url: None,
                created_at: now,
                updated_at: None,
                is_deleted: false,
            });
        }

        let tax_amount = subtotal * tax_rate();
        let shipping_amount = shipping_fee();
        let discount_amount = Decimal::ZERO;
        let total_amount = subtotal + tax_amount + shipping_amount - discount_amount;

        let order = Order {
            id: order_id,
            customer_id: command.customer_id,
            order_number: generate_reference("ORD"),
            status: OrderStatus::Pending,
            total_amount,
            tax_amount,
            shipping_amount,
            discount_amount,
            order_date: now,
            shipped_date: None,
            delivered_date: None,
            notes: command.notes,
            created_at: now,
            updated_at: None,
            is_deleted: false,
        };

        let addresses = vec![
            build_address(order_id, AddressType::Shipping, &command.shipping_address, now),
            build_address(order_id, AddressType::Billing, &command.billing_address, now),
        ];

        self.repo.create_order(&order, &items, &addresses).await?;

        let lines: Vec<OrderLine> = items
            .iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            })
            .collect();

        self.publish_best_effort(
            topics::ORDER_EVENTS,
            DomainEvent::OrderCreated {
                order_id,
                customer_id: order.customer_id,
                items: lines,
                total_amount: order.total_amount,
                status: order.status.to_string(),
                order_date: order.order_date,
            },
        )
        .await;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_amount = %order.total_amount,
            "订单已创建"
        );

        Ok(order)
    }

    /// 更新订单状态
    ///
    /// 无条件覆盖：不做状态迁移表校验，任何状态都可以跟在任何状态之后。
    #[instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        let mut order = self.require_order(order_id).await?;

        let old_status = order.status;
        let now = Utc::now();
        order.status = new_status;
        if let Some(notes) = notes {
            order.notes = Some(notes);
        }
        order.updated_at = Some(now);

        self.repo.update_order(&order).await?;
        self.publish_status_changed(order_id, old_status, order.status, now)
            .await;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %order.status,
            "订单状态已更新"
        );

        Ok(order)
    }

    /// 取消订单
    #[instrument(skip(self, reason))]
    pub async fn cancel(&self, order_id: Uuid, reason: &str) -> Result<bool> {
        let mut order = self.require_order(order_id).await?;

        let now = Utc::now();
        order.status = OrderStatus::Cancelled;
        order.updated_at = Some(now);

        self.repo.update_order(&order).await?;

        self.publish_best_effort(
            topics::ORDER_CANCELLED,
            DomainEvent::OrderCancelled {
                order_id,
                reason: reason.to_string(),
                cancelled_at: now,
            },
        )
        .await;

        info!(order_id = %order_id, reason, "订单已取消");
        Ok(true)
    }

    /// 发货
    ///
    /// 运单号只记录日志，不落库。
    #[instrument(skip(self))]
    pub async fn ship(&self, order_id: Uuid, tracking_number: &str) -> Result<Order> {
        let mut order = self.require_order(order_id).await?;

        let old_status = order.status;
        let now = Utc::now();
        order.status = OrderStatus::Shipped;
        order.shipped_date = Some(now);
        order.updated_at = Some(now);

        self.repo.update_order(&order).await?;
        self.publish_status_changed(order_id, old_status, order.status, now)
            .await;

        info!(order_id = %order_id, tracking_number, "订单已发货");
        Ok(order)
    }

    /// 妥投
    #[instrument(skip(self))]
    pub async fn deliver(&self, order_id: Uuid) -> Result<Order> {
        let mut order = self.require_order(order_id).await?;

        let old_status = order.status;
        let now = Utc::now();
        order.status = OrderStatus::Delivered;
        order.delivered_date = Some(now);
        order.updated_at = Some(now);

        self.repo.update_order(&order).await?;
        self.publish_status_changed(order_id, old_status, order.status, now)
            .await;

        info!(order_id = %order_id, "订单已妥投");
        Ok(order)
    }

    async fn require_order(&self, order_id: Uuid) -> Result<Order> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| {
                OrderError::Shared(CommerceError::NotFound {
                    entity: "Order".to_string(),
                    id: order_id.to_string(),
                })
            })
    }

    async fn publish_status_changed(
        &self,
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) {
        self.publish_best_effort(
            topics::ORDER_STATUS_UPDATED,
            DomainEvent::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
                updated_at,
            },
        )
        .await;
    }

    /// 事件发布是尽力而为：失败只记录日志，已提交的存储写入不回滚
    async fn publish_best_effort(&self, topic: &str, event: DomainEvent) {
        let envelope = EventEnvelope::new(event);
        if let Err(e) = self.producer.publish(topic, &envelope).await {
            warn!(
                topic,
                event_type = envelope.event_type(),
                error = %e,
                "事件发布失败，存储写入不回滚"
            );
        }
    }
}

fn build_address(
    order_id: Uuid,
    address_type: AddressType,
    input: &AddressInput,
    now: DateTime<Utc>,
) -> OrderAddress {
    OrderAddress {
        id: Uuid::new_v4(),
        order_id,
        address_type,
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        street_address: input.street_address.clone(),
        street_address2: input.street_address2.clone(),
        city: input.city.clone(),
        state: input.state.clone(),
        postal_code: input.postal_code.clone(),
        country: input.country.clone(),
        phone_number: input.phone_number.clone(),
        email: input.email.clone(),
        created_at: now,
        updated_at: None,
        is_deleted: false,
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
