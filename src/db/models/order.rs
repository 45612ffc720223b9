//! Order Model
//!
//! 订单聚合：Order 1..N SubOrder 1..N OrderItem。
//! 金额和地址在创建时快照，之后不可变；订单只有两个可变字段：
//! `status` (仅 PENDING -> PROCESSED) 和 `payment_intent_id`。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::money::cents_to_string;

/// 订单状态
///
/// 状态机只有一条边：PENDING -> PROCESSED。支付失败不建模为状态，
/// 订单停留在 PENDING 以便重新发起支付。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSED")]
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSED" => Some(OrderStatus::Processed),
            _ => None,
        }
    }
}

/// 地址快照 - 按值捕获，后续地址编辑不影响已下订单
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2))]
    pub country: String,
}

/// orders 表行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: String,
    pub total_cents: i64,
    pub currency: String,
    /// JSON 快照
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending.as_str()
    }
}

/// sub_orders 表行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubOrderRow {
    pub id: String,
    pub order_id: String,
    pub seq: i64,
}

/// order_items 表行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: String,
    pub sub_order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

// =============================================================================
// Insert payloads (service -> repository)
// =============================================================================

/// 新订单行项 (单价为下单时快照，已含折扣)
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewSubOrder {
    pub seq: i64,
    pub items: Vec<NewOrderItem>,
}

/// 待插入的完整订单树
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub total_cents: i64,
    pub currency: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub created_at: DateTime<Utc>,
    pub sub_orders: Vec<NewSubOrder>,
}

// =============================================================================
// API views
// =============================================================================

/// 行项视图
#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetail {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: String,
    pub line_total: String,
}

impl From<OrderItemRow> for OrderItemDetail {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: cents_to_string(row.unit_price_cents),
            line_total: cents_to_string(row.unit_price_cents * row.quantity),
        }
    }
}

/// 子订单视图
#[derive(Debug, Clone, Serialize)]
pub struct SubOrderDetail {
    pub id: String,
    pub seq: i64,
    pub items: Vec<OrderItemDetail>,
}

/// 订单完整视图 (含子订单树)
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub total_amount: String,
    pub currency: String,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sub_orders: Vec<SubOrderDetail>,
}

/// 订单列表视图 (不含行项)
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for OrderSummary {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| format!("Unknown order status: {}", row.status))?;
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            status,
            total_amount: cents_to_string(row.total_cents),
            currency: row.currency,
            created_at: row.created_at,
        })
    }
}
