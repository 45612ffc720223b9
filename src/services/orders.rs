//! Order Creation Service
//!
//! 一个事务完成 "校验库存 + 预留 + 插入订单树"。价格快照在事务内读取，
//! 并发改价不会产生与预留价格不一致的订单总额。预留失败整体回滚——
//! 不存在没有真实预留库存的订单。

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::models::{Address, NewOrder, NewOrderItem, NewSubOrder, OrderDetail};
use crate::db::repository::inventory::ReserveLine;
use crate::db::repository::{InventoryLedger, OrderRepository, ProductRepository, UserRepository};
use crate::utils::money::discounted_unit_price_cents;
use crate::utils::{AppError, AppResult};

/// 购物车行
///
/// 数量上限是金额算术的护栏，不是业务限制。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartLine {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: i64,
}

/// 下单请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// 目标用户；缺省为调用者本人，仅管理员可代下单
    pub user_id: Option<String>,
    #[validate(length(min = 1, message = "cart must not be empty"), nested)]
    pub items: Vec<CartLine>,
    #[validate(nested)]
    pub shipping_address: Address,
    #[validate(nested)]
    pub billing_address: Address,
}

pub struct OrderService {
    db: DbService,
    txn_timeout: Duration,
}

impl OrderService {
    pub fn new(db: DbService, txn_timeout_ms: u64) -> Self {
        Self {
            db,
            txn_timeout: Duration::from_millis(txn_timeout_ms),
        }
    }

    /// Create an order: validate, snapshot prices, reserve stock, persist.
    pub async fn create_order(
        &self,
        actor: &CurrentUser,
        req: CreateOrderRequest,
    ) -> AppResult<OrderDetail> {
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;

        let user_id = self.resolve_target_user(actor, req.user_id.as_deref()).await?;
        let lines = merge_lines(&req.items);

        let shipping = serde_json::to_string(&req.shipping_address)
            .map_err(|e| AppError::internal(format!("Address serialization failed: {e}")))?;
        let billing = serde_json::to_string(&req.billing_address)
            .map_err(|e| AppError::internal(format!("Address serialization failed: {e}")))?;

        // 事务执行预算：超时则丢弃事务 (连接归还时回滚)，错误可整体重试
        let order_id = tokio::time::timeout(
            self.txn_timeout,
            self.run_creation_txn(&user_id, &lines, shipping, billing),
        )
        .await
        .map_err(|_| AppError::database("Order creation transaction timed out"))??;

        // Read-after-commit: convenience read outside the transaction
        let detail = OrderRepository::new(self.db.pool.clone())
            .find_detail(&order_id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Order {order_id} vanished after commit")))?;

        tracing::info!(
            order_id = %detail.id,
            order_number = %detail.order_number,
            total = %detail.total_amount,
            "Order created"
        );

        Ok(detail)
    }

    /// 目标用户解析：非管理员只能给自己下单
    async fn resolve_target_user(
        &self,
        actor: &CurrentUser,
        requested: Option<&str>,
    ) -> AppResult<String> {
        let target = match requested {
            Some(id) if id != actor.id => {
                if !actor.is_admin() {
                    return Err(AppError::forbidden(
                        "Only admins may create orders for other users",
                    ));
                }
                id.to_string()
            }
            _ => actor.id.clone(),
        };

        UserRepository::new(self.db.pool.clone())
            .find_by_id(&target)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {target}")))?;

        Ok(target)
    }

    async fn run_creation_txn(
        &self,
        user_id: &str,
        lines: &[(String, i64)],
        shipping_address: String,
        billing_address: String,
    ) -> AppResult<String> {
        // BEGIN IMMEDIATE: 立刻占写锁槽，等待上限由 busy_timeout 约束
        let mut tx: Transaction<'_, Sqlite> = self
            .db
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total_cents: i64 = 0;
        let mut currency: Option<String> = None;

        for (product_id, quantity) in lines {
            let product = ProductRepository::find_by_id_tx(&mut tx, product_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;

            match &currency {
                None => currency = Some(product.currency.clone()),
                Some(c) if *c != product.currency => {
                    return Err(AppError::validation("Cart mixes currencies"));
                }
                _ => {}
            }

            // 单价快照：下单时点、已含折扣，此后不可变
            let unit_price_cents =
                discounted_unit_price_cents(product.price_cents, product.discount_percent);
            let line_total = unit_price_cents
                .checked_mul(*quantity)
                .ok_or_else(|| AppError::validation("Order total out of range"))?;
            total_cents = total_cents
                .checked_add(line_total)
                .ok_or_else(|| AppError::validation("Order total out of range"))?;

            items.push(NewOrderItem {
                product_id: product_id.clone(),
                product_name: product.name,
                quantity: *quantity,
                unit_price_cents,
            });
        }

        let currency = currency.ok_or_else(|| AppError::validation("Cart must not be empty"))?;

        let reserve_lines: Vec<ReserveLine> = lines
            .iter()
            .map(|(product_id, quantity)| ReserveLine {
                product_id: product_id.clone(),
                quantity: *quantity,
            })
            .collect();
        InventoryLedger::reserve(&mut tx, &reserve_lines).await?;

        let order = NewOrder {
            id: Uuid::new_v4().to_string(),
            order_number: generate_order_number(),
            user_id: user_id.to_string(),
            total_cents,
            currency,
            shipping_address,
            billing_address,
            created_at: Utc::now(),
            sub_orders: vec![NewSubOrder { seq: 1, items }],
        };
        OrderRepository::insert_tree(&mut tx, &order).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit order: {e}")))?;

        Ok(order.id)
    }
}

/// 合并重复商品行，保持首次出现的顺序
fn merge_lines(items: &[CartLine]) -> Vec<(String, i64)> {
    let mut merged: Vec<(String, i64)> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            // 每行数量已验证有界；饱和加法兜底合并后的和
            Some((_, qty)) => *qty = qty.saturating_add(item.quantity),
            None => merged.push((item.product_id.clone(), item.quantity)),
        }
    }
    merged
}

/// 生成可读订单号: ORD-<UTC 时间>-<随机后缀>
///
/// order_number 上的唯一索引兜底碰撞。
fn generate_order_number() -> String {
    format!(
        "ORD-{}-{:04X}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u16>()
    )
}
