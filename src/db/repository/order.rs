//! Order Repository
//!
//! 订单聚合的持久化。两个可变字段都有专门的条件更新：
//! - `set_intent` / `clear_intent`: 支付意向引用
//! - `mark_processed_if_pending`: PENDING 守卫的状态 CAS，
//!   `rows_affected` 即比较交换的结果

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use super::{RepoError, RepoResult};
use crate::db::models::{
    Address, NewOrder, OrderDetail, OrderItemDetail, OrderItemRow, OrderRow, OrderStatus,
    SubOrderDetail, SubOrderRow,
};
use crate::utils::money::cents_to_string;

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the whole order tree (order + sub-orders + items)
    ///
    /// Runs on the caller's transaction so the insert commits or rolls
    /// back together with the stock reservation.
    pub async fn insert_tree(conn: &mut SqliteConnection, order: &NewOrder) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO orders
                (id, order_number, user_id, status, total_cents, currency,
                 shipping_address, billing_address, payment_intent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'PENDING', ?4, ?5, ?6, ?7, NULL, ?8, ?8)",
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.total_cents)
        .bind(&order.currency)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.created_at)
        .execute(&mut *conn)
        .await?;

        for sub in &order.sub_orders {
            let sub_id = uuid::Uuid::new_v4().to_string();
            sqlx::query("INSERT INTO sub_orders (id, order_id, seq) VALUES (?1, ?2, ?3)")
                .bind(&sub_id)
                .bind(&order.id)
                .bind(sub.seq)
                .execute(&mut *conn)
                .await?;

            for item in &sub.items {
                sqlx::query(
                    "INSERT INTO order_items
                        (id, sub_order_id, product_id, product_name, quantity, unit_price_cents)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&sub_id)
                .bind(&item.product_id)
                .bind(&item.product_name)
                .bind(item.quantity)
                .bind(item.unit_price_cents)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }

    /// Find the order row by id
    pub async fn find_row(&self, id: &str) -> RepoResult<Option<OrderRow>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, order_number, user_id, status, total_cents, currency,
                    shipping_address, billing_address, payment_intent_id, created_at, updated_at
             FROM orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Find the order row by its stored payment-intent reference
    pub async fn find_by_intent(&self, intent_id: &str) -> RepoResult<Option<OrderRow>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, order_number, user_id, status, total_cents, currency,
                    shipping_address, billing_address, payment_intent_id, created_at, updated_at
             FROM orders WHERE payment_intent_id = ?1",
        )
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// List a user's orders, newest first
    pub async fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<OrderRow>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, order_number, user_id, status, total_cents, currency,
                    shipping_address, billing_address, payment_intent_id, created_at, updated_at
             FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get the full order tree
    pub async fn find_detail(&self, id: &str) -> RepoResult<Option<OrderDetail>> {
        let Some(row) = self.find_row(id).await? else {
            return Ok(None);
        };

        let subs = sqlx::query_as::<_, SubOrderRow>(
            "SELECT id, order_id, seq FROM sub_orders WHERE order_id = ?1 ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut sub_orders = Vec::with_capacity(subs.len());
        for sub in subs {
            let items = sqlx::query_as::<_, OrderItemRow>(
                "SELECT id, sub_order_id, product_id, product_name, quantity, unit_price_cents
                 FROM order_items WHERE sub_order_id = ?1",
            )
            .bind(&sub.id)
            .fetch_all(&self.pool)
            .await?;

            sub_orders.push(SubOrderDetail {
                id: sub.id,
                seq: sub.seq,
                items: items.into_iter().map(OrderItemDetail::from).collect(),
            });
        }

        Ok(Some(Self::assemble_detail(row, sub_orders)?))
    }

    fn assemble_detail(row: OrderRow, sub_orders: Vec<SubOrderDetail>) -> RepoResult<OrderDetail> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| RepoError::Database(format!("Unknown order status: {}", row.status)))?;
        let shipping_address: Address = serde_json::from_str(&row.shipping_address)
            .map_err(|e| RepoError::Database(format!("Corrupt shipping address: {e}")))?;
        let billing_address: Address = serde_json::from_str(&row.billing_address)
            .map_err(|e| RepoError::Database(format!("Corrupt billing address: {e}")))?;

        Ok(OrderDetail {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status,
            total_amount: cents_to_string(row.total_cents),
            currency: row.currency,
            shipping_address,
            billing_address,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
            sub_orders,
        })
    }

    /// Set or clear the payment-intent reference
    pub async fn set_intent(&self, order_id: &str, intent_id: Option<&str>) -> RepoResult<()> {
        let result =
            sqlx::query("UPDATE orders SET payment_intent_id = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(order_id)
                .bind(intent_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Order {order_id}")));
        }
        Ok(())
    }

    /// Compare-and-swap: PENDING -> PROCESSED, in a single conditional
    /// update. Also stores the intent reference if it is not set yet
    /// (covers the webhook-before-broker race). Returns the number of
    /// rows affected — 0 means the guard did not match.
    pub async fn mark_processed_if_pending(
        &self,
        order_id: &str,
        intent_id: &str,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = 'PROCESSED',
                 payment_intent_id = COALESCE(payment_intent_id, ?2),
                 updated_at = ?3
             WHERE id = ?1 AND status = 'PENDING'",
        )
        .bind(order_id)
        .bind(intent_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
