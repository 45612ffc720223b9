//! Reconciler
//!
//! 把内部订单状态向网关持有的权威支付状态收敛。两路信号——网关异步
//! webhook 和客户端确认后的轮询——无序、可能重复地到达；这里只把
//! 成功事件当作幂等的推进：PENDING 守卫的条件更新是唯一的并发控制，
//! 输掉竞争的 worker 看到 PROCESSED 即视为成功 no-op。
//!
//! 任何处理失败都必须向上抛出 (非 2xx)，让网关的重投递机制兜底；
//! 吞掉事件会让订单在成功扣款后永久卡在 PENDING。

use chrono::{Duration, Utc};

use crate::db::DbService;
use crate::db::models::{OrderRow, OrderStatus};
use crate::db::repository::OrderRepository;
use crate::gateway::webhook::{EVENT_FAILED, EVENT_SUCCEEDED, GatewayEvent, IntentObject};
use crate::utils::{AppError, AppResult};

/// metadata 回退解析的时间窗 (小时)
///
/// webhook 可能先于意向引用的持久化到达，此时允许按 metadata 里的
/// 订单 ID 直查。时间窗避免迟到事件解析到陈旧/复用的订单 ID。
const METADATA_FALLBACK_WINDOW_HOURS: i64 = 24;

pub struct Reconciler {
    orders: OrderRepository,
}

impl Reconciler {
    pub fn new(db: DbService) -> Self {
        Self {
            orders: OrderRepository::new(db.pool.clone()),
        }
    }

    /// Apply one gateway event. Idempotent under replay and reordering.
    pub async fn apply_event(&self, event: &GatewayEvent) -> AppResult<()> {
        match event.event_type.as_str() {
            EVENT_SUCCEEDED => self.confirm(&event.data.object).await,
            EVENT_FAILED => {
                // 故意不对称：失败不是终态，订单留在 PENDING 可重试
                tracing::info!(
                    intent_id = %event.data.object.id,
                    "Payment failed; order stays pending and retryable"
                );
                Ok(())
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled event type");
                Ok(())
            }
        }
    }

    async fn confirm(&self, intent: &IntentObject) -> AppResult<()> {
        let Some(order) = self.resolve_order(intent).await? else {
            // 可重试失败：等网关重投递时订单可能已存在
            return Err(AppError::integrity(format!(
                "No order resolves for intent {}",
                intent.id
            )));
        };

        // 幂等守卫：重复或乱序投递在这里变成 no-op 成功
        if !order.is_pending() {
            tracing::debug!(order_id = %order.id, "Order already processed; no-op");
            return Ok(());
        }

        let affected = self
            .orders
            .mark_processed_if_pending(&order.id, &intent.id)
            .await?;

        // 写后校验：存储的状态必须确实是 PROCESSED，no-op 写视为失败
        let current = self
            .orders
            .find_row(&order.id)
            .await?
            .ok_or_else(|| AppError::integrity(format!("Order {} vanished", order.id)))?;

        match current.status() {
            Some(OrderStatus::Processed) => {
                if affected == 1 {
                    tracing::info!(
                        order_id = %order.id,
                        intent_id = %intent.id,
                        "Order reconciled to PROCESSED"
                    );
                } else {
                    // 并发 worker 赢了这次竞争；对外同样是成功
                    tracing::debug!(order_id = %order.id, "Concurrent reconcile won; no-op");
                }
                Ok(())
            }
            _ => Err(AppError::integrity(format!(
                "Post-write verification failed for order {}: status is {}",
                order.id, current.status
            ))),
        }
    }

    /// 两步解析：先按存储的意向引用，再按 metadata 里的订单 ID 回退
    async fn resolve_order(&self, intent: &IntentObject) -> AppResult<Option<OrderRow>> {
        if let Some(row) = self.orders.find_by_intent(&intent.id).await? {
            return Ok(Some(row));
        }

        if let Some(order_id) = intent.order_id() {
            if let Some(row) = self.orders.find_row(order_id).await? {
                let age = Utc::now() - row.created_at;
                if age <= Duration::hours(METADATA_FALLBACK_WINDOW_HOURS) {
                    return Ok(Some(row));
                }
                tracing::warn!(
                    order_id = %order_id,
                    intent_id = %intent.id,
                    "Metadata fallback outside window; refusing to resolve"
                );
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Address, NewOrder, NewOrderItem, NewSubOrder};
    use crate::db::testing::{seed_user, test_db};
    use std::collections::HashMap;

    fn succeeded(intent_id: &str, order_id: Option<&str>) -> GatewayEvent {
        event(EVENT_SUCCEEDED, intent_id, order_id)
    }

    fn event(event_type: &str, intent_id: &str, order_id: Option<&str>) -> GatewayEvent {
        let mut metadata = HashMap::new();
        if let Some(id) = order_id {
            metadata.insert("order_id".to_string(), id.to_string());
        }
        GatewayEvent {
            id: format!("evt_{intent_id}"),
            event_type: event_type.to_string(),
            data: crate::gateway::webhook::EventData {
                object: IntentObject {
                    id: intent_id.to_string(),
                    metadata,
                },
            },
        }
    }

    fn address_json() -> String {
        serde_json::to_string(&Address {
            line1: "1 Main St".into(),
            line2: None,
            city: "Springfield".into(),
            state: None,
            postal_code: "12345".into(),
            country: "US".into(),
        })
        .unwrap()
    }

    async fn insert_order(db: &crate::db::DbService, id: &str) {
        let order = NewOrder {
            id: id.to_string(),
            order_number: format!("ORD-TEST-{id}"),
            user_id: "u1".into(),
            total_cents: 1800,
            currency: "usd".into(),
            shipping_address: address_json(),
            billing_address: address_json(),
            created_at: Utc::now(),
            sub_orders: vec![NewSubOrder {
                seq: 1,
                items: vec![NewOrderItem {
                    product_id: "p1".into(),
                    product_name: "Product p1".into(),
                    quantity: 2,
                    unit_price_cents: 900,
                }],
            }],
        };
        let mut tx = db.pool.begin().await.unwrap();
        OrderRepository::insert_tree(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn status_of(db: &crate::db::DbService, order_id: &str) -> String {
        OrderRepository::new(db.pool.clone())
            .find_row(order_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn success_event_transitions_via_stored_reference() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;
        OrderRepository::new(db.pool.clone())
            .set_intent("o1", Some("pi_1"))
            .await
            .unwrap();

        let reconciler = Reconciler::new(db.clone());
        reconciler.apply_event(&succeeded("pi_1", None)).await.unwrap();

        assert_eq!(status_of(&db, "o1").await, "PROCESSED");
    }

    #[tokio::test]
    async fn replay_is_a_noop_success() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;
        OrderRepository::new(db.pool.clone())
            .set_intent("o1", Some("pi_1"))
            .await
            .unwrap();

        let reconciler = Reconciler::new(db.clone());
        let evt = succeeded("pi_1", None);
        reconciler.apply_event(&evt).await.unwrap();
        // Duplicate delivery of the same event
        reconciler.apply_event(&evt).await.unwrap();

        assert_eq!(status_of(&db, "o1").await, "PROCESSED");
    }

    #[tokio::test]
    async fn resolves_by_metadata_when_reference_not_yet_persisted() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;

        // Webhook arrives before the broker stored the reference
        let reconciler = Reconciler::new(db.clone());
        reconciler
            .apply_event(&succeeded("pi_1", Some("o1")))
            .await
            .unwrap();

        let row = OrderRepository::new(db.pool.clone())
            .find_row("o1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "PROCESSED");
        // The CAS also backfills the missing reference
        assert_eq!(row.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn metadata_fallback_is_time_bounded() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;

        // Age the order beyond the fallback window
        sqlx::query("UPDATE orders SET created_at = ?1 WHERE id = 'o1'")
            .bind(Utc::now() - Duration::hours(48))
            .execute(&db.pool)
            .await
            .unwrap();

        let reconciler = Reconciler::new(db.clone());
        let err = reconciler
            .apply_event(&succeeded("pi_1", Some("o1")))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Integrity(_)));
        assert_eq!(status_of(&db, "o1").await, "PENDING");
    }

    #[tokio::test]
    async fn unresolvable_event_is_a_retryable_failure() {
        let (db, _dir) = test_db().await;
        let reconciler = Reconciler::new(db.clone());

        // Order row not committed yet (webhook-before-commit race)
        let err = reconciler
            .apply_event(&succeeded("pi_1", Some("o1")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));

        // Gateway redelivers after the order exists; now it lands
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;
        reconciler
            .apply_event(&succeeded("pi_1", Some("o1")))
            .await
            .unwrap();
        assert_eq!(status_of(&db, "o1").await, "PROCESSED");
    }

    #[tokio::test]
    async fn failure_event_never_mutates_state() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;
        OrderRepository::new(db.pool.clone())
            .set_intent("o1", Some("pi_1"))
            .await
            .unwrap();

        let reconciler = Reconciler::new(db.clone());
        reconciler
            .apply_event(&event(EVENT_FAILED, "pi_1", Some("o1")))
            .await
            .unwrap();

        // Order stays PENDING and remains eligible for a fresh intent
        assert_eq!(status_of(&db, "o1").await, "PENDING");

        reconciler.apply_event(&succeeded("pi_1", None)).await.unwrap();
        assert_eq!(status_of(&db, "o1").await, "PROCESSED");
    }

    #[tokio::test]
    async fn unknown_event_types_are_acknowledged() {
        let (db, _dir) = test_db().await;
        let reconciler = Reconciler::new(db.clone());
        reconciler
            .apply_event(&event("charge.refunded", "pi_1", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_deliveries_transition_exactly_once() {
        let (db, _dir) = test_db().await;
        seed_user(&db, "u1", "customer").await;
        insert_order(&db, "o1").await;
        OrderRepository::new(db.pool.clone())
            .set_intent("o1", Some("pi_1"))
            .await
            .unwrap();

        let r1 = Reconciler::new(db.clone());
        let r2 = Reconciler::new(db.clone());
        let evt = succeeded("pi_1", None);

        // The losing worker must observe PROCESSED and report success
        let (a, b) = tokio::join!(r1.apply_event(&evt), r2.apply_event(&evt));
        a.unwrap();
        b.unwrap();

        assert_eq!(status_of(&db, "o1").await, "PROCESSED");
    }
}
