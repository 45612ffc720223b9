//! Payment Broker
//!
//! 包装外部支付网关。幂等键由订单身份确定性派生 (`order-<id>`)，
//! 客户端重试不会在网关侧产生第二个活跃意向。已有旧意向时先清除
//! 本地引用、再尽力取消旧意向——中途崩溃也不会留下指向已取消意向
//! 的悬挂引用。

use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::models::OrderRow;
use crate::db::repository::OrderRepository;
use crate::gateway::{
    CreateIntentRequest, GatewayError, IntentHandle, MIN_CHARGE_CENTS, PaymentGateway,
};
use crate::utils::money::is_valid_currency;
use crate::utils::{AppError, AppResult};

pub struct PaymentBroker {
    orders: OrderRepository,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl PaymentBroker {
    pub fn new(db: DbService, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self {
            orders: OrderRepository::new(db.pool.clone()),
            gateway,
        }
    }

    /// Create (or supersede) the payment intent for an order.
    pub async fn create_intent(
        &self,
        actor: &CurrentUser,
        order_id: &str,
    ) -> AppResult<IntentHandle> {
        let order = self
            .orders
            .find_row(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        if order.user_id != actor.id && !actor.is_admin() {
            return Err(AppError::forbidden("Not the owner of this order"));
        }

        if !order.is_pending() {
            return Err(AppError::conflict("Order already processed"));
        }

        validate_chargeable(&order)?;

        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| AppError::unavailable("Payment gateway is not configured"))?;

        // 替换旧意向：先清引用再取消，取消失败 (意向已终态) 只记日志
        if let Some(old_intent) = order.payment_intent_id.as_deref() {
            self.orders.set_intent(&order.id, None).await?;
            if let Err(e) = gateway.cancel_intent(old_intent).await {
                tracing::warn!(
                    order_id = %order.id,
                    intent_id = %old_intent,
                    error = %e,
                    "Best-effort cancel of superseded intent failed"
                );
            }
        }

        let handle = gateway
            .create_intent(CreateIntentRequest {
                amount_cents: order.total_cents,
                currency: order.currency.clone(),
                order_id: order.id.clone(),
                idempotency_key: format!("order-{}", order.id),
            })
            .await
            .map_err(map_gateway_error)?;

        self.orders
            .set_intent(&order.id, Some(&handle.intent_id))
            .await?;

        tracing::info!(
            order_id = %order.id,
            intent_id = %handle.intent_id,
            "Payment intent created"
        );

        Ok(handle)
    }
}

/// 金额/货币校验：非正数、低于网关最小扣款额、不合法货币码都拒绝
fn validate_chargeable(order: &OrderRow) -> AppResult<()> {
    if order.total_cents <= 0 {
        return Err(AppError::validation("Order total must be positive"));
    }
    if order.total_cents < MIN_CHARGE_CENTS {
        return Err(AppError::validation(
            "Order total is below the minimum chargeable amount",
        ));
    }
    if !is_valid_currency(&order.currency) {
        return Err(AppError::validation(format!(
            "Malformed currency code: {}",
            order.currency
        )));
    }
    Ok(())
}

/// 网关错误 -> 错误分类边界
///
/// 网关的验证拒绝是支付处理错误，不是客户端验证错误；
/// 不可达/未配置渲染为 "payments temporarily unavailable"。
fn map_gateway_error(e: GatewayError) -> AppError {
    match e {
        GatewayError::Rejected(msg) => AppError::payment(msg),
        GatewayError::Unreachable(msg) => AppError::unavailable(msg),
        GatewayError::Protocol(msg) => AppError::internal(format!("Gateway protocol error: {msg}")),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted gateway double shared by broker and flow tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use crate::gateway::{CreateIntentRequest, GatewayError, IntentHandle, PaymentGateway};

    #[derive(Default)]
    pub struct MockGateway {
        pub created: Mutex<Vec<CreateIntentRequest>>,
        pub cancelled: Mutex<Vec<String>>,
        pub fail_create: bool,
        pub fail_cancel: bool,
        pub counter: AtomicU64,
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_intent(
            &self,
            req: CreateIntentRequest,
        ) -> Result<IntentHandle, GatewayError> {
            if self.fail_create {
                return Err(GatewayError::Rejected(
                    "amount_too_small: Amount must convert to at least 50 cents".into(),
                ));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.created.lock().unwrap().push(req);
            Ok(IntentHandle {
                intent_id: format!("pi_{n}"),
                client_secret: format!("pi_{n}_secret"),
            })
        }

        async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
            if self.fail_cancel {
                return Err(GatewayError::Rejected(
                    "payment_intent_unexpected_state: already canceled".into(),
                ));
            }
            self.cancelled.lock().unwrap().push(intent_id.to_string());
            Ok(())
        }
    }
}
