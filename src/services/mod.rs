//! Business Services
//!
//! 订单生命周期的三个角色：
//! - [`OrderService`]: 校验购物车、快照价格、原子预留库存并落库
//! - [`PaymentBroker`]: 包装外部支付网关，幂等地创建/替换支付意向
//! - [`Reconciler`]: 消费网关 webhook，幂等地驱动 PENDING -> PROCESSED

pub mod orders;
pub mod payments;
pub mod reconcile;

pub use orders::{CartLine, CreateOrderRequest, OrderService};
pub use payments::PaymentBroker;
pub use reconcile::Reconciler;
