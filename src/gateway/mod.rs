//! 支付网关模块
//!
//! 外部网关是支付状态的唯一权威；本地从不信任自己缓存的支付状态。
//! [`PaymentGateway`] 是服务层的接缝，生产实现是 [`stripe::StripeGateway`]，
//! 测试用脚本化 mock。

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

/// 网关允许的最小扣款金额 (minor units)
pub const MIN_CHARGE_CENTS: i64 = 50;

/// 创建支付意向的请求
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    /// 金额 (minor units)
    pub amount_cents: i64,
    /// 货币代码 (小写三字母)
    pub currency: String,
    /// 订单 ID，写入意向 metadata 供 webhook 回查
    pub order_id: String,
    /// 幂等键，由订单身份确定性派生
    pub idempotency_key: String,
}

/// 网关返回的意向句柄
#[derive(Debug, Clone)]
pub struct IntentHandle {
    pub intent_id: String,
    pub client_secret: String,
}

/// 网关错误 - 外部错误码在客户端边界翻译成这个封闭枚举
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 网关拒绝了请求 (金额、货币、意向状态等)
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    /// 传输失败或超时，稍后重试安全
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),

    /// 响应无法解析
    #[error("Unexpected gateway response: {0}")]
    Protocol(String),
}

/// 支付网关客户端
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 创建支付意向。同一幂等键重复调用不会在网关侧产生第二个意向。
    async fn create_intent(&self, req: CreateIntentRequest) -> Result<IntentHandle, GatewayError>;

    /// 取消支付意向。对已终态的意向网关会拒绝；调用方按尽力而为处理。
    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError>;
}
