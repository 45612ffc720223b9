use std::sync::Arc;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::gateway::stripe::StripeGateway;
use crate::gateway::webhook::WebhookVerifier;
use crate::gateway::PaymentGateway;
use crate::services::{OrderService, PaymentBroker, Reconciler};
use crate::utils::AppError;

/// 服务器状态 - 持有所有服务的共享引用
///
/// ServerState 是进程内唯一的依赖容器，所有仓储和服务都从这里注入，
/// 不使用全局可变状态。使用 Arc 实现浅拷贝，克隆成本极低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | SQLite 连接池 |
/// | jwt_service | JWT 主体解析 |
/// | gateway | 支付网关客户端 (未配置时为 None) |
/// | webhook_verifier | webhook 签名验证器 (未配置时为 None) |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 数据库服务
    pub db: DbService,
    /// JWT 认证服务
    pub jwt_service: Arc<JwtService>,
    /// 支付网关客户端
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    /// webhook 签名验证器
    pub webhook_verifier: Option<Arc<WebhookVerifier>>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 打开数据库 (执行迁移)、构造网关客户端。网关密钥缺失不阻止启动，
    /// 只会让支付相关接口返回 503。
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new(&config.database_path).await?;

        let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));

        let gateway: Option<Arc<dyn PaymentGateway>> = match &config.stripe_secret_key {
            Some(key) => {
                let client = StripeGateway::new(
                    key.clone(),
                    config.stripe_api_base.clone(),
                    config.gateway_timeout_ms,
                )
                .map_err(|e| AppError::internal(format!("Gateway client init failed: {e}")))?;
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set; payment intents unavailable");
                None
            }
        };

        let webhook_verifier = config.stripe_webhook_secret.as_ref().map(|secret| {
            Arc::new(WebhookVerifier::new(secret, config.webhook_tolerance_secs))
        });
        if webhook_verifier.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook endpoint unavailable");
        }

        Ok(Self {
            config: config.clone(),
            db,
            jwt_service,
            gateway,
            webhook_verifier,
        })
    }

    /// 订单创建服务
    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.db.clone(), self.config.txn_timeout_ms)
    }

    /// 支付中介
    pub fn payment_broker(&self) -> PaymentBroker {
        PaymentBroker::new(self.db.clone(), self.gateway.clone())
    }

    /// 对账状态机
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.db.clone())
    }
}
