/// 服务器配置 - 所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | DATABASE_PATH | store.db | SQLite 数据库路径 |
/// | JWT_SECRET | (dev fallback) | JWT 签名密钥 |
/// | STRIPE_SECRET_KEY | (未配置) | 支付网关密钥 |
/// | STRIPE_WEBHOOK_SECRET | (未配置) | webhook 签名密钥 |
/// | STRIPE_API_BASE | https://api.stripe.com | 网关 API 地址 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | TXN_TIMEOUT_MS | 5000 | 下单事务执行预算(毫秒) |
/// | GATEWAY_TIMEOUT_MS | 15000 | 网关调用超时(毫秒) |
/// | ENVIRONMENT | development | 运行环境 |
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// SQLite 数据库文件路径
    pub database_path: String,
    /// JWT 签名密钥
    pub jwt_secret: String,
    /// 支付网关密钥 (未配置时支付接口返回 503)
    pub stripe_secret_key: Option<String>,
    /// webhook 签名密钥 (未配置时 webhook 接口返回 503)
    pub stripe_webhook_secret: Option<String>,
    /// 网关 API 地址 (测试时指向本地 mock)
    pub stripe_api_base: String,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 下单事务执行预算 (毫秒)；超时整体回滚
    pub txn_timeout_ms: u64,
    /// 网关调用超时 (毫秒)
    pub gateway_timeout_ms: u64,
    /// webhook 时间戳容差 (秒)
    pub webhook_tolerance_secs: i64,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "store.db".into()),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-only-jwt-secret-must-be-replaced".into()),
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok().filter(|s| !s.is_empty()),
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            stripe_api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            txn_timeout_ms: std::env::var("TXN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(15000),
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(300),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
