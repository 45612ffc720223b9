//! Store Server - 在线商店订单与支付对账引擎
//!
//! # 架构概述
//!
//! - **数据库** (`db`): SQLite 连接池、迁移与仓储层
//! - **认证** (`auth`): JWT 主体解析 (principal resolver)
//! - **支付网关** (`gateway`): 外部网关客户端 + webhook 签名验证
//! - **业务服务** (`services`): 下单、支付中介、对账状态机
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! store-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证
//! ├── db/            # 数据库层 (模型 + 仓储)
//! ├── gateway/       # 支付网关客户端
//! ├── services/      # 订单创建、支付中介、对账
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod gateway;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService, Role};
pub use core::{Config, Server, ServerState};
pub use db::DbService;
pub use utils::{AppError, AppResult};

/// 设置运行环境: dotenv + 日志
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    utils::logger::init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}
