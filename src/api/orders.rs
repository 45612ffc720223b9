//! 订单路由
//!
//! 所有权规则：普通用户只能看到/创建自己的订单，管理员不受限。
//! CurrentUser 由认证中间件注入 extensions。

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{OrderDetail, OrderSummary};
use crate::db::repository::OrderRepository;
use crate::services::CreateOrderRequest;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Order router - requires authentication
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders", post(create).get(list))
        .route("/api/orders/{id}", get(get_one))
}

/// POST /api/orders - 原子下单 (预留库存 + 落单)
pub async fn create(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<AppResponse<OrderDetail>>)> {
    let detail = state.order_service().create_order(&user, payload).await?;
    Ok((StatusCode::CREATED, ok(detail)))
}

/// GET /api/orders - 当前用户的订单列表 (新的在前)
pub async fn list(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<AppResponse<Vec<OrderSummary>>>> {
    let rows = OrderRepository::new(state.db.pool.clone())
        .list_for_user(&user.id)
        .await?;

    let summaries = rows
        .into_iter()
        .map(OrderSummary::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::integrity)?;

    Ok(ok(summaries))
}

/// GET /api/orders/{id} - 订单详情 (仅本人或管理员)
pub async fn get_one(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<OrderDetail>>> {
    let detail = OrderRepository::new(state.db.pool.clone())
        .find_detail(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id}")))?;

    if detail.user_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden("Not the owner of this order"));
    }

    Ok(ok(detail))
}
