//! 商品目录路由 (只读)

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::core::ServerState;
use crate::db::models::ProductView;
use crate::db::repository::ProductRepository;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Catalog router - requires authentication
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/products", get(list))
        .route("/api/products/{id}", get(get_one))
}

/// GET /api/products - 在售商品列表
pub async fn list(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<ProductView>>>> {
    let products = ProductRepository::new(state.db.pool.clone())
        .find_all()
        .await?;
    Ok(ok(products.into_iter().map(ProductView::from).collect()))
}

/// GET /api/products/{id} - 单个商品
pub async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<ProductView>>> {
    let product = ProductRepository::new(state.db.pool.clone())
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id}")))?;
    Ok(ok(product.into()))
}
