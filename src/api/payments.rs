//! 支付意向路由

use axum::{Extension, Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Payment router - requires authentication
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payment-intent", post(create_intent))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntentBody {
    #[validate(length(min = 1))]
    pub order_id: String,
}

/// 客户端 SDK 消费的字段名是网关约定的 camelCase
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// POST /api/payment-intent - 为订单创建 (或替换) 支付意向
pub async fn create_intent(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateIntentBody>,
) -> AppResult<Json<AppResponse<IntentResponse>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let handle = state
        .payment_broker()
        .create_intent(&user, &payload.order_id)
        .await?;

    Ok(ok(IntentResponse {
        client_secret: handle.client_secret,
        payment_intent_id: handle.intent_id,
    }))
}
