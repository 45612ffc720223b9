//! 网关 webhook 路由
//!
//! 唯一的非 JWT 写入口。签名在原始字节上验证，验证失败一律 400 且
//! 不触碰任何状态；对账失败返回 5xx，让网关按退避策略重投递。

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::core::ServerState;
use crate::gateway::webhook::{GatewayEvent, SignatureError};
use crate::utils::{AppError, AppResult};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook router - signature-authenticated (mounted outside JWT auth)
pub fn router() -> Router<ServerState> {
    Router::new().route("/webhooks/payment-gateway", post(receive))
}

/// POST /webhooks/payment-gateway - 接收并对账网关事件
pub async fn receive(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let verifier = state
        .webhook_verifier
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Webhook verification is not configured"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::validation("Missing signature header"))?;

    verifier
        .verify(&body, signature, Utc::now().timestamp())
        .map_err(|e| match e {
            SignatureError::Malformed => AppError::validation("Malformed signature header"),
            SignatureError::Expired => AppError::validation("Signature timestamp expired"),
            SignatureError::Mismatch => AppError::validation("Signature verification failed"),
        })?;

    let event: GatewayEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("Malformed event payload: {e}")))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook received");

    state.reconciler().apply_event(&event).await?;

    Ok(Json(json!({ "received": true })))
}
