//! Stripe 网关客户端
//!
//! 直接走 REST 线协议 (form-encoded)，不引入官方 SDK。
//! 幂等键通过 `Idempotency-Key` 头传递。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CreateIntentRequest, GatewayError, IntentHandle, PaymentGateway};

/// 意向创建成功响应 (只取需要的字段)
#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

/// 网关错误响应体
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    /// Build the client with rustls and a per-request timeout
    pub fn new(secret_key: String, api_base: String, timeout_ms: u64) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn read_error(resp: reqwest::Response) -> GatewayError {
        let status = resp.status();
        match resp.json::<ErrorResponse>().await {
            Ok(body) => {
                let code = body.error.code.unwrap_or_default();
                let message = body.error.message.unwrap_or_else(|| status.to_string());
                GatewayError::Rejected(format!("{code}: {message}"))
            }
            Err(e) => GatewayError::Protocol(format!("{status}: {e}")),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, req: CreateIntentRequest) -> Result<IntentHandle, GatewayError> {
        let url = format!("{}/v1/payment_intents", self.api_base);

        let amount = req.amount_cents.to_string();
        let params = [
            ("amount", amount.as_str()),
            ("currency", req.currency.as_str()),
            ("metadata[order_id]", req.order_id.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &req.idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }

        let intent: IntentResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| GatewayError::Protocol("intent without client_secret".into()))?;

        Ok(IntentHandle {
            intent_id: intent.id,
            client_secret,
        })
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        let url = format!("{}/v1/payment_intents/{}/cancel", self.api_base, intent_id);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }

        Ok(())
    }
}
