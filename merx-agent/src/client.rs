//! Buyer-side client for the merchant's checkout sub-resource protocol.
//!
//! Every mutating call carries the agent identity, an opaque request
//! signature, and the caller-supplied idempotency key.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use merx_shared::error_body::ErrorBody;
use merx_shared::wire::{
    CheckoutCreateRequest, CheckoutResponse, CheckoutUpdateRequest, CompleteRequest, HEADER_AGENT,
    HEADER_IDEMPOTENCY_KEY, HEADER_SIGNATURE,
};

use crate::orchestrator::AgentError;

#[async_trait]
pub trait MerchantClient: Send + Sync {
    async fn create_checkout(
        &self,
        idempotency_key: &str,
        req: &CheckoutCreateRequest,
    ) -> Result<CheckoutResponse, AgentError>;

    async fn update_checkout(
        &self,
        idempotency_key: &str,
        checkout_id: &str,
        req: &CheckoutUpdateRequest,
    ) -> Result<CheckoutResponse, AgentError>;

    async fn complete_checkout(
        &self,
        idempotency_key: &str,
        checkout_id: &str,
        req: &CompleteRequest,
    ) -> Result<CheckoutResponse, AgentError>;
}

pub struct HttpMerchantClient {
    http: reqwest::Client,
    base_url: String,
    agent_identity: String,
    request_signature: String,
}

impl HttpMerchantClient {
    pub fn new(base_url: impl Into<String>, agent_identity: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent_identity: agent_identity.into(),
            // Opaque stand-in; real signing is out of scope.
            request_signature: merx_shared::new_id("sig"),
        }
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        idempotency_key: &str,
        body: &B,
    ) -> Result<R, AgentError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .request(method, &url)
            .header(HEADER_AGENT, &self.agent_identity)
            .header(HEADER_SIGNATURE, &self.request_signature)
            .header(HEADER_IDEMPOTENCY_KEY, idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .map_err(|e| AgentError::Transport(e.to_string()))
        } else {
            let body: ErrorBody = response.json().await.unwrap_or_else(|_| {
                ErrorBody::new(format!("merchant returned {status}"), "UPSTREAM_ERROR")
            });
            Err(AgentError::Merchant {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl MerchantClient for HttpMerchantClient {
    async fn create_checkout(
        &self,
        idempotency_key: &str,
        req: &CheckoutCreateRequest,
    ) -> Result<CheckoutResponse, AgentError> {
        self.send(
            reqwest::Method::POST,
            "/checkout-sessions",
            idempotency_key,
            req,
        )
        .await
    }

    async fn update_checkout(
        &self,
        idempotency_key: &str,
        checkout_id: &str,
        req: &CheckoutUpdateRequest,
    ) -> Result<CheckoutResponse, AgentError> {
        self.send(
            reqwest::Method::PUT,
            &format!("/checkout-sessions/{checkout_id}"),
            idempotency_key,
            req,
        )
        .await
    }

    async fn complete_checkout(
        &self,
        idempotency_key: &str,
        checkout_id: &str,
        req: &CompleteRequest,
    ) -> Result<CheckoutResponse, AgentError> {
        self.send(
            reqwest::Method::POST,
            &format!("/checkout-sessions/{checkout_id}/complete"),
            idempotency_key,
            req,
        )
        .await
    }
}
