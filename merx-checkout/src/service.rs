//! Idempotency-guarded facade over the negotiation engine.
//!
//! Every mutating operation is admitted through the guard keyed by the
//! client's idempotency key plus an operation tag, so the same key cannot
//! silently service two different operations. Responses are stored and
//! replayed as raw JSON values, byte-for-byte.

use merx_core::{CoreError, CoreResult};
use merx_shared::wire::{CheckoutCreateRequest, CheckoutUpdateRequest, CompleteRequest};
use serde_json::{json, Value};

use merx_store::{Admission, IdempotencyGuard};

use crate::engine::CheckoutNegotiationEngine;
use crate::models::CheckoutSession;

pub struct CheckoutService {
    engine: CheckoutNegotiationEngine,
    guard: IdempotencyGuard,
}

impl CheckoutService {
    pub fn new(engine: CheckoutNegotiationEngine) -> Self {
        Self {
            engine,
            guard: IdempotencyGuard::new(),
        }
    }

    pub fn engine(&self) -> &CheckoutNegotiationEngine {
        &self.engine
    }

    pub async fn create(&self, key: &str, req: &CheckoutCreateRequest) -> CoreResult<Value> {
        let payload = tagged_payload("create", None, req)?;
        self.run(key, &payload, self.engine.create(req)).await
    }

    pub async fn update(
        &self,
        key: &str,
        session_id: &str,
        req: &CheckoutUpdateRequest,
    ) -> CoreResult<Value> {
        let payload = tagged_payload("update", Some(session_id), req)?;
        self.run(key, &payload, self.engine.update(session_id, req))
            .await
    }

    pub async fn complete(
        &self,
        key: &str,
        session_id: &str,
        req: &CompleteRequest,
    ) -> CoreResult<Value> {
        let payload = tagged_payload("complete", Some(session_id), req)?;
        self.run(key, &payload, self.engine.complete(session_id, req))
            .await
    }

    pub async fn cancel(&self, key: &str, session_id: &str) -> CoreResult<Value> {
        let payload = tagged_payload("cancel", Some(session_id), &json!({}))?;
        self.run(key, &payload, self.engine.cancel(session_id))
            .await
    }

    pub async fn get(&self, session_id: &str) -> CoreResult<Value> {
        let session = self.engine.get(session_id).await?;
        to_response_value(&session)
    }

    async fn run(
        &self,
        key: &str,
        payload: &Value,
        op: impl std::future::Future<Output = CoreResult<CheckoutSession>>,
    ) -> CoreResult<Value> {
        match self.guard.begin(key, payload).await {
            Admission::Replay(stored) => Ok(stored),
            Admission::Conflict => Err(CoreError::IdempotencyConflict),
            Admission::Proceed { fingerprint } => match op.await {
                Ok(session) => {
                    let response = to_response_value(&session)?;
                    self.guard.commit(key, fingerprint, response.clone()).await;
                    Ok(response)
                }
                Err(err) => {
                    self.guard.abort(key).await;
                    Err(err)
                }
            },
        }
    }
}

fn tagged_payload<T: serde::Serialize>(
    op: &str,
    session_id: Option<&str>,
    req: &T,
) -> CoreResult<Value> {
    let body = serde_json::to_value(req)
        .map_err(|e| CoreError::Internal(format!("payload serialization: {e}")))?;
    Ok(json!({"op": op, "session_id": session_id, "body": body}))
}

fn to_response_value(session: &CheckoutSession) -> CoreResult<Value> {
    serde_json::to_value(session.to_response())
        .map_err(|e| CoreError::Internal(format!("response serialization: {e}")))
}
