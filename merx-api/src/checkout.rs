//! Checkout sub-resource routes.
//!
//! Mutating calls must carry the agent identity, a request signature, and an
//! idempotency key; reads need only the first two. Headers are checked for
//! presence, not verified. Handlers pass raw JSON responses through so that
//! idempotent replays stay byte-identical.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use merx_core::CoreError;
use merx_shared::wire::{
    CheckoutCreateRequest, CheckoutUpdateRequest, CompleteRequest, HEADER_AGENT,
    HEADER_IDEMPOTENCY_KEY, HEADER_SIGNATURE,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout-sessions", post(create_session))
        .route(
            "/checkout-sessions/{id}",
            get(get_session).put(update_session),
        )
        .route("/checkout-sessions/{id}/complete", post(complete_session))
        .route("/checkout-sessions/{id}/cancel", post(cancel_session))
        .route("/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckoutCreateRequest>,
) -> Result<Json<Value>, AppError> {
    let key = require_mutation_headers(&headers)?;
    let response = state.service.create(&key, &req).await?;
    Ok(Json(response))
}

async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_protocol_headers(&headers)?;
    let response = state.service.get(&id).await?;
    Ok(Json(response))
}

async fn update_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CheckoutUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let key = require_mutation_headers(&headers)?;
    let response = state.service.update(&key, &id, &req).await?;
    Ok(Json(response))
}

async fn complete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<Value>, AppError> {
    let key = require_mutation_headers(&headers)?;
    let response = state.service.complete(&key, &id, &req).await?;
    Ok(Json(response))
}

async fn cancel_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let key = require_mutation_headers(&headers)?;
    let response = state.service.cancel(&key, &id).await?;
    Ok(Json(response))
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_protocol_headers(&headers)?;
    let order = state.service.engine().get_order(&id).await?;
    let value = serde_json::to_value(order)
        .map_err(|e| CoreError::Internal(format!("response serialization: {e}")))?;
    Ok(Json(value))
}

// ============================================================================
// Header guards
// ============================================================================

fn require_protocol_headers(headers: &HeaderMap) -> Result<(), AppError> {
    for name in [HEADER_AGENT, HEADER_SIGNATURE] {
        require_header(headers, name)?;
    }
    Ok(())
}

fn require_mutation_headers(headers: &HeaderMap) -> Result<String, AppError> {
    require_protocol_headers(headers)?;
    require_header(headers, HEADER_IDEMPOTENCY_KEY)
}

fn require_header(headers: &HeaderMap, name: &str) -> Result<String, AppError> {
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::Validation(format!("missing required header: {name}")))?;
    Ok(value.to_string())
}
