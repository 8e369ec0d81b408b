//! Idempotent request handling for mutating checkout operations.
//!
//! Each key is bound to a fingerprint of its first payload. Replays with the
//! same payload get the stored response byte-for-byte; reuse with a different
//! payload is a client error, never an overwrite. `begin` atomically marks a
//! key in flight so two concurrent retries cannot both execute side effects:
//! the second waits for the first to commit or abort.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};

/// Outcome of admitting a request under an idempotency key.
#[derive(Debug)]
pub enum Admission {
    /// Key unseen: execute the operation, then `commit` exactly once
    /// (or `abort` on failure).
    Proceed { fingerprint: String },
    /// Key seen with a matching payload: return this stored response and
    /// perform no further side effects.
    Replay(Value),
    /// Key seen with a different payload.
    Conflict,
}

enum Slot {
    InFlight {
        fingerprint: String,
        // Dropped on commit/abort, waking every waiter.
        done: watch::Sender<()>,
    },
    Committed {
        fingerprint: String,
        response: Value,
        #[allow(dead_code)]
        created_at: DateTime<Utc>,
    },
}

/// Deterministic hash of a canonical serialization: object keys sorted,
/// no whitespace. Semantically identical payloads fingerprint identically
/// regardless of field order.
pub fn fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    canonical_into(payload, &mut hasher);
    format!("{:x}", hasher.finalize())
}

fn canonical_into(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::String((*key).clone()).to_string().as_bytes());
                hasher.update(b":");
                canonical_into(&map[*key], hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                canonical_into(item, hasher);
            }
            hasher.update(b"]");
        }
        other => hasher.update(other.to_string().as_bytes()),
    }
}

pub struct IdempotencyGuard {
    slots: Mutex<HashMap<String, Slot>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically test-and-mark `key`. If another request holds the key in
    /// flight with the same payload, waits until it settles and re-evaluates.
    pub async fn begin(&self, key: &str, payload: &Value) -> Admission {
        let fp = fingerprint(payload);
        loop {
            let mut rx = {
                let mut slots = self.slots.lock().await;
                match slots.get(key) {
                    None => {
                        let (tx, _) = watch::channel(());
                        slots.insert(
                            key.to_string(),
                            Slot::InFlight {
                                fingerprint: fp.clone(),
                                done: tx,
                            },
                        );
                        return Admission::Proceed { fingerprint: fp };
                    }
                    Some(Slot::Committed {
                        fingerprint,
                        response,
                        ..
                    }) => {
                        if *fingerprint == fp {
                            tracing::debug!(key, "idempotent replay");
                            return Admission::Replay(response.clone());
                        }
                        return Admission::Conflict;
                    }
                    Some(Slot::InFlight { fingerprint, done }) => {
                        if *fingerprint != fp {
                            return Admission::Conflict;
                        }
                        // Subscribe while holding the lock so a commit that
                        // lands right after cannot be missed.
                        done.subscribe()
                    }
                }
            };
            let _ = rx.changed().await;
        }
    }

    /// Store the response for replay. Must be called exactly once after a
    /// `Proceed`, with the fingerprint `begin` returned.
    pub async fn commit(&self, key: &str, fingerprint: String, response: Value) {
        let mut slots = self.slots.lock().await;
        slots.insert(
            key.to_string(),
            Slot::Committed {
                fingerprint,
                response,
                created_at: Utc::now(),
            },
        );
    }

    /// Release an in-flight key after the operation failed, so a later retry
    /// with the same key may execute. Committed records are never removed.
    pub async fn abort(&self, key: &str) {
        let mut slots = self.slots.lock().await;
        if matches!(slots.get(key), Some(Slot::InFlight { .. })) {
            slots.remove(key);
        }
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new()
    }
}
