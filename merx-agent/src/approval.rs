//! Asynchronous manual sign-off.
//!
//! Replaces a blocking console prompt: the orchestrator suspends on a
//! timeout-bounded future while an external operator resolves the request.
//! Nothing here holds a global lock, so unrelated purchases keep moving.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::governance::GovernanceDecision;

#[derive(Debug)]
pub struct ApprovalRequest {
    pub item_id: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub decision: GovernanceDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalVerdict {
    Approved,
    Denied,
}

#[async_trait]
pub trait ApprovalGateway: Send + Sync {
    /// Suspend until an external decision arrives or the gateway's deadline
    /// passes. Timing out resolves to `Denied`.
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalVerdict;
}

/// Forwards approval requests to an operator channel and waits, bounded by a
/// timeout. The receiving side answers through the enclosed oneshot.
pub struct ChannelApprovalGateway {
    tx: mpsc::Sender<(ApprovalRequest, oneshot::Sender<ApprovalVerdict>)>,
    timeout: Duration,
}

impl ChannelApprovalGateway {
    pub fn new(
        timeout: Duration,
    ) -> (
        Self,
        mpsc::Receiver<(ApprovalRequest, oneshot::Sender<ApprovalVerdict>)>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        (Self { tx, timeout }, rx)
    }
}

#[async_trait]
impl ApprovalGateway for ChannelApprovalGateway {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalVerdict {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((request, reply_tx)).await.is_err() {
            tracing::warn!("approval channel closed, denying");
            return ApprovalVerdict::Denied;
        }
        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(_)) => {
                tracing::warn!("approver dropped without answering, denying");
                ApprovalVerdict::Denied
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "approval timed out, denying");
                ApprovalVerdict::Denied
            }
        }
    }
}

/// Unconditional verdict, for tests and unattended deployments.
pub struct AutoApprovalGateway {
    pub verdict: ApprovalVerdict,
}

#[async_trait]
impl ApprovalGateway for AutoApprovalGateway {
    async fn request_approval(&self, _request: ApprovalRequest) -> ApprovalVerdict {
        self.verdict
    }
}
