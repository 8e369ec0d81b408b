pub mod approval;
pub mod client;
pub mod governance;
pub mod orchestrator;

pub use approval::{
    ApprovalGateway, ApprovalRequest, ApprovalVerdict, AutoApprovalGateway, ChannelApprovalGateway,
};
pub use client::{HttpMerchantClient, MerchantClient};
pub use governance::{evaluate, DecisionKind, GovernanceDecision, SpendingPolicy};
pub use orchestrator::{
    AgentConfig, AgentError, HttpConnector, MerchantConnector, PurchaseOutcome, PurchaseRequest,
    TransactionOrchestrator,
};
