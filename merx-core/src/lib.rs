pub mod catalog;
pub mod mandate;

use merx_shared::error_body::ErrorBody;

/// Broad error category used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Payment,
    Forbidden,
    Internal,
}

/// Error taxonomy shared by the merchant engine and the buyer agent.
///
/// Only discovery failures are recovered locally (by skipping the candidate);
/// everything else is surfaced to the caller without automatic retry, since
/// retrying a mutation outside its idempotency key risks duplicate effects.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Idempotency key reused with different parameters")]
    IdempotencyConflict,

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Operation not valid in status {0}: {1}")]
    InvalidState(String, String),

    #[error("Missing payment credential")]
    MissingCredential,

    #[error("Payment authorization declined: {0}")]
    PaymentDeclined(String),

    #[error("Supplier unreachable: {0}")]
    DiscoveryUnreachable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable symbolic code surfaced on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "INVALID_REQUEST",
            CoreError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            CoreError::NotFound(..) => "NOT_FOUND",
            CoreError::UnknownItem(_) => "UNKNOWN_ITEM",
            CoreError::InvalidState(..) => "INVALID_STATE",
            CoreError::MissingCredential => "MISSING_CREDENTIAL",
            CoreError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            CoreError::DiscoveryUnreachable(_) => "DISCOVERY_UNREACHABLE",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Validation(_) | CoreError::UnknownItem(_) => ErrorCategory::Validation,
            CoreError::IdempotencyConflict | CoreError::InvalidState(..) => ErrorCategory::Conflict,
            CoreError::NotFound(..) => ErrorCategory::NotFound,
            CoreError::MissingCredential | CoreError::PaymentDeclined(_) => ErrorCategory::Payment,
            CoreError::DiscoveryUnreachable(_) | CoreError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string(), self.code())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(CoreError::IdempotencyConflict.code(), "IDEMPOTENCY_CONFLICT");
        assert_eq!(
            CoreError::NotFound("checkout", "chk_1".into()).code(),
            "NOT_FOUND"
        );
        assert_eq!(
            CoreError::PaymentDeclined("bad token".into()).category(),
            ErrorCategory::Payment
        );
    }

    #[test]
    fn test_body_shape() {
        let body = CoreError::MissingCredential.to_body();
        assert_eq!(body.code, "MISSING_CREDENTIAL");
        assert!(body.detail.contains("credential"));
    }
}
