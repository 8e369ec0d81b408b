use serde::{Deserialize, Serialize};

/// Wire shape of every error response: a human-readable detail plus a
/// stable symbolic code clients can branch on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
    pub code: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: code.into(),
        }
    }
}
