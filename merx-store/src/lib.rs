pub mod document;
pub mod idempotency;

pub use document::{DocumentStore, InMemoryDocumentStore, Versioned};
pub use idempotency::{Admission, IdempotencyGuard};
