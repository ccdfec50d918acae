//! Audit trail model: records, filters and the write-failure error.
//!
//! Storage and the best-effort recorder live in `sitestock-infra`.

pub mod filter;
pub mod record;

pub use filter::{newest_first, AuditFilter};
pub use record::{ActionKind, AuditRecord, TargetType};

/// Failure to persist an audit record.
///
/// Never propagated out of a primary mutation; the recorder logs and counts it.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    WriteFailed(String),
}
