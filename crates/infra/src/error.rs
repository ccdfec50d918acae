use thiserror::Error;

use sitestock_auth::AuthzError;
use sitestock_core::DomainError;

use crate::store::StoreError;

/// Error returned by every service operation.
///
/// Store failures that carry business meaning (missing row, duplicate, lost
/// version race) are folded into `Domain`; only genuine backend failures stay
/// in `Storage`.
#[derive(Debug, Error)]
pub enum LedgerServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerServiceError>;

impl From<StoreError> for LedgerServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                LedgerServiceError::Domain(DomainError::NotFound { entity, id })
            }
            StoreError::Conflict(msg) => LedgerServiceError::Domain(DomainError::conflict(msg)),
            StoreError::VersionConflict(msg) => {
                LedgerServiceError::Domain(DomainError::concurrent_modification(msg))
            }
            other @ StoreError::Backend(_) => LedgerServiceError::Storage(other),
        }
    }
}

impl LedgerServiceError {
    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            LedgerServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }
}
