use crate::types::Amount;

/// Every failure the ledger can surface to a caller.
///
/// Business-rule variants carry enough detail for the caller to correct the
/// request. `Internal` never leaks storage detail through `Display`; the
/// underlying cause is logged where it is raised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} has already been processed. Current status: {status}")]
    StateConflict {
        entity: &'static str,
        id: String,
        status: String,
    },
    #[error("insufficient balance: available is {available}")]
    InsufficientBalance { available: Amount },
    #[error("a similar withdrawal request was recently submitted: {existing_withdrawal_id}")]
    DuplicateRequest { existing_withdrawal_id: String },
    #[error("resource busy, retry later: {0}")]
    Contention(String),
    #[error("internal ledger error")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let detail = detail.to_string();
        tracing::error!(%detail, "internal ledger failure");
        Self::Internal(detail)
    }

    /// Only lock contention is worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::internal(format!("storage: {e}"))
    }
}

impl From<minicbor::decode::Error> for LedgerError {
    fn from(e: minicbor::decode::Error) -> Self {
        LedgerError::internal(format!("decode: {e}"))
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for LedgerError {
    fn from(e: minicbor::encode::Error<E>) -> Self {
        LedgerError::internal(format!("encode: {e}"))
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(e: anyhow::Error) -> Self {
        LedgerError::internal(e)
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(e: sled::transaction::TransactionError<LedgerError>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(storage) => storage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_display_hides_detail() {
        let err = LedgerError::internal("tree `org/` corrupted at offset 12");
        assert_eq!(err.to_string(), "internal ledger error");
    }

    #[test]
    fn insufficient_balance_names_available_amount() {
        let err = LedgerError::InsufficientBalance {
            available: Amount::from_minor(12_550),
        };
        assert_eq!(err.to_string(), "insufficient balance: available is $125.50");
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(LedgerError::Contention("org".into()).is_retryable());
        assert!(!LedgerError::Validation("amount".into()).is_retryable());
    }
}
