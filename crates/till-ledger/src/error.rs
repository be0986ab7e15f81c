//! # Ledger Error Types
//!
//! Errors raised by the stateful ledger layer. Core math errors and
//! validation failures convert in via `#[from]`; everything else here
//! is a lookup miss, a lifecycle conflict or a concurrency guard.

use thiserror::Error;
use till_core::error::{CoreError, ValidationError};

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No document with the given id.
    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    /// Payment index out of range for the document.
    #[error("payment {index} not found on document {document_id}")]
    PaymentNotFound { document_id: String, index: usize },

    /// No cash session with the given id.
    #[error("cash session not found: {id}")]
    SessionNotFound { id: String },

    /// No closing record with the given id.
    #[error("closing record not found: {id}")]
    ClosingNotFound { id: String },

    /// No settlement account with the given id.
    #[error("settlement account not found: {id}")]
    AccountNotFound { id: String },

    /// No payment method with the given id in the catalog.
    #[error("payment method not found: {id}")]
    MethodNotFound { id: String },

    /// The account does not accept the payment method.
    #[error("account {account_id} does not accept method {method}")]
    AccountIneligible { account_id: String, method: String },

    /// The account exists but is deactivated.
    #[error("account {account_id} is inactive")]
    AccountInactive { account_id: String },

    /// The payment was already confirmed; confirmation is one-way.
    #[error("payment {index} on document {document_id} is already confirmed")]
    PaymentAlreadyConfirmed { document_id: String, index: usize },

    /// The session was already closed; closing is terminal.
    #[error("cash session {id} is already closed")]
    SessionAlreadyClosed { id: String },

    /// The operation requires an open session.
    #[error("cash session {id} is not open")]
    SessionNotOpen { id: String },

    /// Another session is already open on the register.
    #[error("register {register} already has open session {session_id}")]
    RegisterInUse { register: String, session_id: String },

    /// The closing is not awaiting approval.
    #[error("closing {id} is not pending approval")]
    ClosingNotPending { id: String },

    /// Optimistic-concurrency check failed.
    #[error("stale version: expected {expected}, found {found}")]
    StaleVersion { expected: u64, found: u64 },

    /// Core calculation error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Input validation error.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages_name_the_entities() {
        let err = LedgerError::RegisterInUse {
            register: "front-1".to_string(),
            session_id: "sess-9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "register front-1 already has open session sess-9"
        );

        let err = LedgerError::PaymentAlreadyConfirmed {
            document_id: "doc-1".to_string(),
            index: 2,
        };
        assert!(err.to_string().contains("already confirmed"));
    }

    #[test]
    fn test_core_errors_convert() {
        fn inner() -> LedgerResult<()> {
            Err(CoreError::AmountOverflow)?
        }
        assert!(matches!(inner(), Err(LedgerError::Core(_))));
    }
}
