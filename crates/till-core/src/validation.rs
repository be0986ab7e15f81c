//! # Validation Module
//!
//! Business-rule validation shared by the settlement and ledger layers.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (API surface, UI)                                      │
//! │  ├── Basic format checks (empty, length)                                │
//! │  └── Immediate user feedback                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rules                                  │
//! │  ├── Positive amounts, tender covers the sale                           │
//! │  └── Typed ValidationError, never a panic                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledger invariants                                             │
//! │  ├── Version checks, lifecycle guards                                   │
//! │  └── Conflict errors (already confirmed, already closed)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::CurrencyAmount;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates that a payment amount is strictly positive.
///
/// ## Example
/// ```rust
/// use till_core::money::{Currency, CurrencyAmount};
/// use till_core::validation::validate_payment_amount;
///
/// validate_payment_amount(CurrencyAmount::new(500, Currency::USD)).unwrap();
/// assert!(validate_payment_amount(CurrencyAmount::new(0, Currency::USD)).is_err());
/// ```
pub fn validate_payment_amount(amount: CurrencyAmount) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

/// Validates that tendered cash covers the amount owed.
///
/// When the tender is short this returns
/// [`ValidationError::InsufficientTender`] carrying both figures, so the
/// caller can show exactly how much is missing.
pub fn validate_tender(
    tendered: CurrencyAmount,
    owed: CurrencyAmount,
) -> ValidationResult<()> {
    if tendered.currency() == owed.currency() && tendered.minor_units() < owed.minor_units() {
        return Err(ValidationError::InsufficientTender {
            tendered: tendered.to_string(),
            owed: owed.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a movement reason: non-empty, at most 200 characters.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if trimmed.len() > 200 {
        return Err(ValidationError::InvalidFormat {
            field: "reason".to_string(),
            reason: "must be at most 200 characters".to_string(),
        });
    }
    Ok(())
}

/// Validates a register or cashier identifier: non-empty, at most 64
/// characters, printable.
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if trimmed.len() > 64 {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be at most 64 characters".to_string(),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
