//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  till-core errors (this file)                                       │
//! │  ├── CoreError        - Arithmetic guards and domain failures       │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  till-ledger errors (separate crate)                                │
//! │  └── LedgerError      - NotFound / Conflict on stored state         │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → LedgerError → caller           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every message names the specific invariant violated
//! 3. Errors are enum variants, never String
//! 4. Guards reject, they never clamp

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Settlement arithmetic and domain errors.
///
/// These represent invariant violations inside the pure math: mixing
/// currencies without an explicit rate, a margin that would divide by zero,
/// an unregistered tax jurisdiction. They are always rejected, never
/// auto-corrected.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two amounts in different currencies were combined directly.
    ///
    /// ## When This Occurs
    /// - Adding a VES payment into a USD running total
    /// - Declaring change in a currency the breakdown does not carry a
    ///   rate for
    ///
    /// Cross-currency combination always goes through an explicit,
    /// timestamped [`ExchangeRate`](crate::money::ExchangeRate).
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// A margin percentage at or above 100% was supplied.
    ///
    /// `price = cost / (1 - margin)` divides by zero at 100%. Rejected,
    /// never clamped.
    #[error("margin percentage must be below 100 (got {margin_bps} bps)")]
    MarginTooHigh { margin_bps: u32 },

    /// Integer arithmetic would overflow an i64 minor-unit amount.
    #[error("amount arithmetic overflowed")]
    AmountOverflow,

    /// No tax plugin is registered for the requested jurisdiction.
    ///
    /// A missing plugin is fatal for the request: defaulting to a
    /// zero-tax plugin would silently undercharge.
    #[error("no tax plugin registered for jurisdiction '{code}'")]
    JurisdictionNotRegistered { code: String },

    /// A declared payment in a foreign currency carried no exchange rate.
    #[error("missing exchange rate from {from} to {to}")]
    MissingExchangeRate { from: String, to: String },

    /// An exchange rate was supplied for the wrong currency pair.
    #[error("exchange rate {base}/{quote} cannot convert {found}")]
    RateMismatch {
        base: String,
        quote: String,
        found: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input does not meet requirements, and are
/// raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. unknown currency code, malformed UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Cash tendered does not cover the payment amount.
    #[error("amount tendered {tendered} is less than payment amount {owed}")]
    InsufficientTender { tendered: String, owed: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
