//! # till-core: Pure Settlement Logic
//!
//! This crate is the heart of the till: pricing, taxation, payment
//! settlement math and drawer reconciliation, all as pure functions and
//! plain data with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Till Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     Caller (API, UI, jobs)                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 till-ledger (Stateful Services)                 │   │
//! │  │    PaymentSettlement ── CashSessionLedger ── ClosingReconciler  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │ pricing │ │   tax   │ │settlement│ │session │ │   │
//! │  │   │Currency │ │ markup/ │ │ plugins │ │ payments │ │ drawer │ │   │
//! │  │   │ Amount  │ │ margin  │ │ + calc  │ │ + status │ │ totals │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Currency-tagged integer amounts and exchange rates
//! - [`pricing`] - Markup/margin price derivation and margin policy
//! - [`document`] - Document shapes and the payment method catalog
//! - [`tax`] - Jurisdiction plugins and the document tax calculator
//! - [`settlement`] - Payment records, accounts and paid-status math
//! - [`session`] - Cash sessions, drawer totals and reconciliation
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are minor units (i64), never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::{Currency, CurrencyAmount};
//!
//! // Create money from minor units (never from floats!)
//! let subtotal = CurrencyAmount::new(10_000, Currency::USD); // $100.00
//!
//! // 16% tax, half-up rounding
//! let tax = subtotal.apply_bps(1600);
//! assert_eq!(tax.minor_units(), 1600); // $16.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod money;
pub mod pricing;
pub mod session;
pub mod settlement;
pub mod tax;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use till_core::CurrencyAmount` instead of
// `use till_core::money::CurrencyAmount`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, CurrencyAmount, ExchangeRate};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tolerance, in minor units, when deciding a document is fully paid.
///
/// ## Business Reason
/// Multi-payment documents accumulate half-up rounding residue (a 3%
/// fee on an odd amount rounds each payment independently). One minor
/// unit of slack keeps a fully paid document from sticking in Partial.
pub const PAYMENT_TOLERANCE_MINOR: i64 = 1;

/// Maximum markup percentage, in basis points (1000%).
///
/// ## Business Reason
/// Prevents fat-finger markups (30000 instead of 3000) from producing
/// absurd prices. High-margin retail rarely exceeds a few hundred
/// percent.
pub const MAX_MARKUP_BPS: u32 = 100_000;

/// Exclusive upper bound for margin percentage, in basis points (100%).
///
/// ## Business Reason
/// The margin formula divides by `1 − margin`; at 100% it divides by
/// zero. Inputs at or over this bound are rejected, never clamped.
pub const MAX_MARGIN_BPS: u32 = 10_000;

/// Margin at or above which profitability is reported Excellent, in
/// basis points (50%).
pub const EXCELLENT_MARGIN_BPS: u32 = 5000;
