//! # Settlement Types
//!
//! Pure data for payment settlement: payment records, settlement
//! accounts, and the document wrapper that tracks how much of a total
//! has actually been confirmed.
//!
//! ## Payment Lifecycle
//! ```text
//! add_payment            confirm_payment
//!     │                        │
//!     ▼                        ▼
//! ┌─────────┐            ┌───────────┐
//! │ Pending │──────────▶ │ Confirmed │   (one-way, never back)
//! └─────────┘            └───────────┘
//! ```
//! Only Confirmed payments count toward a document's paid status, and
//! only Confirmed cash counts toward a drawer's expected total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;
use crate::money::{Currency, CurrencyAmount};
use crate::PAYMENT_TOLERANCE_MINOR;

// =============================================================================
// Payment Records
// =============================================================================

/// Confirmation state of a single payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Confirmed,
}

/// Aggregate paid status of a document, derived from its confirmed
/// payments at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing confirmed yet.
    Pending,
    /// Confirmed less than the effective total.
    Partial,
    /// Confirmed within tolerance of the effective total.
    Paid,
    /// Confirmed beyond the effective total plus tolerance.
    Overpaid,
}

/// One payment against a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub method_id: String,
    pub currency: Currency,
    /// The portion applied to the document total.
    pub amount: CurrencyAmount,
    /// Transactional tax charged on top of `amount` (zero when the
    /// method attracts none).
    pub transaction_tax: CurrencyAmount,
    /// Physical money handed over, for cash tenders.
    pub amount_tendered: Option<CurrencyAmount>,
    pub change_given: Option<CurrencyAmount>,
    /// Per-currency change denominations when change crossed
    /// currencies.
    pub change_breakdown: Option<Vec<CurrencyAmount>>,
    /// External reference (transfer number, Zelle confirmation).
    pub reference: Option<String>,
    /// Settlement account the money landed in, set at confirmation.
    pub account_id: Option<String>,
    pub status: PaymentState,
    /// Method as verified against the bank statement, when it differs
    /// from the declared one.
    pub confirmed_method: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentState::Confirmed
    }

    /// Amount plus transactional tax: what the payer actually moved.
    pub fn gross_amount(&self) -> i64 {
        self.amount
            .minor_units()
            .saturating_add(self.transaction_tax.minor_units())
    }
}

// =============================================================================
// Settlement Accounts
// =============================================================================

/// A destination for settled money (a bank account, a cash vault, a
/// mobile wallet). Confirmation routes each payment into one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementAccount {
    pub id: String,
    pub name: String,
    pub currency: Currency,
    pub active: bool,
    /// Method ids this account may receive. Empty means any method.
    pub accepted_methods: Vec<String>,
}

impl SettlementAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, currency: Currency) -> Self {
        SettlementAccount {
            id: id.into(),
            name: name.into(),
            currency,
            active: true,
            accepted_methods: Vec::new(),
        }
    }

    pub fn with_accepted_methods(
        mut self,
        methods: impl IntoIterator<Item = String>,
    ) -> Self {
        self.accepted_methods = methods.into_iter().collect();
        self
    }

    /// Whether this account may receive a payment confirmed under the
    /// given method.
    pub fn accepts(&self, method_id: &str) -> bool {
        self.accepted_methods.is_empty()
            || self.accepted_methods.iter().any(|m| m == method_id)
    }
}

// =============================================================================
// Settlement Documents
// =============================================================================

/// A document in settlement: fiscal totals frozen at creation plus the
/// growing list of payments against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDocument {
    pub id: String,
    pub kind: DocumentKind,
    pub currency: Currency,
    pub subtotal: CurrencyAmount,
    pub shipping: CurrencyAmount,
    /// Non-transactional taxes from the fiscal calculation.
    pub tax_total: CurrencyAmount,
    /// Transactional taxes accumulated as payments arrive.
    pub transaction_tax_total: CurrencyAmount,
    /// Fiscal total: subtotal + taxes + shipping.
    pub total: CurrencyAmount,
    /// Status as last persisted. May be stale for exempt kinds whose
    /// tax rules changed; readers go through
    /// [`resolve_payment_status`](Self::resolve_payment_status).
    pub stored_status: PaymentStatus,
    pub payments: Vec<PaymentRecord>,
    /// Cash session the sale belongs to, when one was open.
    pub cash_session_id: Option<String>,
    /// Bumped on every mutation; optimistic-concurrency guard.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementDocument {
    /// What the payer actually owes.
    ///
    /// For exempt kinds this strips the tax component and owes only
    /// subtotal + shipping, even when `total` was persisted with tax by
    /// an earlier rule set.
    pub fn effective_total(&self, exempt_kinds: &[DocumentKind]) -> CurrencyAmount {
        if exempt_kinds.contains(&self.kind) {
            CurrencyAmount::new(
                self.subtotal
                    .minor_units()
                    .saturating_add(self.shipping.minor_units()),
                self.currency,
            )
        } else {
            self.total
        }
    }

    /// Sum of confirmed payments including their transactional taxes,
    /// in minor units of the document currency.
    pub fn confirmed_total(&self) -> i64 {
        self.payments
            .iter()
            .filter(|p| p.is_confirmed())
            .map(PaymentRecord::gross_amount)
            .fold(0i64, i64::saturating_add)
    }

    /// Derives the paid status from confirmed payments.
    ///
    /// Comparison uses a tolerance of [`PAYMENT_TOLERANCE_MINOR`] so a
    /// rounding residue never strands a fully paid document in Partial.
    /// The result may differ from `stored_status` when an exempt kind
    /// was persisted under older tax rules; callers wanting to persist
    /// the fix use the migration operation in the ledger layer.
    pub fn resolve_payment_status(&self, exempt_kinds: &[DocumentKind]) -> PaymentStatus {
        let owed = self.effective_total(exempt_kinds).minor_units();
        let confirmed = self.confirmed_total();

        if confirmed == 0 {
            PaymentStatus::Pending
        } else if confirmed < owed - PAYMENT_TOLERANCE_MINOR {
            PaymentStatus::Partial
        } else if confirmed > owed + PAYMENT_TOLERANCE_MINOR {
            PaymentStatus::Overpaid
        } else {
            PaymentStatus::Paid
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
