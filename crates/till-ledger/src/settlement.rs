//! # Payment Settlement Service
//!
//! The stateful payment lifecycle over the ledger store:
//!
//! ```text
//! create_document ──► add_payment ──► confirm_payment ──► paid status
//!        │                 │                 │
//!        │   fiscal totals │ idempotent by   │ one-way, routes money
//!        │   frozen here   │ ref+method+amt  │ into an account
//! ```
//!
//! Every mutation happens under one store lock acquisition and bumps
//! the document version, so concurrent callers either see the change or
//! fail their version check.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_core::document::TaxableDocument;
use till_core::money::CurrencyAmount;
use till_core::settlement::{PaymentRecord, PaymentState, PaymentStatus, SettlementDocument};
use till_core::tax::calculator::DocumentTaxCalculator;
use till_core::tax::{CountryTaxPlugin, TransactionTaxContext};
use till_core::validation::{validate_payment_amount, validate_tender};

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Input for recording a payment against a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub method_id: String,
    pub amount: CurrencyAmount,
    /// Physical money handed over; cash tenders only.
    pub amount_tendered: Option<CurrencyAmount>,
    /// Declared change denominations, possibly cross-currency.
    pub change_breakdown: Option<Vec<CurrencyAmount>>,
    /// External reference; also the idempotency key component.
    pub reference: Option<String>,
}

impl NewPayment {
    pub fn new(method_id: impl Into<String>, amount: CurrencyAmount) -> Self {
        NewPayment {
            method_id: method_id.into(),
            amount,
            amount_tendered: None,
            change_breakdown: None,
            reference: None,
        }
    }

    pub fn tendered(mut self, amount: CurrencyAmount) -> Self {
        self.amount_tendered = Some(amount);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_change_breakdown(mut self, breakdown: Vec<CurrencyAmount>) -> Self {
        self.change_breakdown = Some(breakdown);
        self
    }
}

/// Stateful payment settlement bound to one jurisdiction plugin.
pub struct PaymentSettlement {
    store: Arc<LedgerStore>,
    plugin: Arc<dyn CountryTaxPlugin>,
}

impl PaymentSettlement {
    pub fn new(store: Arc<LedgerStore>, plugin: Arc<dyn CountryTaxPlugin>) -> Self {
        PaymentSettlement { store, plugin }
    }

    fn exempt_kinds(&self) -> Vec<till_core::document::DocumentKind> {
        self.plugin.exempt_document_kinds()
    }

    /// Creates a settlement document from a taxable document, freezing
    /// its fiscal totals at creation time.
    pub fn create_document(
        &self,
        document: &TaxableDocument,
        cash_session_id: Option<String>,
    ) -> LedgerResult<SettlementDocument> {
        let fiscal = DocumentTaxCalculator::new(Arc::clone(&self.plugin)).calculate(document)?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let doc = SettlementDocument {
            id: id.clone(),
            kind: document.kind,
            currency: document.currency,
            subtotal: fiscal.subtotal,
            shipping: fiscal.shipping,
            tax_total: fiscal.total_tax,
            transaction_tax_total: fiscal.total_transaction_tax,
            total: fiscal.total,
            stored_status: PaymentStatus::Pending,
            payments: Vec::new(),
            cash_session_id,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        info!(
            document_id = %id,
            kind = %doc.kind,
            total = %doc.total,
            exempt = fiscal.exempt,
            "Document created"
        );

        self.store.with_state_mut(|state| {
            state.documents.insert(id, doc.clone());
        });
        Ok(doc)
    }

    /// Records a payment against a document.
    ///
    /// ## Behavior
    /// - The amount must be strictly positive.
    /// - Cash tenders must cover the amount plus its transactional tax;
    ///   change is derived as tendered − that gross. A declared change
    ///   breakdown that disagrees with the derived change is logged,
    ///   never rejected, because the cashier may have given change
    ///   across currencies.
    /// - Transactional taxes are priced here and folded into the
    ///   document's total, so the payer owes them from this moment.
    /// - A payment carrying the same reference, method and amount as an
    ///   existing one is treated as a retry: the document is returned
    ///   unchanged.
    pub fn add_payment(
        &self,
        document_id: &str,
        payment: NewPayment,
    ) -> LedgerResult<SettlementDocument> {
        validate_payment_amount(payment.amount)?;

        let method = self
            .store
            .catalog()
            .get(&payment.method_id)
            .cloned()
            .ok_or_else(|| LedgerError::MethodNotFound {
                id: payment.method_id.clone(),
            })?;

        if payment.amount.currency() != method.currency {
            return Err(LedgerError::Core(till_core::CoreError::CurrencyMismatch {
                expected: method.currency.code().to_string(),
                found: payment.amount.currency().code().to_string(),
            }));
        }

        // Transactional taxes triggered by this payment's settlement
        // currency.
        let ctx = TransactionTaxContext {
            method_id: method.id.clone(),
            currency: payment.amount.currency(),
            amount: payment.amount,
        };
        let mut fee = CurrencyAmount::zero(payment.amount.currency());
        for tax in self.plugin.transaction_taxes(&ctx) {
            fee = fee.try_add(payment.amount.apply_bps(tax.rate_bps))?;
        }

        let exempt_kinds = self.exempt_kinds();
        self.store.with_state_mut(|state| {
            let doc = state.document_mut(document_id)?;

            // Payments settle in the document currency; cross-currency
            // tenders are expressed as their converted amount by the
            // caller. This keeps the paid-status sum meaningful.
            if payment.amount.currency() != doc.currency {
                return Err(LedgerError::Core(till_core::CoreError::CurrencyMismatch {
                    expected: doc.currency.code().to_string(),
                    found: payment.amount.currency().code().to_string(),
                }));
            }

            if let Some(reference) = payment.reference.as_deref() {
                let duplicate = doc.payments.iter().any(|existing| {
                    existing.reference.as_deref() == Some(reference)
                        && existing.method_id == payment.method_id
                        && existing.amount.minor_units() == payment.amount.minor_units()
                });
                if duplicate {
                    info!(
                        document_id = %document_id,
                        reference = reference,
                        "Duplicate payment ignored"
                    );
                    return Ok(doc.clone());
                }
            }

            // Exempt kinds never owe transactional tax, whatever the
            // method.
            let fee = if exempt_kinds.contains(&doc.kind) {
                CurrencyAmount::zero(fee.currency())
            } else {
                fee
            };

            // The payer hands over amount + fee; change is whatever the
            // tender exceeds that gross by.
            let gross = payment.amount.try_add(fee)?;
            let change = match payment.amount_tendered {
                Some(tendered) => {
                    validate_tender(tendered, gross)?;
                    Some(tendered.try_sub(gross)?)
                }
                None => None,
            };

            if let (Some(change), Some(breakdown)) = (change, payment.change_breakdown.as_ref()) {
                let declared: i64 = breakdown
                    .iter()
                    .filter(|piece| piece.currency() == change.currency())
                    .map(|piece| piece.minor_units())
                    .sum();
                let cross_currency = breakdown
                    .iter()
                    .any(|piece| piece.currency() != change.currency());
                if !cross_currency && declared != change.minor_units() {
                    warn!(
                        document_id = %document_id,
                        derived = %change,
                        declared = declared,
                        "Change breakdown disagrees with derived change"
                    );
                }
            }

            doc.payments.push(PaymentRecord {
                method_id: method.id.clone(),
                currency: payment.amount.currency(),
                amount: payment.amount,
                transaction_tax: fee,
                amount_tendered: payment.amount_tendered,
                change_given: change,
                change_breakdown: payment.change_breakdown.clone(),
                reference: payment.reference.clone(),
                account_id: None,
                status: PaymentState::Pending,
                confirmed_method: None,
                confirmed_at: None,
                recorded_at: Utc::now(),
            });

            if !fee.is_zero() {
                doc.transaction_tax_total = doc.transaction_tax_total.try_add(fee)?;
                doc.total = doc.total.try_add(fee)?;
            }

            doc.stored_status = doc.resolve_payment_status(&exempt_kinds);
            doc.version += 1;
            doc.updated_at = Utc::now();

            debug!(
                document_id = %document_id,
                method = %method.id,
                amount = %payment.amount,
                fee = %fee,
                "Payment recorded"
            );
            Ok(doc.clone())
        })
    }

    /// Confirms a pending payment, routing it into a settlement
    /// account.
    ///
    /// ## Behavior
    /// - Confirmation is one-way: a confirmed payment conflicts.
    /// - The account must be active and must accept the confirmed
    ///   method (the declared method when no override is given).
    /// - `expected_version` guards against lost updates; `None` skips
    ///   the check.
    pub fn confirm_payment(
        &self,
        document_id: &str,
        index: usize,
        account_id: &str,
        confirmed_method: Option<String>,
        expected_version: Option<u64>,
    ) -> LedgerResult<SettlementDocument> {
        let exempt_kinds = self.exempt_kinds();
        self.store.with_state_mut(|state| {
            let account = state.account(account_id)?.clone();
            let doc = state.document_mut(document_id)?;

            if let Some(expected) = expected_version {
                if doc.version != expected {
                    return Err(LedgerError::StaleVersion {
                        expected,
                        found: doc.version,
                    });
                }
            }

            let payment =
                doc.payments
                    .get_mut(index)
                    .ok_or_else(|| LedgerError::PaymentNotFound {
                        document_id: document_id.to_string(),
                        index,
                    })?;

            if payment.is_confirmed() {
                return Err(LedgerError::PaymentAlreadyConfirmed {
                    document_id: document_id.to_string(),
                    index,
                });
            }

            if !account.active {
                return Err(LedgerError::AccountInactive {
                    account_id: account_id.to_string(),
                });
            }

            let method = confirmed_method
                .clone()
                .unwrap_or_else(|| payment.method_id.clone());
            if !account.accepts(&method) {
                return Err(LedgerError::AccountIneligible {
                    account_id: account_id.to_string(),
                    method,
                });
            }

            payment.status = PaymentState::Confirmed;
            payment.account_id = Some(account_id.to_string());
            payment.confirmed_method = confirmed_method;
            payment.confirmed_at = Some(Utc::now());

            doc.stored_status = doc.resolve_payment_status(&exempt_kinds);
            doc.version += 1;
            doc.updated_at = Utc::now();

            info!(
                document_id = %document_id,
                payment = index,
                account = account_id,
                status = ?doc.stored_status,
                "Payment confirmed"
            );
            Ok(doc.clone())
        })
    }

    /// The paid status of a document, derived from its confirmed
    /// payments at read time under current exemption rules.
    pub fn payment_status(&self, document_id: &str) -> LedgerResult<PaymentStatus> {
        let exempt_kinds = self.exempt_kinds();
        self.store
            .with_state(|state| Ok(state.document(document_id)?.resolve_payment_status(&exempt_kinds)))
    }

    /// Persists the derived status for exempt documents stranded by a
    /// rule change (persisted Partial, actually Paid). Returns how many
    /// documents were touched.
    pub fn migrate_exempt_statuses(&self) -> usize {
        let exempt_kinds = self.exempt_kinds();
        let migrated = self.store.with_state_mut(|state| {
            let mut migrated = 0usize;
            for doc in state.documents.values_mut() {
                if !exempt_kinds.contains(&doc.kind) {
                    continue;
                }
                let resolved = doc.resolve_payment_status(&exempt_kinds);
                if doc.stored_status != resolved {
                    debug!(
                        document_id = %doc.id,
                        from = ?doc.stored_status,
                        to = ?resolved,
                        "Stored status migrated"
                    );
                    doc.stored_status = resolved;
                    doc.version += 1;
                    doc.updated_at = Utc::now();
                    migrated += 1;
                }
            }
            migrated
        });
        if migrated > 0 {
            info!(count = migrated, "Exempt document statuses migrated");
        }
        migrated
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
