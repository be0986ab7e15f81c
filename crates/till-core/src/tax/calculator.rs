//! # Document Tax Calculator
//!
//! Applies a jurisdiction plugin to a [`TaxableDocument`] and produces
//! the fiscal totals:
//!
//! ```text
//! total = subtotal + line taxes + transaction taxes + shipping
//! ```
//!
//! Exempt document kinds short-circuit: no line tax, no transaction
//! tax, total = subtotal + shipping. Shipping is never taxed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentItem, TaxableDocument};
use crate::error::{CoreError, CoreResult};
use crate::money::CurrencyAmount;

use super::{CountryTaxPlugin, TaxDefinition, TransactionTaxContext};

/// One applied tax line in a document's breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    pub code: String,
    pub name: String,
    pub rate_bps: u32,
    /// The amount the rate was applied to, in document currency.
    pub base: CurrencyAmount,
    pub amount: CurrencyAmount,
    pub transactional: bool,
}

/// The fiscal totals for a document, all in document currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTaxResult {
    pub subtotal: CurrencyAmount,
    /// Sum of non-transactional taxes.
    pub total_tax: CurrencyAmount,
    /// Sum of payment-triggered taxes.
    pub total_transaction_tax: CurrencyAmount,
    pub shipping: CurrencyAmount,
    pub total: CurrencyAmount,
    pub exempt: bool,
    pub breakdown: Vec<TaxResult>,
}

/// Tax owed on a single line under the given non-transactional taxes,
/// honoring each tax's category scope.
pub fn calculate_line_tax(item: &DocumentItem, taxes: &[TaxDefinition]) -> CurrencyAmount {
    let mut total = CurrencyAmount::zero(item.subtotal.currency());
    for tax in taxes {
        if tax.transactional || !tax.scope.applies_to(item.category.as_deref()) {
            continue;
        }
        total = CurrencyAmount::new(
            total
                .minor_units()
                .saturating_add(item.subtotal.apply_bps(tax.rate_bps).minor_units()),
            total.currency(),
        );
    }
    total
}

/// Stateless calculator bound to one jurisdiction plugin.
pub struct DocumentTaxCalculator {
    plugin: Arc<dyn CountryTaxPlugin>,
}

impl DocumentTaxCalculator {
    pub fn new(plugin: Arc<dyn CountryTaxPlugin>) -> Self {
        DocumentTaxCalculator { plugin }
    }

    pub fn jurisdiction(&self) -> &str {
        self.plugin.jurisdiction()
    }

    /// Computes the full fiscal breakdown for a document.
    ///
    /// ## Errors
    /// - [`CoreError::CurrencyMismatch`] when shipping or an item is in
    ///   a different currency than the document
    /// - [`CoreError::MissingExchangeRate`] when a declared payment
    ///   settles in a foreign currency without carrying a rate
    /// - [`CoreError::AmountOverflow`] on i64 overflow
    pub fn calculate(&self, document: &TaxableDocument) -> CoreResult<DocumentTaxResult> {
        let currency = document.currency;
        let subtotal = document.subtotal();

        if document.shipping.currency() != currency {
            return Err(CoreError::CurrencyMismatch {
                expected: currency.code().to_string(),
                found: document.shipping.currency().code().to_string(),
            });
        }

        // Exempt kinds skip taxation entirely; the document still owes
        // its untaxed shipping.
        if self.plugin.is_exempt(document.kind) {
            let total = subtotal.try_add(document.shipping)?;
            return Ok(DocumentTaxResult {
                subtotal,
                total_tax: CurrencyAmount::zero(currency),
                total_transaction_tax: CurrencyAmount::zero(currency),
                shipping: document.shipping,
                total,
                exempt: true,
                breakdown: Vec::new(),
            });
        }

        for item in &document.items {
            if item.subtotal.currency() != currency {
                return Err(CoreError::CurrencyMismatch {
                    expected: currency.code().to_string(),
                    found: item.subtotal.currency().code().to_string(),
                });
            }
        }

        // Line taxes are rounded per line and summed, never applied to
        // the aggregated base: two 0.15 lines at 16% owe 0.02 + 0.02,
        // not 16% of 0.30.
        let taxes = self.plugin.default_taxes();
        let mut total_tax = CurrencyAmount::zero(currency);
        for item in &document.items {
            total_tax = total_tax.try_add(calculate_line_tax(item, &taxes))?;
        }

        // Breakdown: one entry per tax code, accumulated line by line.
        let mut breakdown: Vec<TaxResult> = Vec::new();
        for tax in taxes {
            if tax.transactional {
                continue;
            }
            let mut base = CurrencyAmount::zero(currency);
            let mut amount = CurrencyAmount::zero(currency);
            for item in &document.items {
                if tax.scope.applies_to(item.category.as_deref()) {
                    base = base.try_add(item.subtotal)?;
                    amount = amount.try_add(item.subtotal.apply_bps(tax.rate_bps))?;
                }
            }
            if base.is_zero() {
                continue;
            }
            breakdown.push(TaxResult {
                code: tax.code,
                name: tax.name,
                rate_bps: tax.rate_bps,
                base,
                amount,
                transactional: false,
            });
        }

        // Transaction taxes: priced per declared payment, converted to
        // document currency when the payment settles elsewhere.
        let mut total_transaction_tax = CurrencyAmount::zero(currency);
        for payment in &document.declared_payments {
            let ctx = TransactionTaxContext {
                method_id: payment.method_id.clone(),
                currency: payment.amount.currency(),
                amount: payment.amount,
            };
            for tax in self.plugin.transaction_taxes(&ctx) {
                let fee = payment.amount.apply_bps(tax.rate_bps);
                let (base, fee) = if payment.amount.currency() == currency {
                    (payment.amount, fee)
                } else {
                    let rate = payment.rate.as_ref().ok_or_else(|| {
                        CoreError::MissingExchangeRate {
                            from: payment.amount.currency().code().to_string(),
                            to: currency.code().to_string(),
                        }
                    })?;
                    (rate.apply(payment.amount)?, rate.apply(fee)?)
                };
                total_transaction_tax = total_transaction_tax.try_add(fee)?;
                breakdown.push(TaxResult {
                    code: tax.code,
                    name: tax.name,
                    rate_bps: tax.rate_bps,
                    base,
                    amount: fee,
                    transactional: true,
                });
            }
        }

        let total = subtotal
            .try_add(total_tax)?
            .try_add(total_transaction_tax)?
            .try_add(document.shipping)?;

        Ok(DocumentTaxResult {
            subtotal,
            total_tax,
            total_transaction_tax,
            shipping: document.shipping,
            total,
            exempt: false,
            breakdown,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
