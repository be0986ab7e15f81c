//! # Jurisdiction Tax Plugins
//!
//! Tax rules vary per country, so they live behind a trait. The core
//! engine never hardcodes a rate: it asks the bound [`CountryTaxPlugin`]
//! for default taxes, transactional taxes and exemptions, and the
//! calculator applies whatever comes back.
//!
//! ```text
//! ┌──────────────────────┐     bind("VE")     ┌──────────────────────┐
//! │  TaxPluginRegistry   │ ─────────────────▶ │  CountryTaxPlugin    │
//! │  (code → plugin)     │                    │  (trait object)      │
//! └──────────────────────┘                    └──────────┬───────────┘
//!                                                        │
//!                                             ┌──────────▼───────────┐
//!                                             │ DocumentTaxCalculator│
//!                                             └──────────────────────┘
//! ```

pub mod calculator;
pub mod venezuela;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;
use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, CurrencyAmount};

// =============================================================================
// Tax Definitions
// =============================================================================

/// Which document lines a tax applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxScope {
    /// Every line.
    All,
    /// Only lines whose category is in the set.
    Categories(BTreeSet<String>),
}

impl TaxScope {
    /// Whether a line with the given category falls under this scope.
    pub fn applies_to(&self, category: Option<&str>) -> bool {
        match self {
            TaxScope::All => true,
            TaxScope::Categories(set) => category.map(|c| set.contains(c)).unwrap_or(false),
        }
    }
}

/// A single tax a jurisdiction levies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDefinition {
    /// Stable code shown on fiscal documents ("IVA-16").
    pub code: String,
    pub name: String,
    /// Rate in basis points (1600 = 16%).
    pub rate_bps: u32,
    pub scope: TaxScope,
    /// Transactional taxes apply per payment rather than per line.
    pub transactional: bool,
}

impl TaxDefinition {
    pub fn new(code: impl Into<String>, name: impl Into<String>, rate_bps: u32) -> Self {
        TaxDefinition {
            code: code.into(),
            name: name.into(),
            rate_bps,
            scope: TaxScope::All,
            transactional: false,
        }
    }

    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    pub fn scoped_to(mut self, categories: impl IntoIterator<Item = String>) -> Self {
        self.scope = TaxScope::Categories(categories.into_iter().collect());
        self
    }
}

/// Everything a plugin needs to decide whether a payment attracts a
/// transactional tax.
#[derive(Debug, Clone)]
pub struct TransactionTaxContext {
    pub method_id: String,
    /// The currency the payment settles in, not the document currency.
    pub currency: Currency,
    pub amount: CurrencyAmount,
}

// =============================================================================
// Withholding
// =============================================================================

/// Fiscal classification of the counterparty, used to pick withholding
/// rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerKind {
    /// Regular registered business.
    Ordinary,
    /// Designated special taxpayer (large contributor).
    Special,
    /// Natural person.
    Natural,
}

/// A withholding rule: when a matching taxpayer's purchase exceeds the
/// threshold, a percentage of the TAX amount (not the base) is withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithholdingRule {
    pub code: String,
    pub name: String,
    pub taxpayer: TaxpayerKind,
    /// Minimum document subtotal before the rule fires.
    pub threshold: CurrencyAmount,
    /// Portion of the tax amount withheld, in basis points
    /// (7500 = 75% of the tax).
    pub rate_bps: u32,
}

/// An amount a buyer would withhold under a rule. Informational: it
/// never changes the document total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithholdingAssessment {
    pub rule_code: String,
    pub rule_name: String,
    pub rate_bps: u32,
    pub withheld: CurrencyAmount,
}

/// Evaluates which withholding rules fire for a taxpayer and how much
/// each would withhold from the given tax amount.
pub fn assess_withholdings(
    rules: &[WithholdingRule],
    taxpayer: TaxpayerKind,
    subtotal: CurrencyAmount,
    tax_amount: CurrencyAmount,
) -> Vec<WithholdingAssessment> {
    rules
        .iter()
        .filter(|rule| rule.taxpayer == taxpayer)
        .filter(|rule| {
            rule.threshold.currency() == subtotal.currency()
                && subtotal.minor_units() > rule.threshold.minor_units()
        })
        .map(|rule| WithholdingAssessment {
            rule_code: rule.code.clone(),
            rule_name: rule.name.clone(),
            rate_bps: rule.rate_bps,
            withheld: tax_amount.apply_bps(rule.rate_bps),
        })
        .collect()
}

// =============================================================================
// Plugin Trait & Registry
// =============================================================================

/// One jurisdiction's tax rules.
///
/// Implementations must be pure: same document in, same taxes out. The
/// built-in [`venezuela::VenezuelaTaxPlugin`] is the reference
/// implementation.
pub trait CountryTaxPlugin: Send + Sync {
    /// ISO-style jurisdiction code ("VE").
    fn jurisdiction(&self) -> &str;

    /// Taxes applied per document line.
    fn default_taxes(&self) -> Vec<TaxDefinition>;

    /// Taxes triggered by a specific payment. Empty when the payment
    /// attracts none.
    fn transaction_taxes(&self, ctx: &TransactionTaxContext) -> Vec<TaxDefinition>;

    /// Withholding rules for buyers in this jurisdiction.
    fn withholding_rules(&self) -> Vec<WithholdingRule>;

    /// Document kinds that are wholly tax-exempt.
    fn exempt_document_kinds(&self) -> Vec<DocumentKind>;

    /// Convenience: whether a document kind is exempt.
    fn is_exempt(&self, kind: DocumentKind) -> bool {
        self.exempt_document_kinds().contains(&kind)
    }
}

/// Registry of tax plugins keyed by jurisdiction code.
#[derive(Default)]
pub struct TaxPluginRegistry {
    plugins: HashMap<String, Arc<dyn CountryTaxPlugin>>,
}

impl TaxPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in jurisdictions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(venezuela::VenezuelaTaxPlugin::new()));
        registry
    }

    /// Registers a plugin under its own jurisdiction code, replacing any
    /// previous plugin for that code.
    pub fn register(&mut self, plugin: Arc<dyn CountryTaxPlugin>) {
        self.plugins
            .insert(plugin.jurisdiction().to_string(), plugin);
    }

    /// Resolves the plugin for a jurisdiction code.
    pub fn bind(&self, code: &str) -> CoreResult<Arc<dyn CountryTaxPlugin>> {
        self.plugins
            .get(code)
            .cloned()
            .ok_or_else(|| CoreError::JurisdictionNotRegistered {
                code: code.to_string(),
            })
    }

    pub fn jurisdictions(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_matching() {
        let all = TaxScope::All;
        assert!(all.applies_to(Some("food")));
        assert!(all.applies_to(None));

        let scoped = TaxScope::Categories(["luxury".to_string()].into_iter().collect());
        assert!(scoped.applies_to(Some("luxury")));
        assert!(!scoped.applies_to(Some("food")));
        assert!(!scoped.applies_to(None));
    }

    #[test]
    fn test_registry_bind_unknown_jurisdiction() {
        let registry = TaxPluginRegistry::with_builtins();
        assert!(registry.bind("VE").is_ok());

        match registry.bind("ZZ") {
            Err(CoreError::JurisdictionNotRegistered { code }) => assert_eq!(code, "ZZ"),
            Err(other) => panic!("expected JurisdictionNotRegistered, got {other:?}"),
            Ok(_) => panic!("unknown jurisdiction must not bind"),
        }
    }

    #[test]
    fn test_withholding_assessment_applies_to_tax_amount() {
        let rule = WithholdingRule {
            code: "WH-75".to_string(),
            name: "Standard withholding".to_string(),
            taxpayer: TaxpayerKind::Ordinary,
            threshold: CurrencyAmount::new(0, Currency::USD),
            rate_bps: 7500,
        };

        let subtotal = CurrencyAmount::new(10_000, Currency::USD);
        let tax = CurrencyAmount::new(1600, Currency::USD);

        let hits = assess_withholdings(&[rule.clone()], TaxpayerKind::Ordinary, subtotal, tax);
        assert_eq!(hits.len(), 1);
        // 75% of the 16.00 tax, not of the 100.00 base
        assert_eq!(hits[0].withheld.minor_units(), 1200);

        // Wrong taxpayer kind: no hits
        let misses = assess_withholdings(&[rule], TaxpayerKind::Special, subtotal, tax);
        assert!(misses.is_empty());
    }

    #[test]
    fn test_withholding_respects_threshold() {
        let rule = WithholdingRule {
            code: "WH-100".to_string(),
            name: "Special taxpayer withholding".to_string(),
            taxpayer: TaxpayerKind::Special,
            threshold: CurrencyAmount::new(50_000, Currency::USD),
            rate_bps: 10_000,
        };

        let tax = CurrencyAmount::new(8000, Currency::USD);
        let below = CurrencyAmount::new(50_000, Currency::USD);
        let above = CurrencyAmount::new(50_001, Currency::USD);

        assert!(assess_withholdings(&[rule.clone()], TaxpayerKind::Special, below, tax).is_empty());
        let hits = assess_withholdings(&[rule], TaxpayerKind::Special, above, tax);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].withheld.minor_units(), 8000);
    }
}
