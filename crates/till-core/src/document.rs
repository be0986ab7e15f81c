//! # Commercial Documents & Payment Methods
//!
//! The document shapes the tax calculator consumes, plus the payment
//! method catalog that classifies tenders (cash vs electronic, and which
//! currency each method settles in).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::money::{Currency, CurrencyAmount, ExchangeRate};

// =============================================================================
// Document Kinds
// =============================================================================

/// The fiscal nature of a commercial document.
///
/// Tax plugins key exemptions off this: a jurisdiction can declare whole
/// kinds exempt (delivery notes in the built-in Venezuela plugin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    FiscalReceipt,
    DeliveryNote,
    Quote,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::FiscalReceipt => "fiscal_receipt",
            DocumentKind::DeliveryNote => "delivery_note",
            DocumentKind::Quote => "quote",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Lines & Declared Payments
// =============================================================================

/// One line of a taxable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    /// Line subtotal (unit price × quantity), pre-tax.
    pub subtotal: CurrencyAmount,
    pub quantity: u32,
    pub unit_price: CurrencyAmount,
    /// Category used by category-scoped taxes.
    pub category: Option<String>,
}

impl DocumentItem {
    pub fn new(unit_price: CurrencyAmount, quantity: u32) -> Self {
        let subtotal = CurrencyAmount::new(
            unit_price.minor_units().saturating_mul(quantity as i64),
            unit_price.currency(),
        );
        DocumentItem {
            subtotal,
            quantity,
            unit_price,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A payment the buyer intends to use, declared up front so
/// transactional taxes can be priced into the document total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredPayment {
    pub method_id: String,
    pub amount: CurrencyAmount,
    /// Required when the payment currency differs from the document
    /// currency; the calculator refuses to guess a rate.
    pub rate: Option<ExchangeRate>,
}

/// The document shape the tax calculator consumes. Pure data, no
/// lifecycle; the stateful settlement layer wraps this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxableDocument {
    pub kind: DocumentKind,
    pub currency: Currency,
    pub items: Vec<DocumentItem>,
    pub declared_payments: Vec<DeclaredPayment>,
    /// Shipping is added to the total but never taxed.
    pub shipping: CurrencyAmount,
}

impl TaxableDocument {
    pub fn new(kind: DocumentKind, currency: Currency) -> Self {
        TaxableDocument {
            kind,
            currency,
            items: Vec::new(),
            declared_payments: Vec::new(),
            shipping: CurrencyAmount::zero(currency),
        }
    }

    pub fn with_item(mut self, item: DocumentItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_declared_payment(mut self, payment: DeclaredPayment) -> Self {
        self.declared_payments.push(payment);
        self
    }

    pub fn with_shipping(mut self, shipping: CurrencyAmount) -> Self {
        self.shipping = shipping;
        self
    }

    /// Sum of line subtotals in the document currency.
    pub fn subtotal(&self) -> CurrencyAmount {
        let mut total = 0i64;
        for item in &self.items {
            total = total.saturating_add(item.subtotal.minor_units());
        }
        CurrencyAmount::new(total, self.currency)
    }
}

// =============================================================================
// Payment Methods
// =============================================================================

/// How a payment method moves money. `Cash` is the only kind that
/// touches the physical drawer and therefore counts toward expected
/// cash at session close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Cash,
    Card,
    Transfer,
    MobilePayment,
    Other,
}

/// A configured payment method: a stable id, a display name, a kind and
/// the currency it settles in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub currency: Currency,
}

impl PaymentMethod {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: PaymentMethodKind,
        currency: Currency,
    ) -> Self {
        PaymentMethod {
            id: id.into(),
            name: name.into(),
            kind,
            currency,
        }
    }

    /// Whether this method puts physical money in the drawer.
    pub fn is_cash(&self) -> bool {
        self.kind == PaymentMethodKind::Cash
    }
}

/// Lookup table of payment methods by id.
///
/// Backed by a `BTreeMap` so iteration order is stable, which keeps
/// session reports deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMethodCatalog {
    methods: BTreeMap<String, PaymentMethod>,
}

impl PaymentMethodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in dual-currency method set for a USD/VES storefront.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for method in [
            PaymentMethod::new("cash_usd", "Cash (USD)", PaymentMethodKind::Cash, Currency::USD),
            PaymentMethod::new("cash_ves", "Cash (VES)", PaymentMethodKind::Cash, Currency::VES),
            PaymentMethod::new("wire_usd", "Wire Transfer (USD)", PaymentMethodKind::Transfer, Currency::USD),
            PaymentMethod::new("wire_ves", "Wire Transfer (VES)", PaymentMethodKind::Transfer, Currency::VES),
            PaymentMethod::new("zelle_usd", "Zelle", PaymentMethodKind::Transfer, Currency::USD),
            PaymentMethod::new("mobile_ves", "Mobile Payment", PaymentMethodKind::MobilePayment, Currency::VES),
            PaymentMethod::new("card_ves", "Debit/Credit Card", PaymentMethodKind::Card, Currency::VES),
            PaymentMethod::new("pos_ves", "POS Terminal", PaymentMethodKind::Card, Currency::VES),
        ] {
            catalog.register(method);
        }
        catalog
    }

    /// Registers or replaces a method under its id.
    pub fn register(&mut self, method: PaymentMethod) {
        self.methods.insert(method.id.clone(), method);
    }

    pub fn get(&self, id: &str) -> Option<&PaymentMethod> {
        self.methods.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaymentMethod> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
