//! Venezuela (VE) tax plugin.
//!
//! - IVA 16% on every non-exempt line.
//! - IGTF 3% on payments that settle in a foreign (non-VES) currency.
//! - Delivery notes are wholly exempt.
//! - IVA withholding: 75% of the tax for ordinary/natural buyers,
//!   100% for designated special taxpayers.

use crate::document::DocumentKind;
use crate::money::{Currency, CurrencyAmount};

use super::{
    CountryTaxPlugin, TaxDefinition, TaxpayerKind, TransactionTaxContext, WithholdingRule,
};

/// IVA rate in basis points.
pub const IVA_RATE_BPS: u32 = 1600;
/// IGTF rate in basis points.
pub const IGTF_RATE_BPS: u32 = 300;

#[derive(Debug, Clone, Default)]
pub struct VenezuelaTaxPlugin;

impl VenezuelaTaxPlugin {
    pub fn new() -> Self {
        VenezuelaTaxPlugin
    }
}

impl CountryTaxPlugin for VenezuelaTaxPlugin {
    fn jurisdiction(&self) -> &str {
        "VE"
    }

    fn default_taxes(&self) -> Vec<TaxDefinition> {
        vec![TaxDefinition::new(
            "IVA-16",
            "Impuesto al Valor Agregado",
            IVA_RATE_BPS,
        )]
    }

    fn transaction_taxes(&self, ctx: &TransactionTaxContext) -> Vec<TaxDefinition> {
        // IGTF is levied on foreign-currency settlement, regardless of
        // the method's name or kind.
        if ctx.currency != Currency::VES {
            vec![
                TaxDefinition::new(
                    "IGTF-3",
                    "Impuesto a las Grandes Transacciones Financieras",
                    IGTF_RATE_BPS,
                )
                .transactional(),
            ]
        } else {
            Vec::new()
        }
    }

    fn withholding_rules(&self) -> Vec<WithholdingRule> {
        vec![
            WithholdingRule {
                code: "IVA-RET-75".to_string(),
                name: "IVA withholding (ordinary taxpayer)".to_string(),
                taxpayer: TaxpayerKind::Ordinary,
                threshold: CurrencyAmount::zero(Currency::VES),
                rate_bps: 7500,
            },
            WithholdingRule {
                code: "IVA-RET-75-NAT".to_string(),
                name: "IVA withholding (natural person)".to_string(),
                taxpayer: TaxpayerKind::Natural,
                threshold: CurrencyAmount::zero(Currency::VES),
                rate_bps: 7500,
            },
            WithholdingRule {
                code: "IVA-RET-100".to_string(),
                name: "IVA withholding (special taxpayer)".to_string(),
                taxpayer: TaxpayerKind::Special,
                threshold: CurrencyAmount::zero(Currency::VES),
                rate_bps: 10_000,
            },
        ]
    }

    fn exempt_document_kinds(&self) -> Vec<DocumentKind> {
        vec![DocumentKind::DeliveryNote]
    }
}
