//! # Cash Sessions & Drawer Reconciliation
//!
//! A cash session is one cashier's shift at one register: opening
//! floats in, sales and manual movements through, a counted drawer out.
//! Everything here is per-currency because a drawer routinely holds two
//! kinds of bills.
//!
//! ## Expected Cash
//! ```text
//! expected[c] = opening[c] + tendered[c] − change[c] + in[c] − out[c]
//! ```
//! Only confirmed cash payments count; electronic payments never touch
//! the drawer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::PaymentMethodCatalog;
use crate::money::{Currency, CurrencyAmount};
use crate::settlement::PaymentRecord;

// =============================================================================
// Sessions & Movements
// =============================================================================

/// Direction of a manual drawer movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Money added to the drawer (float top-up, petty cash return).
    In,
    /// Money taken out (safe drop, supplier paid from the till).
    Out,
}

/// A manual cash movement recorded against an open session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    pub kind: MovementKind,
    pub amount: CurrencyAmount,
    pub reason: String,
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
}

/// Lifecycle of a session. Closed is terminal: a session never
/// reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
}

/// One cashier shift at one register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: String,
    pub register: String,
    pub cashier: String,
    pub opened_at: DateTime<Utc>,
    /// One float per currency placed in the drawer at open.
    pub opening_floats: Vec<CurrencyAmount>,
    pub movements: Vec<CashMovement>,
    pub state: SessionState,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set once the session is reconciled.
    pub closing_id: Option<String>,
    pub version: u64,
}

impl CashSession {
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }
}

// =============================================================================
// Session Totals
// =============================================================================

/// Per-currency aggregates for a session, keyed by currency so
/// iteration (and therefore every report built from this) is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub total_transactions: u64,
    /// Confirmed sales by payment currency, all methods.
    pub gross_sales: BTreeMap<Currency, i64>,
    /// Physical cash that entered the drawer, by currency.
    pub cash_received: BTreeMap<Currency, i64>,
    /// Physical cash handed back as change, by currency.
    pub change_given: BTreeMap<Currency, i64>,
    pub movements_in: BTreeMap<Currency, i64>,
    pub movements_out: BTreeMap<Currency, i64>,
    /// opening + received − change + in − out, by currency.
    pub expected_cash: BTreeMap<Currency, i64>,
}

impl SessionTotals {
    pub fn expected(&self, currency: Currency) -> CurrencyAmount {
        CurrencyAmount::new(
            self.expected_cash.get(&currency).copied().unwrap_or(0),
            currency,
        )
    }
}

fn add(map: &mut BTreeMap<Currency, i64>, amount: CurrencyAmount) {
    let entry = map.entry(amount.currency()).or_insert(0);
    *entry = entry.saturating_add(amount.minor_units());
}

/// Computes the per-currency aggregates for a session.
///
/// `confirmed_payments` must already be filtered to payments belonging
/// to this session; unconfirmed records are skipped here regardless.
/// The catalog decides which methods are physical cash. Change is
/// attributed per breakdown entry when one exists (cross-currency
/// change), falling back to the single `change_given` amount.
pub fn session_totals(
    session: &CashSession,
    confirmed_payments: &[PaymentRecord],
    catalog: &PaymentMethodCatalog,
) -> SessionTotals {
    let mut totals = SessionTotals::default();

    for payment in confirmed_payments {
        if !payment.is_confirmed() {
            continue;
        }
        totals.total_transactions += 1;
        add(&mut totals.gross_sales, payment.amount);

        let is_cash = catalog
            .get(&payment.method_id)
            .map(|m| m.is_cash())
            .unwrap_or(false);
        if !is_cash {
            continue;
        }

        // What physically entered the drawer: the tendered amount when
        // recorded, otherwise the exact gross (amount plus its
        // transactional tax).
        let received = payment
            .amount_tendered
            .unwrap_or_else(|| CurrencyAmount::new(payment.gross_amount(), payment.currency));
        add(&mut totals.cash_received, received);

        if let Some(breakdown) = &payment.change_breakdown {
            for piece in breakdown {
                add(&mut totals.change_given, *piece);
            }
        } else if let Some(change) = payment.change_given {
            add(&mut totals.change_given, change);
        }
    }

    for movement in &session.movements {
        match movement.kind {
            MovementKind::In => add(&mut totals.movements_in, movement.amount),
            MovementKind::Out => add(&mut totals.movements_out, movement.amount),
        }
    }

    // expected = opening + received − change + in − out, per currency
    let mut expected: BTreeMap<Currency, i64> = BTreeMap::new();
    for float in &session.opening_floats {
        add(&mut expected, *float);
    }
    for (currency, units) in &totals.cash_received {
        *expected.entry(*currency).or_insert(0) += units;
    }
    for (currency, units) in &totals.change_given {
        *expected.entry(*currency).or_insert(0) -= units;
    }
    for (currency, units) in &totals.movements_in {
        *expected.entry(*currency).or_insert(0) += units;
    }
    for (currency, units) in &totals.movements_out {
        *expected.entry(*currency).or_insert(0) -= units;
    }
    totals.expected_cash = expected;

    totals
}

// =============================================================================
// Differences & Tolerance
// =============================================================================

/// Per-currency tolerance for drawer counting noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawerTolerance {
    /// Tolerance applied to currencies without an override, in minor
    /// units.
    pub default_minor: i64,
    pub overrides: BTreeMap<Currency, i64>,
}

impl Default for DrawerTolerance {
    /// One cent for hard currency; one bolivar (100 céntimos) for VES,
    /// where per-coin precision is not realistic.
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(Currency::VES, 100);
        DrawerTolerance {
            default_minor: 1,
            overrides,
        }
    }
}

impl DrawerTolerance {
    pub fn for_currency(&self, currency: Currency) -> i64 {
        self.overrides
            .get(&currency)
            .copied()
            .unwrap_or(self.default_minor)
    }
}

/// How a counted drawer compares to the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceStatus {
    /// Within tolerance.
    Balanced,
    /// More in the drawer than expected.
    Surplus,
    /// Less in the drawer than expected.
    Shortage,
}

/// One currency's reconciliation line at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashDifference {
    pub currency: Currency,
    pub expected: CurrencyAmount,
    pub declared: CurrencyAmount,
    /// declared − expected.
    pub difference: CurrencyAmount,
    pub status: DifferenceStatus,
}

/// Classifies declared against expected under the tolerance for that
/// currency.
pub fn classify_difference(
    expected: CurrencyAmount,
    declared: CurrencyAmount,
    tolerance: &DrawerTolerance,
) -> CashDifference {
    let currency = expected.currency();
    let diff = declared.minor_units().saturating_sub(expected.minor_units());
    let allowed = tolerance.for_currency(currency);

    let status = if diff.abs() <= allowed {
        DifferenceStatus::Balanced
    } else if diff > 0 {
        DifferenceStatus::Surplus
    } else {
        DifferenceStatus::Shortage
    };

    CashDifference {
        currency,
        expected,
        declared,
        difference: CurrencyAmount::new(diff, currency),
        status,
    }
}

// =============================================================================
// Closing Records
// =============================================================================

/// Approval state of a closing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingStatus {
    /// Every currency balanced; no supervisor needed.
    AutoApproved,
    /// At least one surplus or shortage awaits a supervisor.
    PendingApproval,
    Approved,
    Rejected,
}

/// The immutable receipt of a session close. Derived fields can be
/// recomputed by the repair operation; the declared counts never
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingRecord {
    pub id: String,
    pub session_id: String,
    pub register: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub totals: SessionTotals,
    pub differences: Vec<CashDifference>,
    pub has_differences: bool,
    pub status: ClosingStatus,
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
    pub repaired_at: Option<DateTime<Utc>>,
    pub repaired_by: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::PaymentState;

    fn usd(minor: i64) -> CurrencyAmount {
        CurrencyAmount::new(minor, Currency::USD)
    }

    fn ves(minor: i64) -> CurrencyAmount {
        CurrencyAmount::new(minor, Currency::VES)
    }

    fn cash_payment(
        method: &str,
        currency: Currency,
        amount: i64,
        tendered: Option<i64>,
        change: Option<i64>,
    ) -> PaymentRecord {
        PaymentRecord {
            method_id: method.to_string(),
            currency,
            amount: CurrencyAmount::new(amount, currency),
            transaction_tax: CurrencyAmount::zero(currency),
            amount_tendered: tendered.map(|t| CurrencyAmount::new(t, currency)),
            change_given: change.map(|c| CurrencyAmount::new(c, currency)),
            change_breakdown: None,
            reference: None,
            account_id: None,
            status: PaymentState::Confirmed,
            confirmed_method: None,
            confirmed_at: Some(Utc::now()),
            recorded_at: Utc::now(),
        }
    }

    fn session_with_float(floats: Vec<CurrencyAmount>) -> CashSession {
        CashSession {
            id: "sess-1".to_string(),
            register: "front".to_string(),
            cashier: "alice".to_string(),
            opened_at: Utc::now(),
            opening_floats: floats,
            movements: Vec::new(),
            state: SessionState::Open,
            closed_at: None,
            closing_id: None,
            version: 1,
        }
    }

    #[test]
    fn test_expected_cash_full_formula() {
        // Opening 200.00, cash sale 450.00 (tendered 470.00, change
        // 20.00), float top-up 50.00, safe drop 100.00:
        // 200 + 470 − 20 + 50 − 100 = 600.00
        let mut session = session_with_float(vec![usd(20_000)]);
        session.movements.push(CashMovement {
            kind: MovementKind::In,
            amount: usd(5000),
            reason: "float top-up".to_string(),
            reference: None,
            at: Utc::now(),
        });
        session.movements.push(CashMovement {
            kind: MovementKind::Out,
            amount: usd(10_000),
            reason: "safe drop".to_string(),
            reference: None,
            at: Utc::now(),
        });

        let payments = vec![cash_payment(
            "cash_usd",
            Currency::USD,
            45_000,
            Some(47_000),
            Some(2000),
        )];
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &payments, &catalog);
        assert_eq!(totals.expected(Currency::USD).minor_units(), 60_000);
        assert_eq!(totals.total_transactions, 1);
    }

    #[test]
    fn test_drawer_day_reconciles() {
        // Opening 100.00, tendered 500.00 with 15.00 change, top-up
        // 20.00, drop 30.00 → expected 575.00. Declared spot-on
        // balances; 580.00 is a 5.00 surplus; 560.00 a 15.00 shortage.
        let mut session = session_with_float(vec![usd(10_000)]);
        session.movements.push(CashMovement {
            kind: MovementKind::In,
            amount: usd(2000),
            reason: "float top-up".to_string(),
            reference: None,
            at: Utc::now(),
        });
        session.movements.push(CashMovement {
            kind: MovementKind::Out,
            amount: usd(3000),
            reason: "safe drop".to_string(),
            reference: None,
            at: Utc::now(),
        });
        let payments = vec![cash_payment(
            "cash_usd",
            Currency::USD,
            48_500,
            Some(50_000),
            Some(1500),
        )];
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &payments, &catalog);
        let expected = totals.expected(Currency::USD);
        assert_eq!(expected.minor_units(), 57_500);

        let tolerance = DrawerTolerance::default();
        assert_eq!(
            classify_difference(expected, usd(57_500), &tolerance).status,
            DifferenceStatus::Balanced
        );
        let surplus = classify_difference(expected, usd(58_000), &tolerance);
        assert_eq!(surplus.status, DifferenceStatus::Surplus);
        assert_eq!(surplus.difference.minor_units(), 500);
        let shortage = classify_difference(expected, usd(56_000), &tolerance);
        assert_eq!(shortage.status, DifferenceStatus::Shortage);
        assert_eq!(shortage.difference.minor_units(), -1500);
    }

    #[test]
    fn test_electronic_payments_never_touch_the_drawer() {
        let session = session_with_float(vec![usd(10_000)]);
        let payments = vec![
            cash_payment("cash_usd", Currency::USD, 5000, None, None),
            cash_payment("zelle_usd", Currency::USD, 30_000, None, None),
        ];
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &payments, &catalog);
        // Expected moves only by the cash sale
        assert_eq!(totals.expected(Currency::USD).minor_units(), 15_000);
        // Gross sales see both
        assert_eq!(totals.gross_sales[&Currency::USD], 35_000);
        assert_eq!(totals.total_transactions, 2);
    }

    #[test]
    fn test_unconfirmed_payments_skipped() {
        let session = session_with_float(vec![usd(0)]);
        let mut pending = cash_payment("cash_usd", Currency::USD, 5000, None, None);
        pending.status = PaymentState::Pending;
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &[pending], &catalog);
        assert_eq!(totals.total_transactions, 0);
        assert_eq!(totals.expected(Currency::USD).minor_units(), 0);
    }

    #[test]
    fn test_dual_currency_drawer_tracked_separately() {
        let session = session_with_float(vec![usd(10_000), ves(500_000)]);
        let payments = vec![
            cash_payment("cash_usd", Currency::USD, 4000, None, None),
            cash_payment("cash_ves", Currency::VES, 250_000, None, None),
        ];
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &payments, &catalog);
        assert_eq!(totals.expected(Currency::USD).minor_units(), 14_000);
        assert_eq!(totals.expected(Currency::VES).minor_units(), 750_000);
    }

    #[test]
    fn test_cross_currency_change_uses_breakdown() {
        // Customer pays a 40.00 USD sale with a 50 bill and takes
        // change as 5 USD + some bolivars. Each drawer moves by its
        // own piece.
        let session = session_with_float(vec![usd(0), ves(200_000)]);
        let mut payment = cash_payment("cash_usd", Currency::USD, 4000, Some(5000), None);
        payment.change_breakdown = Some(vec![usd(500), ves(18_250)]);
        let catalog = PaymentMethodCatalog::with_builtins();

        let totals = session_totals(&session, &[payment], &catalog);
        assert_eq!(totals.expected(Currency::USD).minor_units(), 4500);
        assert_eq!(totals.expected(Currency::VES).minor_units(), 181_750);
    }

    #[test]
    fn test_difference_classification_per_currency_tolerance() {
        let tolerance = DrawerTolerance::default();

        // USD: off by one cent balances, two cents does not
        let balanced = classify_difference(usd(57_500), usd(57_501), &tolerance);
        assert_eq!(balanced.status, DifferenceStatus::Balanced);

        let surplus = classify_difference(usd(57_500), usd(58_000), &tolerance);
        assert_eq!(surplus.status, DifferenceStatus::Surplus);
        assert_eq!(surplus.difference.minor_units(), 500);

        let shortage = classify_difference(usd(57_500), usd(56_000), &tolerance);
        assert_eq!(shortage.status, DifferenceStatus::Shortage);
        assert_eq!(shortage.difference.minor_units(), -1500);

        // VES: off by a whole bolivar still balances
        let ves_ok = classify_difference(ves(750_000), ves(750_100), &tolerance);
        assert_eq!(ves_ok.status, DifferenceStatus::Balanced);
        let ves_over = classify_difference(ves(750_000), ves(750_101), &tolerance);
        assert_eq!(ves_over.status, DifferenceStatus::Surplus);
    }

    #[test]
    fn test_session_totals_deterministic() {
        let session = session_with_float(vec![ves(500_000), usd(10_000)]);
        let payments = vec![
            cash_payment("cash_ves", Currency::VES, 100_000, None, None),
            cash_payment("cash_usd", Currency::USD, 2000, None, None),
        ];
        let catalog = PaymentMethodCatalog::with_builtins();

        let a = session_totals(&session, &payments, &catalog);
        let b = session_totals(&session, &payments, &catalog);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
