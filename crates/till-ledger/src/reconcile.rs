//! # Closing Reconciler
//!
//! Closes a cash session against counted drawer amounts and manages the
//! resulting closing record.
//!
//! ```text
//!                   close_session
//!                        │
//!        ┌───────────────▼────────────────┐
//!        │  expected vs declared, per     │
//!        │  currency, under tolerance     │
//!        └───────┬────────────────┬───────┘
//!     all balanced            any surplus/shortage
//!                │                │
//!                ▼                ▼
//!          AutoApproved    PendingApproval ──► Approved / Rejected
//! ```
//!
//! Closing is terminal for the session. The closing record's declared
//! counts are immutable; `repair` recomputes only the derived side
//! (totals, differences, status) after an upstream correction such as a
//! late payment confirmation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use till_core::money::{Currency, CurrencyAmount};
use till_core::session::{
    classify_difference, session_totals, CashDifference, ClosingRecord, ClosingStatus,
    DifferenceStatus, DrawerTolerance, SessionState,
};

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Stateful closing operations over the ledger store.
pub struct ClosingReconciler {
    store: Arc<LedgerStore>,
    tolerance: DrawerTolerance,
}

impl ClosingReconciler {
    pub fn new(store: Arc<LedgerStore>, tolerance: DrawerTolerance) -> Self {
        ClosingReconciler { store, tolerance }
    }

    /// Closes a session against the declared per-currency counts.
    ///
    /// ## Conflicts
    /// A closed session rejects a second close; two racing closes
    /// serialize on the store lock and exactly one wins.
    pub fn close_session(
        &self,
        session_id: &str,
        declared: Vec<CurrencyAmount>,
        closed_by: &str,
    ) -> LedgerResult<ClosingRecord> {
        self.store.with_state_mut(|state| {
            let payments = state.confirmed_payments_for_session(session_id);
            let session = state.session_mut(session_id)?;

            if session.state != SessionState::Open {
                return Err(LedgerError::SessionAlreadyClosed {
                    id: session_id.to_string(),
                });
            }

            let totals = session_totals(session, &payments, self.store.catalog());
            let differences =
                reconcile_differences(&totals.expected_cash, &declared, &self.tolerance);
            let has_differences = differences
                .iter()
                .any(|d| d.status != DifferenceStatus::Balanced);
            let status = if has_differences {
                ClosingStatus::PendingApproval
            } else {
                ClosingStatus::AutoApproved
            };

            let now = Utc::now();
            let closing = ClosingRecord {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                register: session.register.clone(),
                period_start: session.opened_at,
                period_end: now,
                totals,
                differences,
                has_differences,
                status,
                closed_by: closed_by.to_string(),
                closed_at: now,
                repaired_at: None,
                repaired_by: None,
            };

            session.state = SessionState::Closed;
            session.closed_at = Some(now);
            session.closing_id = Some(closing.id.clone());
            session.version += 1;

            if has_differences {
                warn!(
                    session_id = %session_id,
                    closing_id = %closing.id,
                    "Session closed with differences, awaiting approval"
                );
            } else {
                info!(
                    session_id = %session_id,
                    closing_id = %closing.id,
                    "Session closed balanced"
                );
            }

            state.closings.insert(closing.id.clone(), closing.clone());
            Ok(closing)
        })
    }

    /// Approves a closing awaiting supervision.
    pub fn approve(&self, closing_id: &str, approved_by: &str) -> LedgerResult<ClosingRecord> {
        self.transition(closing_id, approved_by, ClosingStatus::Approved)
    }

    /// Rejects a closing awaiting supervision.
    pub fn reject(&self, closing_id: &str, rejected_by: &str) -> LedgerResult<ClosingRecord> {
        self.transition(closing_id, rejected_by, ClosingStatus::Rejected)
    }

    fn transition(
        &self,
        closing_id: &str,
        by: &str,
        to: ClosingStatus,
    ) -> LedgerResult<ClosingRecord> {
        self.store.with_state_mut(|state| {
            let closing = state.closing_mut(closing_id)?;
            if closing.status != ClosingStatus::PendingApproval {
                return Err(LedgerError::ClosingNotPending {
                    id: closing_id.to_string(),
                });
            }
            closing.status = to;
            info!(closing_id = %closing_id, by = by, status = ?to, "Closing reviewed");
            Ok(closing.clone())
        })
    }

    /// Recomputes a closing's derived fields from current session and
    /// payment data, keeping the declared counts as counted.
    ///
    /// Running repair twice without new upstream data is a no-op apart
    /// from the repair stamp. A closing already approved or rejected
    /// keeps its review verdict.
    pub fn repair(&self, closing_id: &str, repaired_by: &str) -> LedgerResult<ClosingRecord> {
        self.store.with_state_mut(|state| {
            let closing = state.closing(closing_id)?.clone();
            let payments = state.confirmed_payments_for_session(&closing.session_id);
            let session = state.session(&closing.session_id)?;

            let totals = session_totals(session, &payments, self.store.catalog());
            let declared: Vec<CurrencyAmount> = closing
                .differences
                .iter()
                .map(|d| d.declared)
                .collect();
            let differences =
                reconcile_differences(&totals.expected_cash, &declared, &self.tolerance);
            let has_differences = differences
                .iter()
                .any(|d| d.status != DifferenceStatus::Balanced);

            let closing = state.closing_mut(closing_id)?;
            closing.totals = totals;
            closing.differences = differences;
            closing.has_differences = has_differences;
            if matches!(
                closing.status,
                ClosingStatus::AutoApproved | ClosingStatus::PendingApproval
            ) {
                closing.status = if has_differences {
                    ClosingStatus::PendingApproval
                } else {
                    ClosingStatus::AutoApproved
                };
            }
            closing.repaired_at = Some(Utc::now());
            closing.repaired_by = Some(repaired_by.to_string());

            info!(
                closing_id = %closing_id,
                by = repaired_by,
                has_differences = has_differences,
                "Closing repaired"
            );
            Ok(closing.clone())
        })
    }
}

/// Pairs expected and declared per currency. Currencies the drawer was
/// expected to hold default the declared side to zero; currencies
/// declared but never expected default the expected side to zero, so a
/// stray bill still surfaces as a surplus.
fn reconcile_differences(
    expected: &std::collections::BTreeMap<Currency, i64>,
    declared: &[CurrencyAmount],
    tolerance: &DrawerTolerance,
) -> Vec<CashDifference> {
    let mut currencies: Vec<Currency> = expected.keys().copied().collect();
    for amount in declared {
        if !currencies.contains(&amount.currency()) {
            currencies.push(amount.currency());
        }
    }
    currencies.sort();

    currencies
        .into_iter()
        .map(|currency| {
            let expected_units = expected.get(&currency).copied().unwrap_or(0);
            let declared_units = declared
                .iter()
                .filter(|a| a.currency() == currency)
                .map(|a| a.minor_units())
                .sum();
            classify_difference(
                CurrencyAmount::new(expected_units, currency),
                CurrencyAmount::new(declared_units, currency),
                tolerance,
            )
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CashSessionLedger;
    use crate::settlement::{NewPayment, PaymentSettlement};
    use till_core::document::{DocumentItem, DocumentKind, TaxableDocument};
    use till_core::session::MovementKind;
    use till_core::settlement::SettlementAccount;
    use till_core::tax::venezuela::VenezuelaTaxPlugin;

    fn usd(minor: i64) -> CurrencyAmount {
        CurrencyAmount::new(minor, Currency::USD)
    }

    fn ves(minor: i64) -> CurrencyAmount {
        CurrencyAmount::new(minor, Currency::VES)
    }

    struct Fixture {
        store: Arc<LedgerStore>,
        ledger: CashSessionLedger,
        settlement: PaymentSettlement,
        reconciler: ClosingReconciler,
    }

    fn setup() -> Fixture {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let store = Arc::new(LedgerStore::with_builtins());
        store.register_account(SettlementAccount::new("vault", "Cash Vault", Currency::USD));
        Fixture {
            ledger: CashSessionLedger::new(Arc::clone(&store)),
            settlement: PaymentSettlement::new(
                Arc::clone(&store),
                Arc::new(VenezuelaTaxPlugin::new()),
            ),
            reconciler: ClosingReconciler::new(Arc::clone(&store), DrawerTolerance::default()),
            store,
        }
    }

    /// Opens a session with a 200.00 float and runs one confirmed cash
    /// sale through it: gross 119.48, tendered 120.00, change 0.52.
    /// Expected drawer: 200 + 120 − 0.52 = 319.48.
    fn session_with_sale(fx: &Fixture) -> (String, String) {
        let session = fx
            .ledger
            .open_session("front-1", "alice", vec![usd(20_000)])
            .unwrap();
        let doc = fx
            .settlement
            .create_document(
                &TaxableDocument::new(DocumentKind::Invoice, Currency::USD)
                    .with_item(DocumentItem::new(usd(10_000), 1)),
                Some(session.id.clone()),
            )
            .unwrap();
        fx.settlement
            .add_payment(
                &doc.id,
                NewPayment::new("cash_usd", usd(11_600)).tendered(usd(12_000)),
            )
            .unwrap();
        fx.settlement
            .confirm_payment(&doc.id, 0, "vault", None, None)
            .unwrap();
        (session.id, doc.id)
    }

    #[test]
    fn test_balanced_close_auto_approves() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);

        let closing = fx
            .reconciler
            .close_session(&session_id, vec![usd(31_948)], "alice")
            .unwrap();

        assert_eq!(closing.status, ClosingStatus::AutoApproved);
        assert!(!closing.has_differences);
        assert_eq!(closing.differences.len(), 1);
        assert_eq!(closing.differences[0].status, DifferenceStatus::Balanced);
        assert_eq!(closing.totals.expected(Currency::USD).minor_units(), 31_948);

        let session = fx.store.session(&session_id).unwrap();
        assert_eq!(session.state, SessionState::Closed);
        assert_eq!(session.closing_id.as_deref(), Some(closing.id.as_str()));
    }

    #[test]
    fn test_shortage_and_surplus_await_approval() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);

        // 15.00 short
        let closing = fx
            .reconciler
            .close_session(&session_id, vec![usd(30_448)], "alice")
            .unwrap();
        assert_eq!(closing.status, ClosingStatus::PendingApproval);
        assert!(closing.has_differences);
        assert_eq!(closing.differences[0].status, DifferenceStatus::Shortage);
        assert_eq!(closing.differences[0].difference.minor_units(), -1500);
    }

    #[test]
    fn test_ves_tolerance_absorbs_a_bolivar() {
        let fx = setup();
        let session = fx
            .ledger
            .open_session("front-1", "alice", vec![ves(500_000)])
            .unwrap();
        fx.ledger
            .record_movement(&session.id, MovementKind::In, ves(100_000), "top-up", None)
            .unwrap();

        // 0.80 Bs over: inside the 1 Bs tolerance
        let closing = fx
            .reconciler
            .close_session(&session.id, vec![ves(600_080)], "alice")
            .unwrap();
        assert_eq!(closing.status, ClosingStatus::AutoApproved);
    }

    #[test]
    fn test_stray_currency_surfaces_as_surplus() {
        let fx = setup();
        let session = fx
            .ledger
            .open_session("front-1", "alice", vec![usd(10_000)])
            .unwrap();

        // A VES bill in a drawer that was never expected to hold VES
        let closing = fx
            .reconciler
            .close_session(&session.id, vec![usd(10_000), ves(50_000)], "alice")
            .unwrap();
        let ves_line = closing
            .differences
            .iter()
            .find(|d| d.currency == Currency::VES)
            .unwrap();
        assert_eq!(ves_line.status, DifferenceStatus::Surplus);
        assert_eq!(ves_line.expected.minor_units(), 0);
    }

    #[test]
    fn test_undeclared_currency_counts_as_zero() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);

        // Cashier declares nothing: full shortage
        let closing = fx
            .reconciler
            .close_session(&session_id, vec![], "alice")
            .unwrap();
        assert_eq!(closing.differences[0].declared.minor_units(), 0);
        assert_eq!(closing.differences[0].status, DifferenceStatus::Shortage);
    }

    #[test]
    fn test_double_close_conflicts() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);

        fx.reconciler
            .close_session(&session_id, vec![usd(31_948)], "alice")
            .unwrap();
        assert!(matches!(
            fx.reconciler.close_session(&session_id, vec![], "bob"),
            Err(LedgerError::SessionAlreadyClosed { .. })
        ));
        assert!(matches!(
            fx.reconciler.close_session("ghost", vec![], "bob"),
            Err(LedgerError::SessionNotFound { .. })
        ));
    }

    #[test]
    fn test_racing_closes_produce_exactly_one_closing() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);

        let reconciler = Arc::new(ClosingReconciler::new(
            Arc::clone(&fx.store),
            DrawerTolerance::default(),
        ));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let reconciler = Arc::clone(&reconciler);
                let session_id = session_id.clone();
                std::thread::spawn(move || {
                    reconciler.close_session(&session_id, vec![usd(31_948)], &format!("user-{i}"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(LedgerError::SessionAlreadyClosed { .. }))));

        let closings = fx.store.with_state(|s| s.closings.len());
        assert_eq!(closings, 1);
    }

    #[test]
    fn test_approve_and_reject_transitions() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);
        let closing = fx
            .reconciler
            .close_session(&session_id, vec![usd(30_000)], "alice")
            .unwrap();
        assert_eq!(closing.status, ClosingStatus::PendingApproval);

        let approved = fx.reconciler.approve(&closing.id, "supervisor").unwrap();
        assert_eq!(approved.status, ClosingStatus::Approved);

        // Terminal: no second review
        assert!(matches!(
            fx.reconciler.reject(&closing.id, "supervisor"),
            Err(LedgerError::ClosingNotPending { .. })
        ));

        // Balanced closings were never pending
        let fx2 = setup();
        let (session_id, _) = session_with_sale(&fx2);
        let balanced = fx2
            .reconciler
            .close_session(&session_id, vec![usd(31_948)], "alice")
            .unwrap();
        assert!(matches!(
            fx2.reconciler.approve(&balanced.id, "supervisor"),
            Err(LedgerError::ClosingNotPending { .. })
        ));
    }

    #[test]
    fn test_repair_recomputes_after_late_confirmation() {
        let fx = setup();
        let session = fx
            .ledger
            .open_session("front-1", "alice", vec![usd(20_000)])
            .unwrap();

        // Sale recorded but not yet confirmed when the drawer closes
        let doc = fx
            .settlement
            .create_document(
                &TaxableDocument::new(DocumentKind::Invoice, Currency::USD)
                    .with_item(DocumentItem::new(usd(10_000), 1)),
                Some(session.id.clone()),
            )
            .unwrap();
        fx.settlement
            .add_payment(
                &doc.id,
                NewPayment::new("cash_usd", usd(11_600)).tendered(usd(12_000)),
            )
            .unwrap();

        // Cashier counted the physical drawer, which does hold the cash
        let closing = fx
            .reconciler
            .close_session(&session.id, vec![usd(31_948)], "alice")
            .unwrap();
        assert_eq!(closing.status, ClosingStatus::PendingApproval);
        assert_eq!(closing.differences[0].status, DifferenceStatus::Surplus);

        // Back office confirms the payment afterwards; repair folds it
        // into the expectation and the surplus disappears.
        fx.settlement
            .confirm_payment(&doc.id, 0, "vault", None, None)
            .unwrap();
        let repaired = fx.reconciler.repair(&closing.id, "auditor").unwrap();
        assert_eq!(repaired.status, ClosingStatus::AutoApproved);
        assert!(!repaired.has_differences);
        assert_eq!(repaired.repaired_by.as_deref(), Some("auditor"));
        assert_eq!(
            repaired.totals.expected(Currency::USD).minor_units(),
            31_948
        );
        // Declared counts never change
        assert_eq!(repaired.differences[0].declared.minor_units(), 31_948);

        // Repair is idempotent on the derived fields
        let again = fx.reconciler.repair(&closing.id, "auditor").unwrap();
        assert_eq!(again.differences[0].difference.minor_units(), 0);
        assert_eq!(again.totals, repaired.totals);
        assert_eq!(again.status, repaired.status);
    }

    #[test]
    fn test_repair_keeps_review_verdict() {
        let fx = setup();
        let (session_id, _) = session_with_sale(&fx);
        let closing = fx
            .reconciler
            .close_session(&session_id, vec![usd(30_000)], "alice")
            .unwrap();
        fx.reconciler.reject(&closing.id, "supervisor").unwrap();

        let repaired = fx.reconciler.repair(&closing.id, "auditor").unwrap();
        assert_eq!(repaired.status, ClosingStatus::Rejected);
    }
}
