//! # Cash Session Ledger
//!
//! Opens sessions, records drawer movements and answers the expected
//! cash question. One register holds at most one open session; opening
//! a second conflicts with the first by id, so the caller can show who
//! left the drawer open.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use till_core::money::CurrencyAmount;
use till_core::session::{
    session_totals, CashMovement, CashSession, MovementKind, SessionState, SessionTotals,
};
use till_core::validation::{validate_identifier, validate_payment_amount, validate_reason};

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Stateful cash session operations over the ledger store.
pub struct CashSessionLedger {
    store: Arc<LedgerStore>,
}

impl CashSessionLedger {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        CashSessionLedger { store }
    }

    /// Opens a session on a register with the given opening floats.
    ///
    /// ## Conflicts
    /// A register with an open session rejects the open and names the
    /// session already holding the drawer.
    pub fn open_session(
        &self,
        register: &str,
        cashier: &str,
        opening_floats: Vec<CurrencyAmount>,
    ) -> LedgerResult<CashSession> {
        validate_identifier("register", register)?;
        validate_identifier("cashier", cashier)?;
        for float in &opening_floats {
            if float.is_negative() {
                return Err(till_core::ValidationError::MustNotBeNegative {
                    field: "opening float".to_string(),
                }
                .into());
            }
        }

        self.store.with_state_mut(|state| {
            if let Some(open) = state.open_session_on(register) {
                return Err(LedgerError::RegisterInUse {
                    register: register.to_string(),
                    session_id: open.id.clone(),
                });
            }

            let session = CashSession {
                id: Uuid::new_v4().to_string(),
                register: register.to_string(),
                cashier: cashier.to_string(),
                opened_at: Utc::now(),
                opening_floats,
                movements: Vec::new(),
                state: SessionState::Open,
                closed_at: None,
                closing_id: None,
                version: 1,
            };
            info!(
                session_id = %session.id,
                register = register,
                cashier = cashier,
                "Cash session opened"
            );
            state.sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    /// Records a manual drawer movement against an open session.
    pub fn record_movement(
        &self,
        session_id: &str,
        kind: MovementKind,
        amount: CurrencyAmount,
        reason: &str,
        reference: Option<String>,
    ) -> LedgerResult<CashSession> {
        validate_payment_amount(amount)?;
        validate_reason(reason)?;

        self.store.with_state_mut(|state| {
            let session = state.session_mut(session_id)?;
            if !session.is_open() {
                return Err(LedgerError::SessionNotOpen {
                    id: session_id.to_string(),
                });
            }

            session.movements.push(CashMovement {
                kind,
                amount,
                reason: reason.trim().to_string(),
                reference,
                at: Utc::now(),
            });
            session.version += 1;

            debug!(
                session_id = %session_id,
                kind = ?kind,
                amount = %amount,
                "Drawer movement recorded"
            );
            Ok(session.clone())
        })
    }

    /// Per-currency totals for a session, computed from the session and
    /// its confirmed payments under one lock, so the snapshot is
    /// internally consistent.
    pub fn expected_cash(&self, session_id: &str) -> LedgerResult<SessionTotals> {
        self.store.with_state(|state| {
            let session = state.session(session_id)?;
            let payments = state.confirmed_payments_for_session(session_id);
            Ok(session_totals(session, &payments, self.store.catalog()))
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
