//! # Ledger Store
//!
//! In-memory store shared by the settlement and session services.
//!
//! ## Thread Safety
//! All entities live behind one `Mutex`, so every operation that reads
//! a document and writes it back happens under a single lock
//! acquisition. That is what makes confirm-payment and close-session
//! conflicts deterministic: two racing closes serialize on the lock and
//! the second one observes the state the first one left behind.

use std::collections::HashMap;
use std::sync::Mutex;

use till_core::document::PaymentMethodCatalog;
use till_core::session::{CashSession, ClosingRecord};
use till_core::settlement::{SettlementAccount, SettlementDocument};

use crate::error::{LedgerError, LedgerResult};

/// Everything the ledger persists, keyed by id.
#[derive(Debug, Default)]
pub struct LedgerState {
    pub documents: HashMap<String, SettlementDocument>,
    pub accounts: HashMap<String, SettlementAccount>,
    pub sessions: HashMap<String, CashSession>,
    pub closings: HashMap<String, ClosingRecord>,
}

impl LedgerState {
    pub fn document(&self, id: &str) -> LedgerResult<&SettlementDocument> {
        self.documents
            .get(id)
            .ok_or_else(|| LedgerError::DocumentNotFound { id: id.to_string() })
    }

    pub fn document_mut(&mut self, id: &str) -> LedgerResult<&mut SettlementDocument> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| LedgerError::DocumentNotFound { id: id.to_string() })
    }

    pub fn account(&self, id: &str) -> LedgerResult<&SettlementAccount> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::AccountNotFound { id: id.to_string() })
    }

    pub fn session(&self, id: &str) -> LedgerResult<&CashSession> {
        self.sessions
            .get(id)
            .ok_or_else(|| LedgerError::SessionNotFound { id: id.to_string() })
    }

    pub fn session_mut(&mut self, id: &str) -> LedgerResult<&mut CashSession> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| LedgerError::SessionNotFound { id: id.to_string() })
    }

    pub fn closing(&self, id: &str) -> LedgerResult<&ClosingRecord> {
        self.closings
            .get(id)
            .ok_or_else(|| LedgerError::ClosingNotFound { id: id.to_string() })
    }

    pub fn closing_mut(&mut self, id: &str) -> LedgerResult<&mut ClosingRecord> {
        self.closings
            .get_mut(id)
            .ok_or_else(|| LedgerError::ClosingNotFound { id: id.to_string() })
    }

    /// The open session on a register, if any.
    pub fn open_session_on(&self, register: &str) -> Option<&CashSession> {
        self.sessions
            .values()
            .find(|s| s.register == register && s.is_open())
    }

    /// Confirmed payments recorded against a session, across all
    /// documents, in a deterministic order (document id, then payment
    /// index).
    pub fn confirmed_payments_for_session(
        &self,
        session_id: &str,
    ) -> Vec<till_core::settlement::PaymentRecord> {
        let mut doc_ids: Vec<&String> = self
            .documents
            .values()
            .filter(|d| d.cash_session_id.as_deref() == Some(session_id))
            .map(|d| &d.id)
            .collect();
        doc_ids.sort();

        let mut payments = Vec::new();
        for id in doc_ids {
            if let Some(doc) = self.documents.get(id) {
                payments.extend(doc.payments.iter().filter(|p| p.is_confirmed()).cloned());
            }
        }
        payments
    }
}

/// Shared store handed to each service.
#[derive(Debug)]
pub struct LedgerStore {
    state: Mutex<LedgerState>,
    catalog: PaymentMethodCatalog,
}

impl LedgerStore {
    pub fn new(catalog: PaymentMethodCatalog) -> Self {
        LedgerStore {
            state: Mutex::new(LedgerState::default()),
            catalog,
        }
    }

    /// Store preloaded with the built-in payment method catalog.
    pub fn with_builtins() -> Self {
        Self::new(PaymentMethodCatalog::with_builtins())
    }

    pub fn catalog(&self) -> &PaymentMethodCatalog {
        &self.catalog
    }

    /// Executes a function with read access to the ledger state.
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&LedgerState) -> R,
    {
        let state = self.state.lock().expect("Ledger mutex poisoned");
        f(&state)
    }

    /// Executes a function with write access to the ledger state.
    pub fn with_state_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut LedgerState) -> R,
    {
        let mut state = self.state.lock().expect("Ledger mutex poisoned");
        f(&mut state)
    }

    /// Registers a settlement account, replacing any previous account
    /// with the same id.
    pub fn register_account(&self, account: SettlementAccount) {
        self.with_state_mut(|state| {
            state.accounts.insert(account.id.clone(), account);
        });
    }

    /// Snapshot of a document by id.
    pub fn document(&self, id: &str) -> LedgerResult<SettlementDocument> {
        self.with_state(|state| state.document(id).cloned())
    }

    /// Snapshot of a session by id.
    pub fn session(&self, id: &str) -> LedgerResult<CashSession> {
        self.with_state(|state| state.session(id).cloned())
    }

    /// Snapshot of a closing record by id.
    pub fn closing(&self, id: &str) -> LedgerResult<ClosingRecord> {
        self.with_state(|state| state.closing(id).cloned())
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::with_builtins()
    }
}
