//! # till-ledger: Stateful Settlement Ledger
//!
//! The stateful layer over [`till_core`]: an in-memory ledger of
//! documents, payments, settlement accounts, cash sessions and closing
//! records, plus the three services that mutate it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ★ till-ledger (THIS CRATE) ★                         │
//! │                                                                         │
//! │  ┌───────────────────┐ ┌───────────────────┐ ┌─────────────────────┐   │
//! │  │ PaymentSettlement │ │ CashSessionLedger │ │  ClosingReconciler  │   │
//! │  │ create/add/confirm│ │  open / movement  │ │ close/approve/repair│   │
//! │  └─────────┬─────────┘ └─────────┬─────────┘ └──────────┬──────────┘   │
//! │            │                     │                      │              │
//! │  ┌─────────▼─────────────────────▼──────────────────────▼──────────┐   │
//! │  │                    LedgerStore (Mutex<LedgerState>)             │   │
//! │  │        documents • accounts • sessions • closings               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                         till-core (pure math)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! One mutex over the whole state. Every operation reads, decides and
//! writes under a single lock acquisition, which is what makes the
//! conflict guarantees hold: double-confirm, double-close and
//! register-in-use always resolve to exactly one winner.

pub mod error;
pub mod reconcile;
pub mod session;
pub mod settlement;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use reconcile::ClosingReconciler;
pub use session::CashSessionLedger;
pub use settlement::{NewPayment, PaymentSettlement};
pub use store::{LedgerState, LedgerStore};
