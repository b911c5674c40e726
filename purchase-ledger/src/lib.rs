//! # purchase-ledger: confidential purchase records
//!
//! Owners submit purchases whose numeric fields (item id, quantity, unit
//! price) are sealed client-side. The ledger stores only opaque ciphertext
//! handles plus a plaintext timestamp, in per-owner append-only lists, and
//! releases plaintext only through a signed, time-boxed decryption grant.
//!
//! ## Components
//!
//! - [`EncryptionGateway`] - validates plaintext fields and seals them
//! - [`LedgerStore`] / [`PurchaseLedger`] - per-owner lists; writes must carry
//!   a verifying input proof
//! - [`submission::submit`] - `Validating -> Encrypting -> Appending -> Notified`
//! - [`DecryptionAuthorizer`] - one grant session per decrypt call
//! - [`HistoryView`] - list records, reveal a field or a whole record
//! - [`PurchaseService`] - all of the above wired from a [`LedgerConfig`]
//!
//! ## Errors
//!
//! Every [`LedgerError`] maps to one [`ErrorKind`]; nothing is retried
//! internally.

pub mod backend;
mod config;
mod decryption;
mod error;
mod gateway;
mod history;
mod ledger;
mod service;
mod store;
pub mod submission;

#[cfg(test)]
mod mock;
#[cfg(test)]
mod tests;

pub use backend::{FileBackend, HandleLocation, LedgerBackend, MemoryBackend};
pub use config::{
    ConfigError, LedgerConfig, StorageConfig, DEFAULT_GRANT_DURATION_SECS,
    DEFAULT_NOTIFICATION_CAPACITY,
};
pub use decryption::{DecryptedValues, DecryptionAuthorizer};
pub use error::{ErrorKind, LedgerError, Result};
pub use gateway::{EncryptionGateway, SealedPurchase};
pub use history::{HistoryEntry, HistoryView, RevealedPurchase};
pub use ledger::PurchaseLedger;
pub use service::{Capabilities, PurchaseService};
pub use store::LedgerStore;
pub use submission::{SubmissionError, SubmissionReceipt, SubmissionState};

pub use purchase_ledger_primitives as primitives;
