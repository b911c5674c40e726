//! Storage backends for the per-owner purchase lists.
//!
//! Both backends keep the same in-memory [`LedgerIndex`]; the file backend
//! additionally persists every accepted record to an append-only log.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::{LedgerError, Result};
use async_trait::async_trait;
use purchase_ledger_primitives::{AccountId, CiphertextHandle, PurchaseField, PurchaseRecord};
use std::collections::HashMap;

/// Where a stored handle lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandleLocation {
    pub owner: AccountId,
    pub index: u64,
    pub field: PurchaseField,
}

#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Store `record` at the owner's next free index and return that index.
    ///
    /// All-or-nothing: on error no record is visible and the owner's count is
    /// unchanged. Dropping the future never splits a record between memory
    /// and storage; a write already under way completes, so a cancelled
    /// caller may still find its record stored.
    async fn append(&self, owner: AccountId, record: PurchaseRecord) -> Result<u64>;

    fn count(&self, owner: &AccountId) -> u64;

    fn record(&self, owner: &AccountId, index: u64) -> Option<PurchaseRecord>;

    fn records(&self, owner: &AccountId) -> Vec<PurchaseRecord>;

    fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation>;
}

#[derive(Default)]
pub(crate) struct LedgerIndex {
    owners: HashMap<AccountId, Vec<PurchaseRecord>>,
    handles: HashMap<CiphertextHandle, HandleLocation>,
}

impl LedgerIndex {
    /// Rejects a record that shares a handle with a stored one, or with itself.
    pub(crate) fn check_unaliased(&self, record: &PurchaseRecord) -> Result<()> {
        let handles = record.handles.as_array();
        for (i, h) in handles.iter().enumerate() {
            if self.handles.contains_key(h) || handles[..i].contains(h) {
                return Err(LedgerError::HandleAliased(*h));
            }
        }
        Ok(())
    }

    pub(crate) fn next_index(&self, owner: &AccountId) -> u64 {
        self.count(owner)
    }

    /// Caller must have run `check_unaliased` under the same lock.
    pub(crate) fn insert(&mut self, owner: AccountId, record: PurchaseRecord) -> u64 {
        let list = self.owners.entry(owner).or_default();
        let index = list.len() as u64;
        for field in PurchaseField::ALL {
            self.handles.insert(record.handle(field), HandleLocation { owner, index, field });
        }
        list.push(record);
        index
    }

    pub(crate) fn count(&self, owner: &AccountId) -> u64 {
        self.owners.get(owner).map_or(0, |l| l.len() as u64)
    }

    pub(crate) fn record(&self, owner: &AccountId, index: u64) -> Option<PurchaseRecord> {
        let index = usize::try_from(index).ok()?;
        self.owners.get(owner)?.get(index).copied()
    }

    pub(crate) fn records(&self, owner: &AccountId) -> Vec<PurchaseRecord> {
        self.owners.get(owner).cloned().unwrap_or_default()
    }

    pub(crate) fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation> {
        self.handles.get(handle).copied()
    }
}
