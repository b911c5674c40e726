use crate::backend::{FileBackend, HandleLocation, LedgerBackend, MemoryBackend};
use crate::{LedgerError, Result, StorageConfig};
use purchase_ledger_primitives::{AccountId, CiphertextHandle, PurchaseRecord};
use std::sync::Arc;

/// Per-owner append-only purchase lists.
///
/// Indices are dense and zero-based; a record is never changed or removed
/// once appended. Unknown owners read as empty.
#[derive(Clone)]
pub struct LedgerStore {
    backend: Arc<dyn LedgerBackend>,
}

impl LedgerStore {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub async fn open(storage: &StorageConfig) -> Result<Self> {
        Ok(match storage {
            StorageConfig::Memory => Self::in_memory(),
            StorageConfig::File { path } => Self::new(Arc::new(FileBackend::open(path).await?)),
        })
    }

    pub async fn append(&self, owner: AccountId, record: PurchaseRecord) -> Result<u64> {
        self.backend.append(owner, record).await
    }

    pub fn get(&self, owner: &AccountId, index: u64) -> Result<PurchaseRecord> {
        self.backend.record(owner, index).ok_or_else(|| LedgerError::IndexOutOfRange {
            owner: *owner,
            index,
            count: self.backend.count(owner),
        })
    }

    pub fn get_all(&self, owner: &AccountId) -> Vec<PurchaseRecord> {
        self.backend.records(owner)
    }

    /// Newest record and its index.
    pub fn get_latest(&self, owner: &AccountId) -> Result<(u64, PurchaseRecord)> {
        match self.backend.count(owner) {
            0 => Err(LedgerError::EmptyLedger(*owner)),
            n => Ok((n - 1, self.get(owner, n - 1)?)),
        }
    }

    pub fn count(&self, owner: &AccountId) -> u64 {
        self.backend.count(owner)
    }

    pub fn has_any(&self, owner: &AccountId) -> bool {
        self.count(owner) > 0
    }

    pub fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation> {
        self.backend.locate(handle)
    }
}
