use super::{HandleLocation, LedgerBackend, LedgerIndex};
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use purchase_ledger_primitives::{AccountId, CiphertextHandle, PurchaseRecord};

/// Process-local store. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryBackend {
    index: RwLock<LedgerIndex>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn append(&self, owner: AccountId, record: PurchaseRecord) -> Result<u64> {
        let mut index = self.index.write();
        index.check_unaliased(&record)?;
        Ok(index.insert(owner, record))
    }

    fn count(&self, owner: &AccountId) -> u64 {
        self.index.read().count(owner)
    }

    fn record(&self, owner: &AccountId, index: u64) -> Option<PurchaseRecord> {
        self.index.read().record(owner, index)
    }

    fn records(&self, owner: &AccountId) -> Vec<PurchaseRecord> {
        self.index.read().records(owner)
    }

    fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation> {
        self.index.read().locate(handle)
    }
}
