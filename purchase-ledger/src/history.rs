use crate::{DecryptionAuthorizer, LedgerError, LedgerStore, Result};
use purchase_ledger_primitives::{AccountId, GrantSigner, PurchaseField, RecordHandles};
use serde::Serialize;
use std::sync::Arc;

/// Public view of one record: handles and timestamp, no plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub index: u64,
    pub handles: RecordHandles,
    pub timestamp: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RevealedPurchase {
    pub index: u64,
    pub timestamp: u64,
    pub item_id: u32,
    pub quantity: u32,
    pub unit_price: u64,
}

/// Read-and-decrypt projection over the store. Holds no state of its own.
#[derive(Clone)]
pub struct HistoryView {
    store: LedgerStore,
    authorizer: Arc<DecryptionAuthorizer>,
}

impl HistoryView {
    pub fn new(store: LedgerStore, authorizer: Arc<DecryptionAuthorizer>) -> Self {
        Self { store, authorizer }
    }

    pub fn authorizer(&self) -> &DecryptionAuthorizer {
        &self.authorizer
    }

    /// Every record of `owner`, oldest first. No authorization needed.
    pub fn list(&self, owner: &AccountId) -> Vec<HistoryEntry> {
        self.store
            .get_all(owner)
            .into_iter()
            .zip(0u64..)
            .map(|(r, index)| HistoryEntry { index, handles: r.handles, timestamp: r.timestamp })
            .collect()
    }

    /// Decrypt one field of one record.
    pub async fn reveal(
        &self,
        owner: &AccountId,
        index: u64,
        field: PurchaseField,
        signer: Option<&dyn GrantSigner>,
    ) -> Result<u64> {
        let handle = self.store.get(owner, index)?.handle(field);
        let values = self.authorizer.decrypt(&[handle], signer).await?;
        values
            .get(&handle)
            .ok_or_else(|| LedgerError::Decryption(format!("{field} missing from result")))
    }

    /// Decrypt all three fields of one record under a single grant.
    pub async fn reveal_record(
        &self,
        owner: &AccountId,
        index: u64,
        signer: Option<&dyn GrantSigner>,
    ) -> Result<RevealedPurchase> {
        let record = self.store.get(owner, index)?;
        let values = self.authorizer.decrypt(&record.handles.as_array(), signer).await?;
        let field = |f: PurchaseField| {
            let h = record.handle(f);
            values
                .get(&h)
                .ok_or_else(|| LedgerError::Decryption(format!("{f} missing from result")))
        };
        let narrow = |f: PurchaseField| -> Result<u32> {
            let v = field(f)?;
            u32::try_from(v).map_err(|_| LedgerError::MalformedPlaintext {
                handle: record.handle(f),
                reason: format!("{v} exceeds 32 bits"),
            })
        };
        Ok(RevealedPurchase {
            index,
            timestamp: record.timestamp,
            item_id: narrow(PurchaseField::ItemId)?,
            quantity: narrow(PurchaseField::Quantity)?,
            unit_price: field(PurchaseField::UnitPrice)?,
        })
    }
}
