use crate::backend::HandleLocation;
use crate::{LedgerError, LedgerStore, Result};
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CiphertextHandle, Domain, InputVerifier, PurchaseRecord,
    RecordAdded, RecordHandles, UnixTime, MAX_INPUT_PROOF_LEN,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Write surface of the ledger: only proof-carrying records get in.
pub struct PurchaseLedger {
    domain: Domain,
    store: LedgerStore,
    verifier: Arc<dyn InputVerifier>,
    clock: Arc<dyn UnixTime>,
    events: broadcast::Sender<RecordAdded>,
}

impl PurchaseLedger {
    pub fn new(
        domain: Domain,
        store: LedgerStore,
        verifier: Arc<dyn InputVerifier>,
        clock: Arc<dyn UnixTime>,
        notification_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(notification_capacity.max(1));
        Self { domain, store, verifier, clock, events }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Receive one `RecordAdded` per accepted record. Lagging receivers
    /// should reload the owner's list.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordAdded> {
        self.events.subscribe()
    }

    /// Verify `proof` against `(domain, owner, handles)`, then append with
    /// the current wall-clock time.
    pub async fn append_verified(
        &self,
        owner: AccountId,
        handles: RecordHandles,
        proof: &[u8],
    ) -> Result<RecordAdded> {
        if proof.is_empty() || proof.len() > MAX_INPUT_PROOF_LEN {
            return Err(LedgerError::ProofInvalid);
        }
        let ordered = handles.as_array();
        if let Some(stored) = ordered.iter().find(|h| self.store.locate(h).is_some()) {
            return Err(LedgerError::HandleAliased(*stored));
        }

        self.verifier
            .verify_input(self.domain, owner, &ordered, proof)
            .await
            .map_err(|e| match e {
                CapabilityError::ProofRejected | CapabilityError::UnknownHandle(_) => {
                    LedgerError::ProofInvalid
                }
                other => LedgerError::Verifier(other.to_string()),
            })?;

        let timestamp = self.clock.now();
        let index = self.store.append(owner, PurchaseRecord { handles, timestamp }).await?;
        let event = RecordAdded { owner, index, timestamp };
        tracing::info!(%owner, index, timestamp, "purchase record accepted");
        // No subscribers is fine.
        let _ = self.events.send(event);
        Ok(event)
    }

    pub fn count(&self, owner: &AccountId) -> u64 {
        self.store.count(owner)
    }

    pub fn record(&self, owner: &AccountId, index: u64) -> Result<PurchaseRecord> {
        self.store.get(owner, index)
    }

    pub fn records(&self, owner: &AccountId) -> Vec<PurchaseRecord> {
        self.store.get_all(owner)
    }

    pub fn latest(&self, owner: &AccountId) -> Result<(u64, PurchaseRecord)> {
        self.store.get_latest(owner)
    }

    pub fn has_any(&self, owner: &AccountId) -> bool {
        self.store.has_any(owner)
    }

    pub fn locate(&self, handle: &CiphertextHandle) -> Option<HandleLocation> {
        self.store.locate(handle)
    }
}
