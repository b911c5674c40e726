use crate::submission::{self, SubmissionError, SubmissionReceipt};
use crate::{
    DecryptedValues, DecryptionAuthorizer, EncryptionGateway, HistoryView, LedgerConfig,
    LedgerStore, PurchaseLedger, Result,
};
use purchase_ledger_primitives::{
    AccountId, CiphertextHandle, DecryptionCapability, EncryptionCapability, GrantSigner,
    InputVerifier, PurchaseInput, RecordAdded, UnixTime,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// External collaborators the ledger is wired to.
#[derive(Clone)]
pub struct Capabilities {
    pub encryption: Arc<dyn EncryptionCapability>,
    pub decryption: Arc<dyn DecryptionCapability>,
    pub verifier: Arc<dyn InputVerifier>,
    pub clock: Arc<dyn UnixTime>,
}

/// Everything an application needs: submit, read, decrypt, watch.
pub struct PurchaseService {
    config: LedgerConfig,
    ledger: PurchaseLedger,
    gateway: EncryptionGateway,
    history: HistoryView,
}

impl PurchaseService {
    /// Validate `config`, open its storage and wire the capabilities.
    pub async fn open(config: LedgerConfig, caps: Capabilities) -> Result<Self> {
        config.validate()?;
        let store = LedgerStore::open(&config.storage).await?;
        Ok(Self::with_store(config, store, caps))
    }

    pub fn with_store(config: LedgerConfig, store: LedgerStore, caps: Capabilities) -> Self {
        let authorizer = Arc::new(DecryptionAuthorizer::new(
            caps.decryption,
            store.clone(),
            caps.clock.clone(),
            config.domain,
            config.grant_duration_secs,
        ));
        let ledger = PurchaseLedger::new(
            config.domain,
            store.clone(),
            caps.verifier,
            caps.clock,
            config.notification_capacity,
        );
        tracing::info!(
            domain = %config.domain,
            grant_duration_secs = config.grant_duration_secs,
            "purchase ledger ready"
        );
        Self {
            ledger,
            gateway: EncryptionGateway::new(caps.encryption),
            history: HistoryView::new(store, authorizer),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PurchaseLedger {
        &self.ledger
    }

    pub fn gateway(&self) -> &EncryptionGateway {
        &self.gateway
    }

    pub fn history(&self) -> &HistoryView {
        &self.history
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordAdded> {
        self.ledger.subscribe()
    }

    pub async fn submit(
        &self,
        owner: Option<AccountId>,
        input: PurchaseInput,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        submission::submit(&self.gateway, &self.ledger, owner, input).await
    }

    pub async fn decrypt(
        &self,
        handles: &[CiphertextHandle],
        signer: Option<&dyn GrantSigner>,
    ) -> Result<DecryptedValues> {
        self.history.authorizer().decrypt(handles, signer).await
    }
}
