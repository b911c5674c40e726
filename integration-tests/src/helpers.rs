//! Wiring for end-to-end tests.

use anyhow::Result;
use purchase_ledger::{Capabilities, LedgerConfig, PurchaseService, StorageConfig};
use purchase_ledger_primitives::{Domain, ManualClock, PurchaseInput};
use sealed_client::{LocalWallet, SealingClient};
use sealed_kms::{Kms, KmsConfig};
use std::path::Path;
use std::sync::Arc;

pub const DOMAIN: Domain = Domain::new([0x5e; 32]);
/// Clock start for every deployment.
pub const GENESIS: u64 = 1_735_689_600;

/// A key management service plus the client that talks to it. Outlives any
/// single [`PurchaseService`], the way the real network outlives an app.
pub struct Deployment {
    pub kms: Arc<Kms>,
    pub client: Arc<SealingClient>,
    pub clock: ManualClock,
}

impl Deployment {
    pub fn new() -> Self {
        let clock = ManualClock::new(GENESIS);
        let kms =
            Arc::new(Kms::from_seed(KmsConfig::default(), [0x42; 32], Arc::new(clock.clone())));
        let client = Arc::new(SealingClient::new(kms.clone()));
        Self { kms, client, clock }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            encryption: self.client.clone(),
            decryption: self.client.clone(),
            verifier: self.kms.clone(),
            clock: Arc::new(self.clock.clone()),
        }
    }

    pub async fn in_memory(&self) -> Result<PurchaseService> {
        Ok(PurchaseService::open(LedgerConfig::new(DOMAIN), self.capabilities()).await?)
    }

    /// Open (or reopen) a service whose records live in `path`.
    pub async fn on_disk(&self, path: &Path) -> Result<PurchaseService> {
        let mut config = LedgerConfig::new(DOMAIN);
        config.storage = StorageConfig::File { path: path.to_path_buf() };
        Ok(PurchaseService::open(config, self.capabilities()).await?)
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Self::new()
    }
}

/// Submit `purchases` for `wallet` one after another and return their indices.
pub async fn submit_all(
    service: &PurchaseService,
    wallet: &LocalWallet,
    purchases: &[PurchaseInput],
) -> Result<Vec<u64>> {
    let mut indices = Vec::with_capacity(purchases.len());
    for input in purchases {
        let receipt = service.submit(Some(wallet.account()), *input).await?;
        indices.push(receipt.index);
    }
    Ok(indices)
}
