use crate::{Capabilities, LedgerConfig, LedgerStore, PurchaseService};
use async_trait::async_trait;
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CapabilityStatus, CiphertextHandle, DecryptionCapability,
    DecryptionRequest, Domain, EncryptedInput, EncryptionCapability, EphemeralKeypair,
    EphemeralPublicKey, GrantPayload, GrantSignature, GrantSigner, ManualClock, TypedValue,
};
use sealed_client::{LocalWallet, SealingClient};
use sealed_kms::{Kms, KmsConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DOMAIN: Domain = Domain::new([0xa1; 32]);
pub const T0: u64 = 1_700_000_000;

pub struct TestEnv {
    pub kms: Arc<Kms>,
    pub client: Arc<SealingClient>,
    pub clock: ManualClock,
    pub alice: LocalWallet,
    pub bob: LocalWallet,
    /// Counts calls that reach the encryption capability.
    pub encrypt_calls: Arc<AtomicUsize>,
    pub service: PurchaseService,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::build(LedgerConfig::new(DOMAIN), |_| {})
    }

    /// Swap out capabilities before the service is wired.
    pub fn with_caps(f: impl FnOnce(&mut Capabilities)) -> Self {
        Self::build(LedgerConfig::new(DOMAIN), f)
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::build(config, |_| {})
    }

    fn build(config: LedgerConfig, f: impl FnOnce(&mut Capabilities)) -> Self {
        let clock = ManualClock::new(T0);
        let kms =
            Arc::new(Kms::from_seed(KmsConfig::default(), [7; 32], Arc::new(clock.clone())));
        let client = Arc::new(SealingClient::new(kms.clone()));
        let encrypt_calls = Arc::new(AtomicUsize::new(0));
        let mut caps = Capabilities {
            encryption: Arc::new(Counting { inner: client.clone(), calls: encrypt_calls.clone() }),
            decryption: client.clone(),
            verifier: kms.clone(),
            clock: Arc::new(clock.clone()),
        };
        f(&mut caps);
        let service = PurchaseService::with_store(config, LedgerStore::in_memory(), caps);
        Self {
            kms,
            client,
            clock,
            alice: LocalWallet::from_seed([1; 32]),
            bob: LocalWallet::from_seed([2; 32]),
            encrypt_calls,
            service,
        }
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Seal three values for `owner` under the ledger domain, bypassing the gateway.
    pub async fn seal(&self, owner: AccountId, values: (u32, u32, u64)) -> EncryptedInput {
        self.client
            .input(DOMAIN, owner)
            .add32(values.0)
            .add32(values.1)
            .add64(values.2)
            .encrypt()
            .await
            .expect("seal")
    }
}

pub struct Counting {
    pub inner: Arc<dyn EncryptionCapability>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EncryptionCapability for Counting {
    fn status(&self) -> CapabilityStatus {
        self.inner.status()
    }

    async fn encrypt(
        &self,
        domain: Domain,
        owner: AccountId,
        inputs: &[TypedValue],
    ) -> Result<EncryptedInput, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(domain, owner, inputs).await
    }
}

/// Capability that never becomes ready.
pub struct Offline(pub CapabilityStatus);

#[async_trait]
impl EncryptionCapability for Offline {
    fn status(&self) -> CapabilityStatus {
        self.0.clone()
    }

    async fn encrypt(
        &self,
        _: Domain,
        _: AccountId,
        _: &[TypedValue],
    ) -> Result<EncryptedInput, CapabilityError> {
        Err(CapabilityError::NotReady)
    }
}

#[async_trait]
impl DecryptionCapability for Offline {
    fn status(&self) -> CapabilityStatus {
        self.0.clone()
    }

    fn generate_keypair(&self) -> EphemeralKeypair {
        EphemeralKeypair::from_parts(EphemeralPublicKey([0; 32]), [0; 32])
    }

    fn create_grant_payload(
        &self,
        _: &EphemeralPublicKey,
        _: &[Domain],
        _: u64,
        _: u64,
    ) -> GrantPayload {
        unreachable!("offline capability never builds grants")
    }

    async fn request_decryption(
        &self,
        _: DecryptionRequest,
    ) -> Result<HashMap<CiphertextHandle, String>, CapabilityError> {
        Err(CapabilityError::NotReady)
    }
}

/// Drops the last handle the real capability returns.
pub struct ShortChanged(pub Arc<dyn EncryptionCapability>);

#[async_trait]
impl EncryptionCapability for ShortChanged {
    fn status(&self) -> CapabilityStatus {
        self.0.status()
    }

    async fn encrypt(
        &self,
        domain: Domain,
        owner: AccountId,
        inputs: &[TypedValue],
    ) -> Result<EncryptedInput, CapabilityError> {
        let mut out = self.0.encrypt(domain, owner, inputs).await?;
        out.handles.pop();
        Ok(out)
    }
}

/// Real grant flow, but every returned plaintext is replaced with `reply`.
pub struct Garbled {
    pub inner: Arc<dyn DecryptionCapability>,
    pub reply: &'static str,
}

#[async_trait]
impl DecryptionCapability for Garbled {
    fn status(&self) -> CapabilityStatus {
        self.inner.status()
    }

    fn generate_keypair(&self) -> EphemeralKeypair {
        self.inner.generate_keypair()
    }

    fn create_grant_payload(
        &self,
        public_key: &EphemeralPublicKey,
        domains: &[Domain],
        start: u64,
        duration: u64,
    ) -> GrantPayload {
        self.inner.create_grant_payload(public_key, domains, start, duration)
    }

    async fn request_decryption(
        &self,
        request: DecryptionRequest,
    ) -> Result<HashMap<CiphertextHandle, String>, CapabilityError> {
        let out = self.inner.request_decryption(request).await?;
        Ok(out.into_keys().map(|h| (h, self.reply.to_string())).collect())
    }
}

/// Signs honestly, then lets `secs` pass before the request goes out.
pub struct SlowSigner {
    pub wallet: LocalWallet,
    pub clock: ManualClock,
    pub secs: u64,
}

#[async_trait]
impl GrantSigner for SlowSigner {
    fn account(&self) -> AccountId {
        self.wallet.account()
    }

    async fn sign_grant(&self, payload: &GrantPayload) -> Result<GrantSignature, CapabilityError> {
        let sig = self.wallet.sign_grant(payload).await?;
        self.clock.advance(self.secs);
        Ok(sig)
    }
}

/// Counts signature requests.
pub struct WatchedSigner {
    pub wallet: LocalWallet,
    pub signed: AtomicUsize,
}

#[async_trait]
impl GrantSigner for WatchedSigner {
    fn account(&self) -> AccountId {
        self.wallet.account()
    }

    async fn sign_grant(&self, payload: &GrantPayload) -> Result<GrantSignature, CapabilityError> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        self.wallet.sign_grant(payload).await
    }
}

/// Wallet that refuses to sign.
pub struct LockedWallet(pub AccountId);

#[async_trait]
impl GrantSigner for LockedWallet {
    fn account(&self) -> AccountId {
        self.0
    }

    async fn sign_grant(&self, _: &GrantPayload) -> Result<GrantSignature, CapabilityError> {
        Err(CapabilityError::SignerUnavailable("wallet locked".into()))
    }
}
