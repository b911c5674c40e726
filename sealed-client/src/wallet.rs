use async_trait::async_trait;
use core::fmt;
use ed25519_dalek::{Signer, SigningKey};
use purchase_ledger_primitives::{
    AccountId, CapabilityError, GrantPayload, GrantSignature, GrantSigner,
};

/// In-process ed25519 identity. The account id is the verifying key.
pub struct LocalWallet {
    key: SigningKey,
}

impl LocalWallet {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { key: SigningKey::from_bytes(&seed) }
    }

    pub fn random() -> Self {
        Self::from_seed(rand::random())
    }

    pub fn account(&self) -> AccountId {
        AccountId::new(self.key.verifying_key().to_bytes())
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet").field("account", &self.account()).finish()
    }
}

#[async_trait]
impl GrantSigner for LocalWallet {
    fn account(&self) -> AccountId {
        LocalWallet::account(self)
    }

    async fn sign_grant(&self, payload: &GrantPayload) -> Result<GrantSignature, CapabilityError> {
        let digest = payload.signing_digest();
        Ok(GrantSignature(self.key.sign(&digest).to_bytes()))
    }
}
