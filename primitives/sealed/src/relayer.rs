use crate::{Reencrypted, SealedCiphertext};
use async_trait::async_trait;
use parity_scale_codec::{Decode, Encode};
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CiphertextHandle, Domain, EphemeralPublicKey, GrantPayload,
    GrantSignature, HandleDomainPair, SigningDomain, UserDecryptRequest,
};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BundleEntry {
    pub handle: CiphertextHandle,
    pub index: u8,
    pub ciphertext: SealedCiphertext,
}

/// Ciphertexts of one sealed input, uploaded before the proof is verified.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct InputBundle {
    pub domain: Domain,
    pub owner: AccountId,
    pub entries: Vec<BundleEntry>,
}

/// A signed user-decrypt request as it travels to the KMS. Carries only the
/// public half of the ephemeral keypair.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RelayerDecryptRequest {
    pub pairs: Vec<HandleDomainPair>,
    pub public_key: EphemeralPublicKey,
    pub signature: GrantSignature,
    pub domains: Vec<Domain>,
    pub requester: AccountId,
    pub start_timestamp: u64,
    pub duration_secs: u64,
}

impl RelayerDecryptRequest {
    /// The payload the requester must have signed.
    pub fn grant_payload(&self, domain: SigningDomain) -> GrantPayload {
        GrantPayload {
            domain,
            message: UserDecryptRequest {
                public_key: self.public_key,
                domains: self.domains.clone(),
                start_timestamp: self.start_timestamp,
                duration_secs: self.duration_secs,
            },
        }
    }
}

/// Transport between a client SDK and the key-management service.
#[async_trait]
pub trait Relayer: Send + Sync {
    /// `None` until the network key is published.
    fn network_public_key(&self) -> Option<[u8; 32]>;

    fn signing_domain(&self) -> SigningDomain;

    async fn upload_input(&self, bundle: InputBundle) -> Result<(), CapabilityError>;

    async fn user_decrypt(
        &self,
        request: RelayerDecryptRequest,
    ) -> Result<Vec<Reencrypted>, CapabilityError>;
}
