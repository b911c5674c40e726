use crate::{prove_input, ClientError, SealInput};
use async_trait::async_trait;
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CapabilityStatus, CiphertextHandle, DecryptionCapability,
    DecryptionRequest, Domain, EncryptedInput, EncryptionCapability, EphemeralKeypair,
    EphemeralPublicKey, GrantPayload, TypedValue, UserDecryptRequest,
};
use sealed_primitives::{
    open_reencrypted, point_to_bytes, random_scalar, scalar_from_bytes, Relayer,
    RelayerDecryptRequest, G,
};
use std::collections::HashMap;
use std::sync::Arc;

/// SDK facade over a relayer connection.
#[derive(Clone)]
pub struct SealingClient {
    relayer: Arc<dyn Relayer>,
}

impl SealingClient {
    pub fn new(relayer: Arc<dyn Relayer>) -> Self {
        Self { relayer }
    }

    /// Start a sealed input bound to `(domain, owner)`.
    pub fn input(&self, domain: Domain, owner: AccountId) -> InputBuilder<'_> {
        InputBuilder { client: self, domain, owner, values: Vec::new(), seed: None }
    }

    fn network_status(&self) -> CapabilityStatus {
        match self.relayer.network_public_key() {
            Some(_) => CapabilityStatus::Ready,
            None => CapabilityStatus::NotReady,
        }
    }
}

pub struct InputBuilder<'a> {
    client: &'a SealingClient,
    domain: Domain,
    owner: AccountId,
    values: Vec<TypedValue>,
    seed: Option<[u8; 32]>,
}

impl InputBuilder<'_> {
    pub fn add32(mut self, value: u32) -> Self {
        self.values.push(TypedValue::uint32(value));
        self
    }

    pub fn add64(mut self, value: u64) -> Self {
        self.values.push(TypedValue::uint64(value));
        self
    }

    pub fn add(mut self, value: TypedValue) -> Self {
        self.values.push(value);
        self
    }

    /// Fix the sealing randomness. Tests only.
    pub fn with_seed(mut self, seed: [u8; 32]) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Seal, upload the ciphertexts, and hand back handles plus proof.
    pub async fn encrypt(self) -> Result<EncryptedInput, ClientError> {
        let network_pk = self
            .client
            .relayer
            .network_public_key()
            .ok_or(ClientError::NetworkKeyUnavailable)?;
        let out = prove_input(&SealInput {
            domain: self.domain,
            owner: self.owner,
            network_pk,
            values: self.values,
            rng_seed: self.seed.unwrap_or_else(rand::random),
        })?;
        tracing::debug!(
            domain = %self.domain,
            owner = %self.owner,
            handles = out.handles.len(),
            "uploading sealed input"
        );
        self.client.relayer.upload_input(out.bundle).await?;
        Ok(EncryptedInput { handles: out.handles, proof: out.proof })
    }
}

#[async_trait]
impl EncryptionCapability for SealingClient {
    fn status(&self) -> CapabilityStatus {
        self.network_status()
    }

    async fn encrypt(
        &self,
        domain: Domain,
        owner: AccountId,
        inputs: &[TypedValue],
    ) -> Result<EncryptedInput, CapabilityError> {
        let builder = inputs.iter().fold(self.input(domain, owner), |b, v| b.add(*v));
        Ok(builder.encrypt().await?)
    }
}

#[async_trait]
impl DecryptionCapability for SealingClient {
    fn status(&self) -> CapabilityStatus {
        self.network_status()
    }

    fn generate_keypair(&self) -> EphemeralKeypair {
        let secret = random_scalar(&mut rand::rng());
        let public = EphemeralPublicKey(point_to_bytes(&(secret * G)));
        EphemeralKeypair::from_parts(public, secret.to_bytes())
    }

    fn create_grant_payload(
        &self,
        public_key: &EphemeralPublicKey,
        domains: &[Domain],
        start_timestamp: u64,
        duration_secs: u64,
    ) -> GrantPayload {
        GrantPayload {
            domain: self.relayer.signing_domain(),
            message: UserDecryptRequest {
                public_key: *public_key,
                domains: domains.to_vec(),
                start_timestamp,
                duration_secs,
            },
        }
    }

    async fn request_decryption(
        &self,
        request: DecryptionRequest,
    ) -> Result<HashMap<CiphertextHandle, String>, CapabilityError> {
        let DecryptionRequest {
            pairs,
            keypair,
            signature,
            domains,
            requester,
            start_timestamp,
            duration_secs,
        } = request;
        let secret = scalar_from_bytes(keypair.secret_bytes())
            .map_err(|e| CapabilityError::Failed(e.to_string()))?;

        let relayed = RelayerDecryptRequest {
            pairs,
            public_key: *keypair.public(),
            signature,
            domains,
            requester,
            start_timestamp,
            duration_secs,
        };
        let requested: Vec<CiphertextHandle> = relayed.pairs.iter().map(|p| p.handle).collect();
        let replies = self.relayer.user_decrypt(relayed).await?;

        let mut out = HashMap::with_capacity(replies.len());
        for reply in replies {
            if !requested.contains(&reply.handle) {
                tracing::debug!(handle = %reply.handle, "ignoring unrequested re-encryption");
                continue;
            }
            let value = open_reencrypted(&secret, &reply)
                .map_err(|e| CapabilityError::Failed(format!("open {}: {e}", reply.handle)))?;
            out.insert(reply.handle, value.to_string());
        }
        Ok(out)
    }
}
