//! # sealed-kms: reference key-management service
//!
//! Holds the network key, stores uploaded ciphertexts, verifies input
//! proofs, keeps the ACL and answers user-decrypt requests by re-encrypting
//! plaintexts to the requester's ephemeral key.
//!
//! ## Input lifecycle
//! ```text
//! upload_input  -> Pending
//! verify_input  -> Verified, ACL[handle] = (owner, domain)
//! ```
//! A handle is verified at most once; a second proof over the same handle is
//! rejected. Each owner may hold at most `max_pending_inputs_per_owner`
//! unverified inputs; further uploads are refused until some are verified.
//!
//! ## User-decrypt checks (in order)
//! 1. grant duration within `(0, max_grant_duration_secs]`
//! 2. ed25519 signature of `requester` over the typed grant digest
//! 3. `start <= now` (else denied) and `now < start + duration` (else expired)
//! 4. every pair's domain is listed in the grant and `ACL[handle] == (requester, domain)`
//!
//! Every failure other than expiry surfaces as an opaque `Denied`.

mod config;
mod verify;


pub use config::{
    KmsConfig, DEFAULT_MAX_GRANT_DURATION_SECS, DEFAULT_MAX_INPUTS_PER_PROOF,
    DEFAULT_MAX_PENDING_INPUTS_PER_OWNER,
};
pub use verify::check_input_proof;

use async_trait::async_trait;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use ed25519_dalek::{Signature, VerifyingKey};
use parking_lot::RwLock;
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CiphertextHandle, Domain, InputVerifier, SigningDomain, UnixTime,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sealed_primitives::{
    derive_handle, handle_is_well_formed, open_value, point_from_bytes, point_to_bytes,
    random_scalar, reencrypt, InputBundle, Reencrypted, Relayer, RelayerDecryptRequest,
    SealContext, SealError, SealedCiphertext, G,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum KmsError {
    #[error("malformed bundle: {0}")]
    MalformedBundle(&'static str),
    #[error("handle {0} already uploaded")]
    DuplicateHandle(CiphertextHandle),
    #[error("{0} has too many unverified inputs")]
    PendingLimit(AccountId),
    #[error("unknown handle {0}")]
    UnknownHandle(CiphertextHandle),
    #[error("handle {0} already verified")]
    AlreadyVerified(CiphertextHandle),
    #[error("handle {0} not bound to this domain, owner and position")]
    BindingMismatch(CiphertextHandle),
    #[error("input proof verification failed")]
    ProofInvalid,
    #[error(transparent)]
    Seal(#[from] SealError),
    #[error("grant duration {0}s outside policy")]
    DurationOutOfPolicy(u64),
    #[error("grant signature invalid")]
    BadSignature,
    #[error("grant not yet valid")]
    NotYetValid,
    #[error("grant expired")]
    Expired,
    #[error("domain {0} not covered by grant")]
    DomainNotGranted(Domain),
    #[error("requester not entitled to {0}")]
    NotEntitled(CiphertextHandle),
    #[error("ephemeral public key invalid")]
    BadPublicKey,
    #[error("internal: {0}")]
    Internal(String),
    #[error("invalid config: {0}")]
    Config(String),
}

impl From<KmsError> for CapabilityError {
    fn from(e: KmsError) -> Self {
        match e {
            KmsError::Expired => CapabilityError::Expired,
            KmsError::DurationOutOfPolicy(_)
            | KmsError::BadSignature
            | KmsError::NotYetValid
            | KmsError::DomainNotGranted(_)
            | KmsError::NotEntitled(_)
            | KmsError::BadPublicKey => CapabilityError::Denied,
            KmsError::UnknownHandle(_)
            | KmsError::AlreadyVerified(_)
            | KmsError::BindingMismatch(_)
            | KmsError::ProofInvalid
            | KmsError::Seal(_) => CapabilityError::ProofRejected,
            other => CapabilityError::Failed(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputState {
    Pending,
    Verified,
}

struct StoredInput {
    domain: Domain,
    owner: AccountId,
    index: u8,
    ciphertext: SealedCiphertext,
    state: InputState,
}

impl StoredInput {
    fn context(&self, handle: &CiphertextHandle) -> SealContext {
        SealContext {
            domain: self.domain,
            owner: self.owner,
            index: self.index,
            value_type: handle.value_type(),
        }
    }
}

#[derive(Default)]
struct KmsState {
    inputs: HashMap<CiphertextHandle, StoredInput>,
    acl: HashMap<CiphertextHandle, (AccountId, Domain)>,
    /// Unverified inputs per owner.
    pending: HashMap<AccountId, usize>,
}

pub struct Kms {
    config: KmsConfig,
    network_sk: Scalar,
    network_pk: RistrettoPoint,
    state: RwLock<KmsState>,
    clock: Arc<dyn UnixTime>,
}

impl Kms {
    /// Deterministic network key. Tests and benches.
    pub fn from_seed(config: KmsConfig, seed: [u8; 32], clock: Arc<dyn UnixTime>) -> Self {
        let sk = random_scalar(&mut ChaCha20Rng::from_seed(seed));
        Self::with_key(config, sk, clock)
    }

    pub fn random(config: KmsConfig, clock: Arc<dyn UnixTime>) -> Self {
        Self::with_key(config, random_scalar(&mut rand::rng()), clock)
    }

    fn with_key(config: KmsConfig, network_sk: Scalar, clock: Arc<dyn UnixTime>) -> Self {
        Self {
            config,
            network_pk: network_sk * G,
            network_sk,
            state: RwLock::new(KmsState::default()),
            clock,
        }
    }

    pub fn config(&self) -> &KmsConfig {
        &self.config
    }

    /// Inputs `owner` has uploaded that no proof has verified yet.
    pub fn pending_inputs(&self, owner: &AccountId) -> usize {
        self.state.read().pending.get(owner).copied().unwrap_or(0)
    }

    /// `(owner, domain)` entitled to decrypt `handle`, once verified.
    pub fn entitlement(&self, handle: &CiphertextHandle) -> Option<(AccountId, Domain)> {
        self.state.read().acl.get(handle).copied()
    }

    fn store_bundle(&self, bundle: InputBundle) -> Result<(), KmsError> {
        if bundle.entries.is_empty() {
            return Err(KmsError::MalformedBundle("no entries"));
        }
        if bundle.entries.len() > self.config.max_inputs_per_proof {
            return Err(KmsError::MalformedBundle("too many entries"));
        }
        for (i, entry) in bundle.entries.iter().enumerate() {
            if entry.index as usize != i {
                return Err(KmsError::MalformedBundle("entry out of position"));
            }
            if !handle_is_well_formed(&entry.handle) {
                return Err(KmsError::MalformedBundle("handle type tag or version"));
            }
            let ctx = SealContext {
                domain: bundle.domain,
                owner: bundle.owner,
                index: entry.index,
                value_type: entry.handle.value_type(),
            };
            if derive_handle(&ctx, &entry.ciphertext) != entry.handle {
                return Err(KmsError::BindingMismatch(entry.handle));
            }
        }

        let mut state = self.state.write();
        if let Some(dup) = bundle.entries.iter().find(|e| state.inputs.contains_key(&e.handle)) {
            return Err(KmsError::DuplicateHandle(dup.handle));
        }
        let pending = state.pending.get(&bundle.owner).copied().unwrap_or(0);
        if pending + bundle.entries.len() > self.config.max_pending_inputs_per_owner {
            return Err(KmsError::PendingLimit(bundle.owner));
        }
        *state.pending.entry(bundle.owner).or_default() += bundle.entries.len();
        for entry in bundle.entries {
            state.inputs.insert(
                entry.handle,
                StoredInput {
                    domain: bundle.domain,
                    owner: bundle.owner,
                    index: entry.index,
                    ciphertext: entry.ciphertext,
                    state: InputState::Pending,
                },
            );
        }
        Ok(())
    }

    fn verify_and_grant(
        &self,
        domain: Domain,
        owner: AccountId,
        handles: &[CiphertextHandle],
        proof: &[u8],
    ) -> Result<(), KmsError> {
        if handles.is_empty() || handles.len() > self.config.max_inputs_per_proof {
            return Err(KmsError::ProofInvalid);
        }

        // Held across check and grant so a handle cannot be verified twice.
        let mut state = self.state.write();
        let mut entries = Vec::with_capacity(handles.len());
        for (i, handle) in handles.iter().enumerate() {
            let stored = state.inputs.get(handle).ok_or(KmsError::UnknownHandle(*handle))?;
            if stored.state == InputState::Verified {
                return Err(KmsError::AlreadyVerified(*handle));
            }
            if stored.domain != domain || stored.owner != owner || stored.index as usize != i {
                return Err(KmsError::BindingMismatch(*handle));
            }
            entries.push((*handle, point_from_bytes(&stored.ciphertext.ephemeral)?));
        }
        check_input_proof(&domain, &owner, &entries, proof)?;

        for handle in handles {
            if let Some(stored) = state.inputs.get_mut(handle) {
                stored.state = InputState::Verified;
            }
            state.acl.insert(*handle, (owner, domain));
        }
        if let Some(pending) = state.pending.get_mut(&owner) {
            *pending = pending.saturating_sub(handles.len());
        }
        Ok(())
    }

    fn authorize_and_reencrypt(
        &self,
        request: &RelayerDecryptRequest,
    ) -> Result<Vec<Reencrypted>, KmsError> {
        if request.pairs.is_empty() {
            return Err(KmsError::MalformedBundle("no handles requested"));
        }
        if request.duration_secs == 0 || request.duration_secs > self.config.max_grant_duration_secs
        {
            return Err(KmsError::DurationOutOfPolicy(request.duration_secs));
        }

        let vk = VerifyingKey::from_bytes(request.requester.as_bytes())
            .map_err(|_| KmsError::BadSignature)?;
        let digest = request.grant_payload(self.config.signing_domain.clone()).signing_digest();
        vk.verify_strict(&digest, &Signature::from_bytes(&request.signature.0))
            .map_err(|_| KmsError::BadSignature)?;

        let now = self.clock.now();
        if now < request.start_timestamp {
            return Err(KmsError::NotYetValid);
        }
        if now >= request.start_timestamp.saturating_add(request.duration_secs) {
            return Err(KmsError::Expired);
        }

        let state = self.state.read();
        for pair in &request.pairs {
            if !request.domains.contains(&pair.domain) {
                return Err(KmsError::DomainNotGranted(pair.domain));
            }
            if state.acl.get(&pair.handle) != Some(&(request.requester, pair.domain)) {
                return Err(KmsError::NotEntitled(pair.handle));
            }
        }

        let target =
            point_from_bytes(&request.public_key.0).map_err(|_| KmsError::BadPublicKey)?;
        let mut rng = rand::rng();
        request
            .pairs
            .iter()
            .map(|pair| -> Result<Reencrypted, KmsError> {
                let stored = state.inputs.get(&pair.handle).ok_or_else(|| {
                    KmsError::Internal(format!("ACL entry without input {}", pair.handle))
                })?;
                let ctx = stored.context(&pair.handle);
                let value = open_value(&self.network_sk, &ctx, &stored.ciphertext)
                    .map_err(|e| KmsError::Internal(format!("open {}: {e}", pair.handle)))?;
                Ok(reencrypt(&target, pair.handle, value, &random_scalar(&mut rng))?)
            })
            .collect()
    }
}

impl Drop for Kms {
    fn drop(&mut self) {
        self.network_sk.zeroize();
    }
}

#[async_trait]
impl InputVerifier for Kms {
    async fn verify_input(
        &self,
        domain: Domain,
        owner: AccountId,
        handles: &[CiphertextHandle],
        proof: &[u8],
    ) -> Result<(), CapabilityError> {
        match self.verify_and_grant(domain, owner, handles, proof) {
            Ok(()) => {
                tracing::debug!(%domain, %owner, handles = handles.len(), "input verified");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%domain, %owner, error = %e, "input proof rejected");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Relayer for Kms {
    fn network_public_key(&self) -> Option<[u8; 32]> {
        Some(point_to_bytes(&self.network_pk))
    }

    fn signing_domain(&self) -> SigningDomain {
        self.config.signing_domain.clone()
    }

    async fn upload_input(&self, bundle: InputBundle) -> Result<(), CapabilityError> {
        let (domain, owner, n) = (bundle.domain, bundle.owner, bundle.entries.len());
        self.store_bundle(bundle).map_err(|e| {
            tracing::warn!(%domain, %owner, error = %e, "input upload refused");
            CapabilityError::Failed(e.to_string())
        })?;
        tracing::debug!(%domain, %owner, handles = n, "input uploaded");
        Ok(())
    }

    async fn user_decrypt(
        &self,
        request: RelayerDecryptRequest,
    ) -> Result<Vec<Reencrypted>, CapabilityError> {
        match self.authorize_and_reencrypt(&request) {
            Ok(out) => {
                tracing::info!(
                    requester = %request.requester,
                    handles = out.len(),
                    "user decrypt served"
                );
                Ok(out)
            }
            Err(e) => {
                tracing::warn!(requester = %request.requester, reason = %e, "user decrypt refused");
                Err(e.into())
            }
        }
    }
}
