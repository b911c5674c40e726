//! Typed, domain-separated decryption-grant payload.
//!
//! Digest layout (all hashes SHA-256, integers as 32-byte big-endian words):
//! ```text
//! domain_separator = H(H(DOMAIN_TYPE) || H(name) || H(version) || chain_id || verifying_contract)
//! struct_hash      = H(H(REQUEST_TYPE) || public_key || H(domains...) || start || duration)
//! digest           = H(0x19 || 0x01 || domain_separator || struct_hash)
//! ```
use crate::Domain;
use core::fmt;
use parity_scale_codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

pub const DOMAIN_TYPE: &[u8] =
    b"SigningDomain(string name,string version,uint64 chainId,bytes32 verifyingContract)";
pub const REQUEST_TYPE: &[u8] = b"UserDecryptRequest(bytes32 publicKey,bytes32[] domains,uint64 startTimestamp,uint64 durationSecs)";

/// Public half of an ephemeral session keypair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, TypeInfo)]
pub struct EphemeralPublicKey(pub [u8; 32]);

impl fmt::Debug for EphemeralPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralPublicKey(0x{})", hex::encode(self.0))
    }
}

/// Session keypair for one decryption grant.
///
/// Not `Clone`, never serialized; the secret is wiped on drop.
pub struct EphemeralKeypair {
    public: EphemeralPublicKey,
    secret: Zeroizing<[u8; 32]>,
}

impl EphemeralKeypair {
    pub fn from_parts(public: EphemeralPublicKey, secret: [u8; 32]) -> Self {
        Self { public, secret: Zeroizing::new(secret) }
    }

    pub fn public(&self) -> &EphemeralPublicKey {
        &self.public
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Owner signature over a grant digest.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct GrantSignature(pub [u8; 64]);

impl fmt::Debug for GrantSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantSignature(0x{})", hex::encode(self.0))
    }
}

/// Separates grant signatures per verifying service and chain.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, Serialize, Deserialize)]
pub struct SigningDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Domain,
}

/// Message half of the grant.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct UserDecryptRequest {
    pub public_key: EphemeralPublicKey,
    pub domains: Vec<Domain>,
    pub start_timestamp: u64,
    pub duration_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct GrantPayload {
    pub domain: SigningDomain,
    pub message: UserDecryptRequest,
}

fn word(v: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&v.to_be_bytes());
    out
}

fn h(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

impl SigningDomain {
    pub fn separator(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(h(DOMAIN_TYPE));
        hasher.update(h(self.name.as_bytes()));
        hasher.update(h(self.version.as_bytes()));
        hasher.update(word(self.chain_id));
        hasher.update(self.verifying_contract.as_bytes());
        hasher.finalize().into()
    }
}

impl UserDecryptRequest {
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut domains = Sha256::new();
        for d in &self.domains {
            domains.update(d.as_bytes());
        }
        let domains: [u8; 32] = domains.finalize().into();

        let mut hasher = Sha256::new();
        hasher.update(h(REQUEST_TYPE));
        hasher.update(self.public_key.0);
        hasher.update(domains);
        hasher.update(word(self.start_timestamp));
        hasher.update(word(self.duration_secs));
        hasher.finalize().into()
    }
}

impl GrantPayload {
    /// The 32 bytes the owner signs.
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([0x19, 0x01]);
        hasher.update(self.domain.separator());
        hasher.update(self.message.struct_hash());
        hasher.finalize().into()
    }

    /// Exclusive end of the validity window.
    pub fn expires_at(&self) -> u64 {
        self.message.start_timestamp.saturating_add(self.message.duration_secs)
    }
}
