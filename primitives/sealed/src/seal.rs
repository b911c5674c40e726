use crate::{labels, point_from_bytes, point_to_bytes, SealError, AEAD_TAG_LEN, G, SCHEME_VERSION};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use merlin::Transcript;
use parity_scale_codec::{Decode, Encode};
use purchase_ledger_primitives::{AccountId, CiphertextHandle, Domain, ValueType};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// `R || AEAD body`, as uploaded to the KMS.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct SealedCiphertext {
    pub ephemeral: [u8; 32],
    pub body: Vec<u8>,
}

impl SealedCiphertext {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.body.len());
        out.extend_from_slice(&self.ephemeral);
        out.extend_from_slice(&self.body);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SealError> {
        if bytes.len() < 32 + AEAD_TAG_LEN {
            return Err(SealError::Malformed("ciphertext too short"));
        }
        let mut ephemeral = [0u8; 32];
        ephemeral.copy_from_slice(&bytes[..32]);
        Ok(Self { ephemeral, body: bytes[32..].to_vec() })
    }
}

/// Everything a ciphertext is bound to besides the network key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealContext {
    pub domain: Domain,
    pub owner: AccountId,
    /// Position within the input bundle.
    pub index: u8,
    pub value_type: ValueType,
}

impl SealContext {
    /// `domain(32) || owner(32) || index(1) || type_tag(1)`
    pub fn aad(&self) -> [u8; 66] {
        let mut out = [0u8; 66];
        out[..32].copy_from_slice(self.domain.as_bytes());
        out[32..64].copy_from_slice(self.owner.as_bytes());
        out[64] = self.index;
        out[65] = self.value_type.tag();
        out
    }
}

fn derive_key(
    label: &'static [u8],
    shared: &RistrettoPoint,
    ephemeral: &[u8; 32],
    aad: &[u8],
) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut t = Transcript::new(label);
    t.append_message(b"shared", shared.compress().as_bytes());
    t.append_message(b"R", ephemeral);
    t.append_message(b"aad", aad);
    let mut key = Zeroizing::new([0u8; 32]);
    t.challenge_bytes(b"key", &mut key[..]);
    let mut nonce = [0u8; 12];
    t.challenge_bytes(b"nonce", &mut nonce);
    (key, nonce)
}

fn aead_seal(key: &[u8; 32], nonce: &[u8; 12], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>, SealError> {
    ChaCha20Poly1305::new(Key::from_slice(key))
        .encrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| SealError::Aead)
}

fn aead_open(
    key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8],
    body: &[u8],
) -> Result<Zeroizing<Vec<u8>>, SealError> {
    ChaCha20Poly1305::new(Key::from_slice(key))
        .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad })
        .map(Zeroizing::new)
        .map_err(|_| SealError::Aead)
}

fn encode_value(value_type: ValueType, value: u64) -> Result<Zeroizing<Vec<u8>>, SealError> {
    if !value_type.fits(value) {
        return Err(SealError::ValueOutOfRange { value, value_type });
    }
    Ok(Zeroizing::new(value.to_le_bytes()[..value_type.byte_len()].to_vec()))
}

fn decode_value(value_type: ValueType, bytes: &[u8]) -> Result<u64, SealError> {
    if bytes.len() != value_type.byte_len() {
        return Err(SealError::Malformed("plaintext width"));
    }
    let mut le = [0u8; 8];
    le[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(le))
}

/// Seal `value` to the network key with ephemeral scalar `r`.
pub fn seal_value(
    network_pk: &RistrettoPoint,
    ctx: &SealContext,
    value: u64,
    r: &Scalar,
) -> Result<SealedCiphertext, SealError> {
    let msg = encode_value(ctx.value_type, value)?;
    let ephemeral = point_to_bytes(&(r * G));
    let shared = r * network_pk;
    let aad = ctx.aad();
    let (key, nonce) = derive_key(labels::SEAL_KDF, &shared, &ephemeral, &aad);
    let body = aead_seal(&key, &nonce, &aad, &msg)?;
    Ok(SealedCiphertext { ephemeral, body })
}

pub fn open_value(
    network_sk: &Scalar,
    ctx: &SealContext,
    ct: &SealedCiphertext,
) -> Result<u64, SealError> {
    let big_r = point_from_bytes(&ct.ephemeral)?;
    let shared = network_sk * big_r;
    let aad = ctx.aad();
    let (key, nonce) = derive_key(labels::SEAL_KDF, &shared, &ct.ephemeral, &aad);
    let msg = aead_open(&key, &nonce, &aad, &ct.body)?;
    decode_value(ctx.value_type, &msg)
}

/// Handle id for a sealed value. Deterministic in `(ctx, ct)`.
pub fn derive_handle(ctx: &SealContext, ct: &SealedCiphertext) -> CiphertextHandle {
    let mut hasher = Sha256::new();
    hasher.update(labels::HANDLE);
    hasher.update(ctx.aad());
    hasher.update(ct.ephemeral);
    hasher.update(&ct.body);
    let mut id: [u8; 32] = hasher.finalize().into();
    id[30] = ctx.value_type.tag();
    id[31] = SCHEME_VERSION;
    CiphertextHandle::new(id, ctx.value_type)
}

/// Type tag and version bytes agree with the declared type.
pub fn handle_is_well_formed(handle: &CiphertextHandle) -> bool {
    let id = handle.id();
    id[30] == handle.value_type().tag() && id[31] == SCHEME_VERSION
}

/// A plaintext re-sealed to a requester's ephemeral key.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Reencrypted {
    pub handle: CiphertextHandle,
    /// `S = s·G`
    pub ephemeral: [u8; 32],
    pub body: Vec<u8>,
}

fn reencrypt_aad(handle: &CiphertextHandle) -> [u8; 33] {
    let mut out = [0u8; 33];
    out[..32].copy_from_slice(handle.id());
    out[32] = handle.value_type().tag();
    out
}

pub fn reencrypt(
    target_pk: &RistrettoPoint,
    handle: CiphertextHandle,
    value: u64,
    s: &Scalar,
) -> Result<Reencrypted, SealError> {
    let msg = encode_value(handle.value_type(), value)?;
    let ephemeral = point_to_bytes(&(s * G));
    let shared = s * target_pk;
    let aad = reencrypt_aad(&handle);
    let (key, nonce) = derive_key(labels::REENCRYPT_KDF, &shared, &ephemeral, &aad);
    let body = aead_seal(&key, &nonce, &aad, &msg)?;
    Ok(Reencrypted { handle, ephemeral, body })
}

pub fn open_reencrypted(target_sk: &Scalar, r: &Reencrypted) -> Result<u64, SealError> {
    let big_s = point_from_bytes(&r.ephemeral)?;
    let shared = target_sk * big_s;
    let aad = reencrypt_aad(&r.handle);
    let (key, nonce) = derive_key(labels::REENCRYPT_KDF, &shared, &r.ephemeral, &aad);
    let msg = aead_open(&key, &nonce, &aad, &r.body)?;
    decode_value(r.handle.value_type(), &msg)
}
