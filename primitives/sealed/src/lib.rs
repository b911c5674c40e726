//! # sealed-primitives: shared pieces of the reference sealing scheme
//!
//! Used by `sealed-client` (sealing, proving, opening re-encrypted values)
//! and `sealed-kms` (verifying, opening, re-encrypting). Both sides must agree
//! byte-for-byte on everything here.
//!
//! ## Ciphertext
//! ```text
//! R(32) || ChaCha20-Poly1305(K, value_le) ; K = KDF(r·PK_net, R, aad)
//! aad = domain(32) || owner(32) || index(1) || type_tag(1)
//! ```
//!
//! ## Handle id
//! ```text
//! SHA-256(HANDLE || aad || ciphertext)[0..30] || type_tag(1) || SCHEME_VERSION(1)
//! ```
//!
//! ## Input proof
//! ```text
//! count(1) || (A_i(32) || z_i(32)) * count
//! ```
//! One Schnorr proof of knowledge of each `r_i`, all sharing a Fiat–Shamir
//! challenge drawn from a transcript binding domain, owner and every
//! `(handle_i, R_i)`.

mod proof;
mod relayer;
mod seal;

pub use proof::{decode_input_proof, encode_input_proof, input_transcript, POK_LEN};
pub use relayer::{BundleEntry, InputBundle, Relayer, RelayerDecryptRequest};
pub use seal::{
    derive_handle, handle_is_well_formed, open_reencrypted, open_value, reencrypt, seal_value,
    Reencrypted, SealContext, SealedCiphertext,
};

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::CompressedRistretto,
    ristretto::RistrettoPoint, scalar::Scalar,
};
use merlin::Transcript;
use purchase_ledger_primitives::ValueType;
use rand::RngCore;
use thiserror::Error;

/// Ristretto basepoint.
pub const G: RistrettoPoint = RISTRETTO_BASEPOINT_POINT;

/// Stamped into the last byte of every handle id.
pub const SCHEME_VERSION: u8 = 1;

/// Hard cap on values sealed under one proof.
pub const MAX_INPUTS: usize = 16;

pub const AEAD_TAG_LEN: usize = 16;

pub mod labels {
    pub const PROTOCOL: &[u8] = b"PurchaseLedger/SealedInput";
    pub const PROTOCOL_V: &[u8] = b"v1";
    pub const HANDLE: &[u8] = b"PurchaseLedger/Handle";
    pub const SEAL_KDF: &[u8] = b"PurchaseLedger/SealKdf";
    pub const REENCRYPT_KDF: &[u8] = b"PurchaseLedger/ReencryptKdf";
    pub const CHAL_POK: &[u8] = b"chal_pok";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("malformed input: {0}")]
    Malformed(&'static str),
    #[error("value {value} does not fit {value_type:?}")]
    ValueOutOfRange { value: u64, value_type: ValueType },
    #[error("invalid point encoding")]
    InvalidPoint,
    #[error("authenticated decryption failed")]
    Aead,
}

/// Random scalar with full 256-bit entropy.
pub fn random_scalar<R: RngCore>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

pub fn append_point(t: &mut Transcript, label: &'static [u8], p: &RistrettoPoint) {
    t.append_message(label, p.compress().as_bytes());
}

pub fn challenge_scalar(t: &mut Transcript, label: &'static [u8]) -> Scalar {
    let mut buf = [0u8; 64];
    t.challenge_bytes(label, &mut buf);
    Scalar::from_bytes_mod_order_wide(&buf)
}

pub fn point_to_bytes(p: &RistrettoPoint) -> [u8; 32] {
    p.compress().to_bytes()
}

pub fn point_from_bytes(bytes: &[u8; 32]) -> Result<RistrettoPoint, SealError> {
    CompressedRistretto(*bytes).decompress().ok_or(SealError::InvalidPoint)
}

pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar, SealError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes))
        .ok_or(SealError::Malformed("non-canonical scalar"))
}
