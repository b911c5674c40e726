//! Types and traits for confidential purchase ledger crates
//!
//! Everything the ledger core exchanges with its external collaborators lives
//! here: identities, opaque ciphertext handles, purchase records, the typed
//! decryption-grant payload and the capability traits (encryption, input
//! verification, decryption, grant signing).
use async_trait::async_trait;
use core::fmt;
use parity_scale_codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod clock;
mod grant;

pub use clock::{ManualClock, SystemClock, UnixTime};
pub use grant::{
    EphemeralKeypair, EphemeralPublicKey, GrantPayload, GrantSignature, SigningDomain,
    UserDecryptRequest,
};

/// Upper bound on the proof blob accepted alongside an encrypted input.
pub const MAX_INPUT_PROOF_LEN: usize = 8192;

/// Proof/aux data blob used by the verifier to validate an encrypted input.
pub type InputProof = Vec<u8>;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode, TypeInfo,
            MaxEncodedLen,
        )]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Parse `0x`-prefixed or bare hex.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut out)?;
                Ok(Self(out))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Owner identity. The bytes are the owner's ed25519 verifying key.
    AccountId
);
hex_id!(
    /// Application/contract identity a ciphertext handle is scoped to.
    Domain
);

/// Declared plaintext type of a ciphertext handle. Unsigned only.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Encode,
    Decode,
    TypeInfo,
    MaxEncodedLen,
    Serialize,
    Deserialize,
)]
pub enum ValueType {
    Uint32,
    Uint64,
}

impl ValueType {
    pub const fn bits(self) -> u32 {
        match self {
            ValueType::Uint32 => 32,
            ValueType::Uint64 => 64,
        }
    }

    pub const fn is_signed(self) -> bool {
        false
    }

    /// Type tag embedded in handle ids.
    pub const fn tag(self) -> u8 {
        match self {
            ValueType::Uint32 => 4,
            ValueType::Uint64 => 5,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            4 => Some(ValueType::Uint32),
            5 => Some(ValueType::Uint64),
            _ => None,
        }
    }

    pub const fn max_value(self) -> u64 {
        match self {
            ValueType::Uint32 => u32::MAX as u64,
            ValueType::Uint64 => u64::MAX,
        }
    }

    pub const fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }

    /// Little-endian width of the encoded plaintext.
    pub const fn byte_len(self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// Opaque reference to an encrypted unsigned integer.
///
/// The ledger only ever compares handles for equality; it never looks
/// inside `id`.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, TypeInfo, MaxEncodedLen,
)]
pub struct CiphertextHandle {
    id: [u8; 32],
    value_type: ValueType,
}

impl CiphertextHandle {
    pub const fn new(id: [u8; 32], value_type: ValueType) -> Self {
        Self { id, value_type }
    }

    pub fn id(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn bits(&self) -> u32 {
        self.value_type.bits()
    }

    pub fn is_signed(&self) -> bool {
        self.value_type.is_signed()
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.id))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({self}, {:?})", self.value_type)
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = s.serialize_struct("CiphertextHandle", 2)?;
        st.serialize_field("id", &self.to_string())?;
        st.serialize_field("value_type", &self.value_type)?;
        st.end()
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            id: String,
            value_type: ValueType,
        }
        let raw = Raw::deserialize(d)?;
        let mut id = [0u8; 32];
        hex::decode_to_slice(raw.id.strip_prefix("0x").unwrap_or(&raw.id), &mut id)
            .map_err(serde::de::Error::custom)?;
        Ok(Self::new(id, raw.value_type))
    }
}

/// One plaintext value to be sealed, tagged with its declared type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypedValue {
    pub value_type: ValueType,
    pub value: u64,
}

impl TypedValue {
    pub const fn uint32(value: u32) -> Self {
        Self { value_type: ValueType::Uint32, value: value as u64 }
    }

    pub const fn uint64(value: u64) -> Self {
        Self { value_type: ValueType::Uint64, value }
    }
}

/// Output of an encryption capability: one handle per input, plus a single
/// proof covering all of them.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EncryptedInput {
    pub handles: Vec<CiphertextHandle>,
    pub proof: InputProof,
}

/// The three confidential fields of a purchase.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Encode,
    Decode,
    TypeInfo,
    MaxEncodedLen,
    Serialize,
    Deserialize,
)]
pub enum PurchaseField {
    ItemId,
    Quantity,
    UnitPrice,
}

impl PurchaseField {
    /// Field order used for sealing and for `RecordHandles::as_array`.
    pub const ALL: [PurchaseField; 3] =
        [PurchaseField::ItemId, PurchaseField::Quantity, PurchaseField::UnitPrice];

    pub const fn value_type(self) -> ValueType {
        match self {
            PurchaseField::ItemId | PurchaseField::Quantity => ValueType::Uint32,
            PurchaseField::UnitPrice => ValueType::Uint64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PurchaseField::ItemId => "item_id",
            PurchaseField::Quantity => "quantity",
            PurchaseField::UnitPrice => "unit_price",
        }
    }
}

impl fmt::Display for PurchaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plaintext purchase as entered by its owner. Never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInput {
    pub item_id: u32,
    pub quantity: u32,
    /// Smallest currency unit.
    pub unit_price: u64,
}

impl PurchaseInput {
    pub const fn new(item_id: u32, quantity: u32, unit_price: u64) -> Self {
        Self { item_id, quantity, unit_price }
    }

    pub fn value(&self, field: PurchaseField) -> u64 {
        match field {
            PurchaseField::ItemId => self.item_id as u64,
            PurchaseField::Quantity => self.quantity as u64,
            PurchaseField::UnitPrice => self.unit_price,
        }
    }

    /// Values in `PurchaseField::ALL` order.
    pub fn typed_values(&self) -> [TypedValue; 3] {
        [
            TypedValue::uint32(self.item_id),
            TypedValue::uint32(self.quantity),
            TypedValue::uint64(self.unit_price),
        ]
    }
}

/// Handles of one purchase, one per field.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Encode,
    Decode,
    TypeInfo,
    MaxEncodedLen,
    Serialize,
    Deserialize,
)]
pub struct RecordHandles {
    pub item_id: CiphertextHandle,
    pub quantity: CiphertextHandle,
    pub unit_price: CiphertextHandle,
}

impl RecordHandles {
    pub fn from_array([item_id, quantity, unit_price]: [CiphertextHandle; 3]) -> Self {
        Self { item_id, quantity, unit_price }
    }

    pub fn as_array(&self) -> [CiphertextHandle; 3] {
        [self.item_id, self.quantity, self.unit_price]
    }

    pub fn get(&self, field: PurchaseField) -> CiphertextHandle {
        match field {
            PurchaseField::ItemId => self.item_id,
            PurchaseField::Quantity => self.quantity,
            PurchaseField::UnitPrice => self.unit_price,
        }
    }

    /// Which field, if any, refers to `handle`.
    pub fn field_of(&self, handle: &CiphertextHandle) -> Option<PurchaseField> {
        PurchaseField::ALL.into_iter().find(|f| self.get(*f) == *handle)
    }
}

/// Stored purchase. Immutable once appended.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Encode,
    Decode,
    TypeInfo,
    MaxEncodedLen,
    Serialize,
    Deserialize,
)]
pub struct PurchaseRecord {
    pub handles: RecordHandles,
    /// Wall-clock seconds at acceptance time. Plaintext.
    pub timestamp: u64,
}

impl PurchaseRecord {
    pub fn handle(&self, field: PurchaseField) -> CiphertextHandle {
        self.handles.get(field)
    }
}

/// Emitted once per accepted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, Serialize, Deserialize)]
pub struct RecordAdded {
    pub owner: AccountId,
    pub index: u64,
    pub timestamp: u64,
}

/// A `(handle, domain)` pair presented for decryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, TypeInfo)]
pub struct HandleDomainPair {
    pub handle: CiphertextHandle,
    pub domain: Domain,
}

/// Everything the decryption capability needs for one user-decrypt session.
///
/// The keypair is moved in and dropped (zeroized) by the capability.
pub struct DecryptionRequest {
    pub pairs: Vec<HandleDomainPair>,
    pub keypair: EphemeralKeypair,
    pub signature: GrantSignature,
    pub domains: Vec<Domain>,
    pub requester: AccountId,
    pub start_timestamp: u64,
    pub duration_secs: u64,
}

/// Readiness of an external capability, checked at the start of each step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityStatus {
    Ready,
    NotReady,
    Failed(String),
}

impl CapabilityStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CapabilityStatus::Ready)
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityStatus::Ready => f.write_str("ready"),
            CapabilityStatus::NotReady => f.write_str("not ready"),
            CapabilityStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Error surface shared by every capability.
///
/// Authorization failures are deliberately coarse: `Denied` never says which
/// check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability not ready")]
    NotReady,
    #[error("request denied")]
    Denied,
    #[error("grant expired")]
    Expired,
    #[error("input proof rejected")]
    ProofRejected,
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// Encrypts plaintext inputs for `(domain, owner)`.
#[async_trait]
pub trait EncryptionCapability: Send + Sync {
    fn status(&self) -> CapabilityStatus;

    /// Produce one handle per input (same order) and one proof for all.
    async fn encrypt(
        &self,
        domain: Domain,
        owner: AccountId,
        inputs: &[TypedValue],
    ) -> Result<EncryptedInput, CapabilityError>;
}

/// Verifies that a set of handles was honestly produced together for
/// `(domain, owner)`. On success the handles become decryptable by `owner`
/// under `domain`.
#[async_trait]
pub trait InputVerifier: Send + Sync {
    async fn verify_input(
        &self,
        domain: Domain,
        owner: AccountId,
        handles: &[CiphertextHandle],
        proof: &[u8],
    ) -> Result<(), CapabilityError>;
}

/// User-decryption SDK surface.
#[async_trait]
pub trait DecryptionCapability: Send + Sync {
    fn status(&self) -> CapabilityStatus;

    fn generate_keypair(&self) -> EphemeralKeypair;

    fn create_grant_payload(
        &self,
        public_key: &EphemeralPublicKey,
        domains: &[Domain],
        start_timestamp: u64,
        duration_secs: u64,
    ) -> GrantPayload;

    /// Plaintexts keyed by handle, rendered as decimal strings.
    async fn request_decryption(
        &self,
        request: DecryptionRequest,
    ) -> Result<HashMap<CiphertextHandle, String>, CapabilityError>;
}

/// The owner's long-lived identity, able to sign grant payloads.
#[async_trait]
pub trait GrantSigner: Send + Sync {
    fn account(&self) -> AccountId;

    async fn sign_grant(&self, payload: &GrantPayload) -> Result<GrantSignature, CapabilityError>;
}
