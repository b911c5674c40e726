use crate::ConfigError;
use purchase_ledger_primitives::{AccountId, CapabilityStatus, CiphertextHandle, PurchaseField};
use thiserror::Error;

/// Coarse classification of every failure the ledger surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required collaborator or identity is missing or not ready.
    Precondition,
    /// The caller's input was rejected before any side effect.
    Validation,
    /// An external capability or the storage backend failed.
    ExternalFailure,
    Authorization,
    NotFound,
}

impl ErrorKind {
    /// Something the user can fix by changing what they entered or connected.
    pub fn is_input_problem(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::Precondition)
    }

    /// The operation may have been interrupted by a collaborator; nothing was
    /// half-written.
    pub fn is_incomplete(self) -> bool {
        matches!(self, ErrorKind::ExternalFailure)
    }

    pub fn is_forbidden(self) -> bool {
        matches!(self, ErrorKind::Authorization)
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("owner identity is not known")]
    OwnerMissing,
    #[error("encryption capability unavailable ({0})")]
    EncryptionUnavailable(CapabilityStatus),
    #[error("decryption capability unavailable ({0})")]
    DecryptionUnavailable(CapabilityStatus),
    #[error("grant signer unavailable: {0}")]
    SignerUnavailable(String),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: PurchaseField, reason: &'static str },
    #[error("nothing to decrypt")]
    NothingRequested,
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("input proof does not verify for these handles")]
    ProofInvalid,
    #[error("input verifier: {0}")]
    Verifier(String),
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("handle {0} is already referenced by a stored record")]
    HandleAliased(CiphertextHandle),
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("malformed plaintext for {handle}: {reason}")]
    MalformedPlaintext { handle: CiphertextHandle, reason: String },
    #[error("decryption denied")]
    DecryptionDenied,
    #[error("decryption grant expired")]
    GrantExpired,
    #[error("index {index} out of range for {owner} ({count} records)")]
    IndexOutOfRange { owner: AccountId, index: u64, count: u64 },
    #[error("{0} has no records")]
    EmptyLedger(AccountId),
    #[error("handle {0} is not part of any stored record")]
    HandleNotFound(CiphertextHandle),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            Config(_)
            | OwnerMissing
            | EncryptionUnavailable(_)
            | DecryptionUnavailable(_)
            | SignerUnavailable(_) => ErrorKind::Precondition,
            InvalidField { .. } | NothingRequested => ErrorKind::Validation,
            Encryption(_)
            | ProofInvalid
            | Verifier(_)
            | Backend(_)
            | HandleAliased(_)
            | Decryption(_)
            | MalformedPlaintext { .. } => ErrorKind::ExternalFailure,
            DecryptionDenied | GrantExpired => ErrorKind::Authorization,
            IndexOutOfRange { .. } | EmptyLedger(_) | HandleNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Backend(e.to_string())
    }
}

pub type Result<T, E = LedgerError> = core::result::Result<T, E>;
