//! # sealed-client: sealing and user decryption
//!
//! Client half of the reference sealing scheme:
//!
//! - [`prove_input`] seals a batch of typed values to the network key and
//!   produces one proof covering every resulting handle. Pure and seedable.
//! - [`SealingClient`] wraps a [`Relayer`] and implements the
//!   `EncryptionCapability` and `DecryptionCapability` traits the ledger
//!   consumes.
//! - [`LocalWallet`] holds an ed25519 identity and signs grant payloads.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let client = SealingClient::new(relayer);
//! let sealed = client
//!     .input(domain, owner)
//!     .add32(42)
//!     .add32(3)
//!     .add64(1_999)
//!     .encrypt()
//!     .await?;
//! // sealed.handles[i] refers to the i-th value; sealed.proof covers all three
//! ```

mod client;
mod prover;
mod wallet;


pub use client::{InputBuilder, SealingClient};
pub use prover::{prove_input, SealInput, SealOutput};
pub use wallet::LocalWallet;

use purchase_ledger_primitives::CapabilityError;
use sealed_primitives::SealError;
use thiserror::Error;

pub use sealed_primitives::Relayer;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("network public key not published")]
    NetworkKeyUnavailable,
    #[error(transparent)]
    Seal(#[from] SealError),
    #[error(transparent)]
    Relayer(#[from] CapabilityError),
}

impl From<ClientError> for CapabilityError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Relayer(inner) => inner,
            ClientError::NetworkKeyUnavailable => CapabilityError::NotReady,
            other => CapabilityError::Failed(other.to_string()),
        }
    }
}
