//! Decryption authorization protocol.
//!
//! One session per call:
//! 1. every handle must belong to a stored record (`HandleNotFound` otherwise,
//!    before anything is signed)
//! 2. fresh ephemeral keypair, grant payload over `(pk, [domain], now, window)`
//! 3. the signer signs the payload
//! 4. the decryption capability checks signature, window and entitlement
//! 5. plaintexts are mapped back by handle, parsed and width-checked
//!
//! The ephemeral keypair is moved into the request and never outlives the
//! session.

use crate::{LedgerError, LedgerStore, Result};
use purchase_ledger_primitives::{
    CapabilityError, CapabilityStatus, CiphertextHandle, DecryptionCapability, DecryptionRequest,
    Domain, GrantSigner, HandleDomainPair, UnixTime,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Plaintexts of one session, keyed by handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecryptedValues {
    values: HashMap<CiphertextHandle, u64>,
}

impl DecryptedValues {
    pub fn get(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.values.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CiphertextHandle, &u64)> {
        self.values.iter()
    }
}

pub struct DecryptionAuthorizer {
    capability: Arc<dyn DecryptionCapability>,
    store: LedgerStore,
    clock: Arc<dyn UnixTime>,
    domain: Domain,
    grant_duration_secs: u64,
}

impl DecryptionAuthorizer {
    pub fn new(
        capability: Arc<dyn DecryptionCapability>,
        store: LedgerStore,
        clock: Arc<dyn UnixTime>,
        domain: Domain,
        grant_duration_secs: u64,
    ) -> Self {
        Self { capability, store, clock, domain, grant_duration_secs }
    }

    pub fn status(&self) -> CapabilityStatus {
        self.capability.status()
    }

    /// Decrypt `handles` on behalf of whoever `signer` is.
    pub async fn decrypt(
        &self,
        handles: &[CiphertextHandle],
        signer: Option<&dyn GrantSigner>,
    ) -> Result<DecryptedValues> {
        match self.capability.status() {
            CapabilityStatus::Ready => {}
            status => return Err(LedgerError::DecryptionUnavailable(status)),
        }
        let signer =
            signer.ok_or_else(|| LedgerError::SignerUnavailable("no signer connected".into()))?;

        let mut unique: Vec<CiphertextHandle> = Vec::with_capacity(handles.len());
        for h in handles {
            if self.store.locate(h).is_none() {
                return Err(LedgerError::HandleNotFound(*h));
            }
            if !unique.contains(h) {
                unique.push(*h);
            }
        }
        if unique.is_empty() {
            return Err(LedgerError::NothingRequested);
        }

        let keypair = self.capability.generate_keypair();
        let start = self.clock.now();
        let duration = self.grant_duration_secs;
        let payload =
            self.capability.create_grant_payload(keypair.public(), &[self.domain], start, duration);
        let signature = signer
            .sign_grant(&payload)
            .await
            .map_err(|e| LedgerError::SignerUnavailable(e.to_string()))?;

        let requester = signer.account();
        let request = DecryptionRequest {
            pairs: unique
                .iter()
                .map(|h| HandleDomainPair { handle: *h, domain: self.domain })
                .collect(),
            keypair,
            signature,
            domains: vec![self.domain],
            requester,
            start_timestamp: start,
            duration_secs: duration,
        };
        let raw = match self.capability.request_decryption(request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    %requester,
                    handles = unique.len(),
                    error = %e,
                    "decryption refused"
                );
                return Err(map_decrypt_error(e));
            }
        };

        let values = assemble(&unique, &raw)?;
        tracing::info!(%requester, handles = values.len(), "decryption session completed");
        Ok(DecryptedValues { values })
    }
}

fn map_decrypt_error(e: CapabilityError) -> LedgerError {
    match e {
        CapabilityError::Denied | CapabilityError::UnknownHandle(_) => {
            LedgerError::DecryptionDenied
        }
        CapabilityError::Expired => LedgerError::GrantExpired,
        CapabilityError::NotReady => LedgerError::DecryptionUnavailable(CapabilityStatus::NotReady),
        CapabilityError::SignerUnavailable(reason) => LedgerError::SignerUnavailable(reason),
        other => LedgerError::Decryption(other.to_string()),
    }
}

fn assemble(
    requested: &[CiphertextHandle],
    raw: &HashMap<CiphertextHandle, String>,
) -> Result<HashMap<CiphertextHandle, u64>> {
    requested
        .iter()
        .map(|h| -> Result<(CiphertextHandle, u64)> {
            let text = raw
                .get(h)
                .ok_or_else(|| LedgerError::Decryption(format!("no plaintext returned for {h}")))?;
            let value: u64 = text.trim().parse().map_err(|_| LedgerError::MalformedPlaintext {
                handle: *h,
                reason: format!("not an unsigned integer: {text:?}"),
            })?;
            if !h.value_type().fits(value) {
                return Err(LedgerError::MalformedPlaintext {
                    handle: *h,
                    reason: format!("{value} exceeds {} bits", h.bits()),
                });
            }
            Ok((*h, value))
        })
        .collect()
}
