use crate::{LedgerError, Result};
use purchase_ledger_primitives::{
    AccountId, CapabilityError, CapabilityStatus, CiphertextHandle, Domain, EncryptionCapability,
    InputProof, PurchaseField, PurchaseInput, RecordHandles, MAX_INPUT_PROOF_LEN,
};
use std::sync::Arc;

/// Handles and proof for one purchase, ready for the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedPurchase {
    pub handles: RecordHandles,
    pub proof: InputProof,
}

/// Adapter between plaintext purchases and the encryption capability.
#[derive(Clone)]
pub struct EncryptionGateway {
    capability: Arc<dyn EncryptionCapability>,
}

impl EncryptionGateway {
    pub fn new(capability: Arc<dyn EncryptionCapability>) -> Self {
        Self { capability }
    }

    pub fn status(&self) -> CapabilityStatus {
        self.capability.status()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        match self.capability.status() {
            CapabilityStatus::Ready => Ok(()),
            status => Err(LedgerError::EncryptionUnavailable(status)),
        }
    }

    /// Field constraints. Widths are already enforced by the input types.
    pub fn validate(input: &PurchaseInput) -> Result<()> {
        for field in PurchaseField::ALL {
            if input.value(field) == 0 {
                return Err(LedgerError::InvalidField { field, reason: "must be positive" });
            }
        }
        Ok(())
    }

    /// Seal the three fields for `(domain, owner)`, in field order.
    pub async fn encrypt(
        &self,
        input: &PurchaseInput,
        domain: Domain,
        owner: AccountId,
    ) -> Result<SealedPurchase> {
        Self::validate(input)?;
        self.ensure_ready()?;

        let out = self
            .capability
            .encrypt(domain, owner, &input.typed_values())
            .await
            .map_err(|e| match e {
                CapabilityError::NotReady => {
                    LedgerError::EncryptionUnavailable(CapabilityStatus::NotReady)
                }
                other => LedgerError::Encryption(other.to_string()),
            })?;

        let returned = out.handles.len();
        let handles: [CiphertextHandle; 3] = out.handles.try_into().map_err(|_| {
            LedgerError::Encryption(format!("expected 3 handles, got {returned}"))
        })?;
        for (field, handle) in PurchaseField::ALL.into_iter().zip(&handles) {
            if handle.value_type() != field.value_type() {
                return Err(LedgerError::Encryption(format!(
                    "{field} handle is {}-bit, expected {}-bit",
                    handle.bits(),
                    field.value_type().bits()
                )));
            }
        }
        if out.proof.is_empty() || out.proof.len() > MAX_INPUT_PROOF_LEN {
            return Err(LedgerError::Encryption(format!(
                "proof of {} bytes outside accepted size",
                out.proof.len()
            )));
        }

        Ok(SealedPurchase { handles: RecordHandles::from_array(handles), proof: out.proof })
    }
}
