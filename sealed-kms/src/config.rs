use crate::KmsError;
use purchase_ledger_primitives::{Domain, SigningDomain};
use sealed_primitives::MAX_INPUTS;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_GRANT_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
pub const DEFAULT_MAX_INPUTS_PER_PROOF: usize = 8;
pub const DEFAULT_MAX_PENDING_INPUTS_PER_OWNER: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KmsConfig {
    /// Domain separator every grant signature is checked under.
    pub signing_domain: SigningDomain,
    pub max_grant_duration_secs: u64,
    pub max_inputs_per_proof: usize,
    /// Uploaded but not yet verified inputs an owner may hold at once.
    pub max_pending_inputs_per_owner: usize,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            signing_domain: SigningDomain {
                name: "Decryption".into(),
                version: "1".into(),
                chain_id: 0,
                verifying_contract: Domain::default(),
            },
            max_grant_duration_secs: DEFAULT_MAX_GRANT_DURATION_SECS,
            max_inputs_per_proof: DEFAULT_MAX_INPUTS_PER_PROOF,
            max_pending_inputs_per_owner: DEFAULT_MAX_PENDING_INPUTS_PER_OWNER,
        }
    }
}

impl KmsConfig {
    pub fn from_json(s: &str) -> Result<Self, KmsError> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| KmsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KmsError> {
        if self.max_grant_duration_secs == 0 {
            return Err(KmsError::Config("max_grant_duration_secs must be positive".into()));
        }
        if self.max_inputs_per_proof == 0 || self.max_inputs_per_proof > MAX_INPUTS {
            return Err(KmsError::Config(format!(
                "max_inputs_per_proof must be in 1..={MAX_INPUTS}"
            )));
        }
        if self.max_pending_inputs_per_owner < self.max_inputs_per_proof {
            return Err(KmsError::Config(
                "max_pending_inputs_per_owner must cover one full proof".into(),
            ));
        }
        Ok(())
    }
}
