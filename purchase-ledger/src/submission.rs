//! Record submission protocol.
//!
//! ```text
//! Idle -> Validating -> Encrypting -> Appending -> Notified
//!             |             |            |
//!             v             +-----+------+
//!          Rejected               v
//!                               Failed
//! ```
//! Validation failures have no side effect. Encryption or append failures
//! leave no record behind. Not idempotent: resubmitting the same plaintext
//! creates a new record.

use crate::{EncryptionGateway, ErrorKind, LedgerError, PurchaseLedger};
use purchase_ledger_primitives::{AccountId, PurchaseInput, RecordHandles};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    Idle,
    Validating,
    Encrypting,
    Appending,
    Notified,
    Rejected,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Notified | Self::Rejected | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub owner: AccountId,
    pub index: u64,
    pub timestamp: u64,
    pub handles: RecordHandles,
}

#[derive(Debug, Error)]
#[error("submission {state:?}: {source}")]
pub struct SubmissionError {
    /// `Rejected` or `Failed`.
    pub state: SubmissionState,
    #[source]
    pub source: LedgerError,
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

struct Tracker {
    state: SubmissionState,
}

impl Tracker {
    fn enter(&mut self, next: SubmissionState) {
        tracing::debug!(from = ?self.state, to = ?next, "submission transition");
        self.state = next;
    }

    fn end(mut self, terminal: SubmissionState, source: LedgerError) -> SubmissionError {
        self.enter(terminal);
        SubmissionError { state: terminal, source }
    }
}

/// Run one submission to a terminal state.
pub async fn submit(
    gateway: &EncryptionGateway,
    ledger: &PurchaseLedger,
    owner: Option<AccountId>,
    input: PurchaseInput,
) -> Result<SubmissionReceipt, SubmissionError> {
    let mut t = Tracker { state: SubmissionState::Idle };

    t.enter(SubmissionState::Validating);
    let owner = match owner {
        Some(owner) => owner,
        None => return Err(t.end(SubmissionState::Rejected, LedgerError::OwnerMissing)),
    };
    if let Err(e) = gateway.ensure_ready().and_then(|()| EncryptionGateway::validate(&input)) {
        return Err(t.end(SubmissionState::Rejected, e));
    }

    t.enter(SubmissionState::Encrypting);
    let sealed = match gateway.encrypt(&input, ledger.domain(), owner).await {
        Ok(sealed) => sealed,
        Err(e) => return Err(t.end(SubmissionState::Failed, e)),
    };

    t.enter(SubmissionState::Appending);
    let added = match ledger.append_verified(owner, sealed.handles, &sealed.proof).await {
        Ok(added) => added,
        Err(e) => return Err(t.end(SubmissionState::Failed, e)),
    };

    t.enter(SubmissionState::Notified);
    Ok(SubmissionReceipt {
        owner,
        index: added.index,
        timestamp: added.timestamp,
        handles: sealed.handles,
    })
}
