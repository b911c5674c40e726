//! End-to-end tests for the purchase ledger.
//!
//! Every test wires the real pieces together in-process: a [`sealed_kms::Kms`]
//! holding the network key, a [`sealed_client::SealingClient`] talking to it
//! as its relayer, and a [`purchase_ledger::PurchaseService`] backed by either
//! memory or an on-disk log.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p integration-tests
//!
//! # Run with logging
//! RUST_LOG=info cargo test -p integration-tests -- --nocapture
//! ```

pub mod helpers;

pub use helpers::{Deployment, DOMAIN, GENESIS};

/// Wallets with fixed seeds, so accounts are reproducible across runs.
pub mod test_accounts {
    use sealed_client::LocalWallet;

    pub fn alice() -> LocalWallet {
        LocalWallet::from_seed([1; 32])
    }

    pub fn bob() -> LocalWallet {
        LocalWallet::from_seed([2; 32])
    }

    pub fn charlie() -> LocalWallet {
        LocalWallet::from_seed([3; 32])
    }
}

/// Install a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
