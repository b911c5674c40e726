//! Submit, list and reveal purchases through the full stack.
//!
//! ```bash
//! RUST_LOG=info cargo test -p integration-tests --test purchase_flow -- --nocapture
//! ```

use anyhow::Result;
use futures::future::join_all;
use integration_tests::helpers::submit_all;
use integration_tests::{init_tracing, test_accounts, Deployment};
use purchase_ledger::{ErrorKind, LedgerError, SubmissionState};
use purchase_ledger_primitives::{PurchaseField, PurchaseInput};
use tracing::info;

#[tokio::test]
async fn test_submit_then_reveal_own_purchase() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();

    let receipt = service.submit(Some(alice.account()), PurchaseInput::new(42, 3, 1_999)).await?;
    info!(index = receipt.index, "alice purchase stored");
    assert_eq!(receipt.index, 0);
    assert_eq!(service.ledger().count(&alice.account()), 1);

    let listed = service.history().list(&alice.account());
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].handles, receipt.handles);

    let revealed = service.history().reveal_record(&alice.account(), 0, Some(&alice)).await?;
    assert_eq!((revealed.item_id, revealed.quantity, revealed.unit_price), (42, 3, 1_999));
    Ok(())
}

#[tokio::test]
async fn test_other_account_cannot_reveal() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();
    let bob = test_accounts::bob();

    service.submit(Some(alice.account()), PurchaseInput::new(7, 1, 250)).await?;

    // Handles are public; plaintext is not.
    let err = service
        .history()
        .reveal(&alice.account(), 0, PurchaseField::UnitPrice, Some(&bob))
        .await
        .expect_err("bob must be denied");
    assert!(matches!(err, LedgerError::DecryptionDenied));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let price = service
        .history()
        .reveal(&alice.account(), 0, PurchaseField::UnitPrice, Some(&alice))
        .await?;
    assert_eq!(price, 250);
    Ok(())
}

#[tokio::test]
async fn test_owners_have_independent_lists() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();
    let charlie = test_accounts::charlie();

    let a = submit_all(
        &service,
        &alice,
        &[PurchaseInput::new(1, 1, 10), PurchaseInput::new(2, 2, 20)],
    )
    .await?;
    let c = submit_all(&service, &charlie, &[PurchaseInput::new(3, 3, 30)]).await?;
    assert_eq!(a, vec![0, 1]);
    assert_eq!(c, vec![0]);

    let (index, _) = service.ledger().latest(&alice.account())?;
    assert_eq!(index, 1);
    let second = service.history().reveal_record(&alice.account(), 1, Some(&alice)).await?;
    assert_eq!((second.item_id, second.quantity, second.unit_price), (2, 2, 20));
    let only = service.history().reveal_record(&charlie.account(), 0, Some(&charlie)).await?;
    assert_eq!(only.unit_price, 30);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_submissions_from_one_owner() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();
    let owner = alice.account();

    let results = join_all((1..=6u32).map(|i| {
        service.submit(Some(owner), PurchaseInput::new(i, i, u64::from(i) * 1_000))
    }))
    .await;

    let mut indices = Vec::new();
    for r in results {
        indices.push(r?.index);
    }
    indices.sort_unstable();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());

    // Every record still decrypts to the input that produced it.
    for entry in service.history().list(&owner) {
        let p = service.history().reveal_record(&owner, entry.index, Some(&alice)).await?;
        assert_eq!(p.item_id, p.quantity);
        assert_eq!(p.unit_price, u64::from(p.item_id) * 1_000);
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_purchase_never_reaches_the_ledger() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();

    let err = service
        .submit(Some(alice.account()), PurchaseInput::new(42, 0, 1_999))
        .await
        .expect_err("zero quantity");
    assert_eq!(err.state, SubmissionState::Rejected);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!service.ledger().has_any(&alice.account()));
    Ok(())
}

#[tokio::test]
async fn test_each_reveal_mints_a_fresh_grant() -> Result<()> {
    init_tracing();
    let deployment = Deployment::new();
    let service = deployment.in_memory().await?;
    let alice = test_accounts::alice();
    service.submit(Some(alice.account()), PurchaseInput::new(5, 5, 5)).await?;

    // A fresh grant is minted per call, so time passing between calls is harmless.
    deployment.clock.advance(30 * 24 * 3600);
    let v =
        service.history().reveal(&alice.account(), 0, PurchaseField::ItemId, Some(&alice)).await?;
    assert_eq!(v, 5);
    Ok(())
}
