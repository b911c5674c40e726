use crate::mock::*;
use crate::*;
use futures::future::join_all;
use purchase_ledger_primitives::{
    CapabilityStatus, CiphertextHandle, GrantSigner, PurchaseField, PurchaseInput, RecordHandles,
    ValueType,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SAMPLE: PurchaseInput = PurchaseInput::new(42, 3, 1_999);

fn handles_of(sealed: &purchase_ledger_primitives::EncryptedInput) -> RecordHandles {
    RecordHandles::from_array([sealed.handles[0], sealed.handles[1], sealed.handles[2]])
}

// ---------- submission ----------

#[test_log::test(tokio::test)]
async fn valid_submission_appends_gateway_handles() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    assert_eq!(env.service.ledger().count(&alice), 0);
    assert!(!env.service.ledger().has_any(&alice));

    let receipt = env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    assert_eq!(receipt.index, 0);
    assert_eq!(receipt.owner, alice);
    assert_eq!(env.service.ledger().count(&alice), 1);
    assert!(env.service.ledger().has_any(&alice));
    let stored = env.service.ledger().record(&alice, 0).expect("record");
    assert_eq!(stored.handles, receipt.handles);
    assert_eq!(stored.timestamp, T0);
    assert_eq!(receipt.handles.unit_price.value_type(), ValueType::Uint64);
    assert_eq!(env.encrypt_calls(), 1);
    for h in receipt.handles.as_array() {
        assert_eq!(env.kms.entitlement(&h), Some((alice, DOMAIN)));
    }
    assert_eq!(env.kms.pending_inputs(&alice), 0);
}

#[test_log::test(tokio::test)]
async fn sample_purchase_round_trips_for_owner() {
    let env = TestEnv::new();
    let alice = env.alice.account();

    env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    assert_eq!(env.service.ledger().count(&alice), 1);

    let revealed =
        env.service.history().reveal_record(&alice, 0, Some(&env.alice)).await.expect("reveal");
    assert_eq!((revealed.item_id, revealed.quantity, revealed.unit_price), (42, 3, 1_999));
    assert_eq!(revealed.timestamp, T0);

    let qty = env
        .service
        .history()
        .reveal(&alice, 0, PurchaseField::Quantity, Some(&env.alice))
        .await
        .expect("reveal field");
    assert_eq!(qty, 3);
}

#[tokio::test]
async fn zero_fields_are_rejected_before_encryption() {
    let env = TestEnv::new();
    let alice = env.alice.account();

    for (input, field) in [
        (PurchaseInput::new(0, 3, 1_999), PurchaseField::ItemId),
        (PurchaseInput::new(42, 0, 1_999), PurchaseField::Quantity),
        (PurchaseInput::new(42, 3, 0), PurchaseField::UnitPrice),
    ] {
        let err = env.service.submit(Some(alice), input).await.expect_err("rejected");
        assert_eq!(err.state, SubmissionState::Rejected);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.kind().is_input_problem());
        assert!(
            matches!(err.source, LedgerError::InvalidField { field: f, .. } if f == field),
            "{err}"
        );
    }
    assert_eq!(env.encrypt_calls(), 0);
    assert_eq!(env.service.ledger().count(&alice), 0);
}

#[tokio::test]
async fn missing_owner_is_a_precondition_failure() {
    let env = TestEnv::new();
    let err = env.service.submit(None, SAMPLE).await.expect_err("no owner");
    assert_eq!(err.state, SubmissionState::Rejected);
    assert!(matches!(err.source, LedgerError::OwnerMissing));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(env.encrypt_calls(), 0);
}

#[tokio::test]
async fn unready_encryption_rejects_without_calling_it() {
    let env = TestEnv::with_caps(|caps| {
        caps.encryption = Arc::new(Offline(CapabilityStatus::NotReady));
    });
    let alice = env.alice.account();
    let err = env.service.submit(Some(alice), SAMPLE).await.expect_err("not ready");
    assert_eq!(err.state, SubmissionState::Rejected);
    assert!(matches!(
        err.source,
        LedgerError::EncryptionUnavailable(CapabilityStatus::NotReady)
    ));
    assert_eq!(env.service.ledger().count(&alice), 0);
}

#[tokio::test]
async fn wrong_handle_count_from_gateway_fails_without_record() {
    let env = TestEnv::with_caps(|caps| {
        caps.encryption = Arc::new(ShortChanged(caps.encryption.clone()));
    });
    let alice = env.alice.account();
    let err = env.service.submit(Some(alice), SAMPLE).await.expect_err("short");
    assert_eq!(err.state, SubmissionState::Failed);
    assert_eq!(err.kind(), ErrorKind::ExternalFailure);
    assert!(err.kind().is_incomplete());
    assert!(matches!(err.source, LedgerError::Encryption(_)));
    assert_eq!(env.service.ledger().count(&alice), 0);
}

#[tokio::test]
async fn resubmitting_same_plaintext_creates_new_record() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let a = env.service.submit(Some(alice), SAMPLE).await.expect("first");
    let b = env.service.submit(Some(alice), SAMPLE).await.expect("second");
    assert_eq!((a.index, b.index), (0, 1));
    assert_ne!(a.handles, b.handles);
    assert_eq!(env.service.ledger().count(&alice), 2);
}

#[test_log::test(tokio::test)]
async fn concurrent_submissions_get_contiguous_indices() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("seed record");

    let inputs: Vec<_> = (1..=8u32).map(|i| PurchaseInput::new(i, i, u64::from(i) * 100)).collect();
    let receipts = join_all(inputs.into_iter().map(|input| env.service.submit(Some(alice), input)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("all submissions succeed");

    let indices: BTreeSet<u64> = receipts.iter().map(|r| r.index).collect();
    assert_eq!(indices, (1..=8).collect());
    assert_eq!(env.service.ledger().count(&alice), 9);
    for r in &receipts {
        let stored = env.service.ledger().record(&alice, r.index).expect("record");
        assert_eq!(stored.handles, r.handles);
    }
}

#[tokio::test]
async fn submissions_notify_subscribers() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let mut rx = env.service.subscribe();

    env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    env.clock.advance(5);
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let first = rx.recv().await.expect("event");
    let second = rx.recv().await.expect("event");
    assert_eq!((first.owner, first.index, first.timestamp), (alice, 0, T0));
    assert_eq!((second.index, second.timestamp), (1, T0 + 5));
}

// ---------- ledger writes ----------

#[tokio::test]
async fn proof_from_another_input_is_refused() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let a = env.seal(alice, (1, 2, 3)).await;
    let b = env.seal(alice, (4, 5, 6)).await;

    let err = env
        .service
        .ledger()
        .append_verified(alice, handles_of(&a), &b.proof)
        .await
        .expect_err("mismatched proof");
    assert!(matches!(err, LedgerError::ProofInvalid));
    assert_eq!(env.service.ledger().count(&alice), 0);

    env.service.ledger().append_verified(alice, handles_of(&a), &a.proof).await.expect("own proof");
    assert_eq!(env.service.ledger().count(&alice), 1);
}

#[tokio::test]
async fn handles_sealed_for_someone_else_are_refused() {
    let env = TestEnv::new();
    let sealed_for_bob = env.seal(env.bob.account(), (1, 2, 3)).await;
    let err = env
        .service
        .ledger()
        .append_verified(env.alice.account(), handles_of(&sealed_for_bob), &sealed_for_bob.proof)
        .await
        .expect_err("wrong owner");
    assert!(matches!(err, LedgerError::ProofInvalid));
}

#[tokio::test]
async fn stored_handles_cannot_be_reused() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let receipt = env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    let err = env
        .service
        .ledger()
        .append_verified(alice, receipt.handles, &[1, 2, 3])
        .await
        .expect_err("aliased");
    assert!(matches!(err, LedgerError::HandleAliased(_)));
    assert_eq!(env.service.ledger().count(&alice), 1);
}

#[tokio::test]
async fn empty_or_oversized_proof_is_refused_upfront() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let sealed = env.seal(alice, (1, 2, 3)).await;
    let ledger = env.service.ledger();
    assert!(matches!(
        ledger.append_verified(alice, handles_of(&sealed), &[]).await,
        Err(LedgerError::ProofInvalid)
    ));
    let huge = vec![0u8; purchase_ledger_primitives::MAX_INPUT_PROOF_LEN + 1];
    assert!(matches!(
        ledger.append_verified(alice, handles_of(&sealed), &huge).await,
        Err(LedgerError::ProofInvalid)
    ));
}

// ---------- reads ----------

#[tokio::test]
async fn latest_matches_last_index() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let ledger = env.service.ledger();

    let err = ledger.latest(&alice).expect_err("empty");
    assert!(matches!(err, LedgerError::EmptyLedger(o) if o == alice));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    for _ in 0..3 {
        env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    }
    let (index, latest) = ledger.latest(&alice).expect("latest");
    assert_eq!(index, 2);
    assert_eq!(latest, ledger.record(&alice, ledger.count(&alice) - 1).expect("record"));
}

#[tokio::test]
async fn out_of_range_index_is_not_found() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let err = env.service.ledger().record(&alice, 1).expect_err("out of range");
    assert!(matches!(err, LedgerError::IndexOutOfRange { index: 1, count: 1, .. }));
    assert!(env.service.ledger().record(&env.bob.account(), 0).is_err());
    assert!(env.service.ledger().records(&env.bob.account()).is_empty());
}

#[tokio::test]
async fn history_lists_records_oldest_first() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let first = env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    env.clock.advance(60);
    let second =
        env.service.submit(Some(alice), PurchaseInput::new(7, 1, 5)).await.expect("submit");

    let list = env.service.history().list(&alice);
    assert_eq!(list.len(), 2);
    assert_eq!((list[0].index, list[0].handles, list[0].timestamp), (0, first.handles, T0));
    assert_eq!((list[1].index, list[1].handles, list[1].timestamp), (1, second.handles, T0 + 60));
    assert!(env.service.history().list(&env.bob.account()).is_empty());
}

// ---------- decryption ----------

#[test_log::test(tokio::test)]
async fn other_identity_is_denied() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let err = env
        .service
        .history()
        .reveal(&alice, 0, PurchaseField::ItemId, Some(&env.bob))
        .await
        .expect_err("bob denied");
    assert!(matches!(err, LedgerError::DecryptionDenied));
    assert!(err.kind().is_forbidden());
}

#[test_log::test(tokio::test)]
async fn grant_used_after_window_is_expired() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let slow = SlowSigner {
        wallet: sealed_client::LocalWallet::from_seed([1; 32]),
        clock: env.clock.clone(),
        secs: DEFAULT_GRANT_DURATION_SECS,
    };
    let err = env
        .service
        .history()
        .reveal(&alice, 0, PurchaseField::UnitPrice, Some(&slow))
        .await
        .expect_err("expired");
    assert!(matches!(err, LedgerError::GrantExpired));
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn grant_window_follows_config() {
    let mut config = LedgerConfig::new(DOMAIN);
    config.grant_duration_secs = 30;
    let env = TestEnv::with_config(config);
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let just_inside = SlowSigner {
        wallet: sealed_client::LocalWallet::from_seed([1; 32]),
        clock: env.clock.clone(),
        secs: 29,
    };
    let v = env
        .service
        .history()
        .reveal(&alice, 0, PurchaseField::ItemId, Some(&just_inside))
        .await
        .expect("still valid");
    assert_eq!(v, 42);

    let too_slow = SlowSigner {
        wallet: sealed_client::LocalWallet::from_seed([1; 32]),
        clock: env.clock.clone(),
        secs: 30,
    };
    assert!(matches!(
        env.service.history().reveal(&alice, 0, PurchaseField::ItemId, Some(&too_slow)).await,
        Err(LedgerError::GrantExpired)
    ));
}

#[tokio::test]
async fn unknown_handle_fails_before_signing() {
    let env = TestEnv::new();
    let watched = WatchedSigner {
        wallet: sealed_client::LocalWallet::from_seed([1; 32]),
        signed: AtomicUsize::new(0),
    };
    let stray = CiphertextHandle::new([0x55; 32], ValueType::Uint32);

    let err = env.service.decrypt(&[stray], Some(&watched)).await.expect_err("unknown");
    assert!(matches!(err, LedgerError::HandleNotFound(h) if h == stray));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(watched.signed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn decryption_needs_a_signer() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let receipt = env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let err = env.service.decrypt(&[receipt.handles.item_id], None).await.expect_err("no signer");
    assert!(matches!(err, LedgerError::SignerUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let locked = LockedWallet(alice);
    let err = env
        .service
        .decrypt(&[receipt.handles.item_id], Some(&locked))
        .await
        .expect_err("locked");
    assert!(matches!(err, LedgerError::SignerUnavailable(_)));
}

#[tokio::test]
async fn empty_request_is_a_validation_error() {
    let env = TestEnv::new();
    let err = env.service.decrypt(&[], Some(&env.alice)).await.expect_err("empty");
    assert!(matches!(err, LedgerError::NothingRequested));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn unready_decryption_is_a_precondition_failure() {
    let env = TestEnv::with_caps(|caps| {
        caps.decryption = Arc::new(Offline(CapabilityStatus::Failed("relayer down".into())));
    });
    let alice = env.alice.account();
    env.service.submit(Some(alice), SAMPLE).await.expect("submit");

    let err = env
        .service
        .history()
        .reveal_record(&alice, 0, Some(&env.alice))
        .await
        .expect_err("unavailable");
    assert!(matches!(err, LedgerError::DecryptionUnavailable(CapabilityStatus::Failed(_))));
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn malformed_plaintext_is_an_external_failure() {
    for reply in ["not-a-number", "4294967296"] {
        let env = TestEnv::with_caps(|caps| {
            caps.decryption = Arc::new(Garbled { inner: caps.decryption.clone(), reply });
        });
        let alice = env.alice.account();
        env.service.submit(Some(alice), SAMPLE).await.expect("submit");

        let err = env
            .service
            .history()
            .reveal(&alice, 0, PurchaseField::Quantity, Some(&env.alice))
            .await
            .expect_err("garbled");
        assert!(matches!(err, LedgerError::MalformedPlaintext { .. }), "{reply}: {err}");
        assert_eq!(err.kind(), ErrorKind::ExternalFailure);
    }
}

#[tokio::test]
async fn duplicate_handles_share_one_session() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let receipt = env.service.submit(Some(alice), SAMPLE).await.expect("submit");
    let h = receipt.handles.unit_price;

    let values = env.service.decrypt(&[h, h], Some(&env.alice)).await.expect("decrypt");
    assert_eq!(values.len(), 1);
    assert_eq!(values.get(&h), Some(1_999));
}

#[tokio::test]
async fn owner_can_only_decrypt_own_records_even_with_all_handles_public() {
    let env = TestEnv::new();
    let alice = env.alice.account();
    let bob = env.bob.account();
    let a = env.service.submit(Some(alice), SAMPLE).await.expect("alice");
    let b = env.service.submit(Some(bob), PurchaseInput::new(9, 9, 9)).await.expect("bob");

    let err = env
        .service
        .decrypt(&[b.handles.item_id, a.handles.item_id], Some(&env.alice))
        .await
        .expect_err("mixed");
    assert!(matches!(err, LedgerError::DecryptionDenied));

    let own = env.service.decrypt(&[b.handles.item_id], Some(&env.bob)).await.expect("bob own");
    assert_eq!(own.get(&b.handles.item_id), Some(9));
    let signer: &dyn GrantSigner = &env.bob;
    assert_eq!(signer.account(), bob);
}

// ---------- config / errors ----------

#[test]
fn config_loads_from_json() {
    let json = format!(
        r#"{{"domain":"{}","storage":{{"kind":"file","path":"/tmp/ledger.log"}}}}"#,
        DOMAIN
    );
    let config = LedgerConfig::from_json(&json).expect("parse");
    assert_eq!(config.domain, DOMAIN);
    assert_eq!(config.grant_duration_secs, DEFAULT_GRANT_DURATION_SECS);
    assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
    assert_eq!(config.storage, StorageConfig::File { path: "/tmp/ledger.log".into() });

    let minimal = LedgerConfig::from_json(&format!(r#"{{"domain":"{DOMAIN}"}}"#)).expect("parse");
    assert_eq!(minimal.storage, StorageConfig::Memory);
}

#[test]
fn invalid_config_is_rejected() {
    let zero = format!(r#"{{"domain":"{DOMAIN}","grant_duration_secs":0}}"#);
    assert!(matches!(LedgerConfig::from_json(&zero), Err(ConfigError::Invalid(_))));
    let zero_cap = format!(r#"{{"domain":"{DOMAIN}","notification_capacity":0}}"#);
    assert!(matches!(LedgerConfig::from_json(&zero_cap), Err(ConfigError::Invalid(_))));
    assert!(matches!(LedgerConfig::from_json(r#"{"domain":"0x12"}"#), Err(ConfigError::Parse(_))));
    assert!(LedgerConfig::load("/nonexistent/ledger.json").is_err());
}

#[test]
fn every_error_has_one_kind() {
    let h = CiphertextHandle::new([1; 32], ValueType::Uint32);
    let owner = purchase_ledger_primitives::AccountId::new([1; 32]);
    let cases = [
        (LedgerError::OwnerMissing, ErrorKind::Precondition),
        (LedgerError::SignerUnavailable("x".into()), ErrorKind::Precondition),
        (
            LedgerError::InvalidField { field: PurchaseField::Quantity, reason: "r" },
            ErrorKind::Validation,
        ),
        (LedgerError::ProofInvalid, ErrorKind::ExternalFailure),
        (LedgerError::HandleAliased(h), ErrorKind::ExternalFailure),
        (LedgerError::DecryptionDenied, ErrorKind::Authorization),
        (LedgerError::GrantExpired, ErrorKind::Authorization),
        (LedgerError::EmptyLedger(owner), ErrorKind::NotFound),
        (LedgerError::HandleNotFound(h), ErrorKind::NotFound),
    ];
    for (err, kind) in cases {
        assert_eq!(err.kind(), kind, "{err}");
    }
    assert!(ErrorKind::Precondition.is_input_problem());
    assert!(!ErrorKind::Authorization.is_input_problem());
}
