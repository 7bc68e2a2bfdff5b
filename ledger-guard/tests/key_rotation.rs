mod common;

use std::sync::Arc;

use common::{FlakyStore, seed_audit};
use ledger_guard::crypto::{DecryptionError, MasterKey};
use ledger_guard::rotation::{KeyRotationPipeline, RecordFailure, RotationError, RotationReport};
use ledger_guard::store::{AuditStore, MemoryStore, StoreError};

#[tokio::test]
async fn rotates_250_records_in_batches_of_100() {
    let store = Arc::new(MemoryStore::new());
    let old = MasterKey::generate();
    let new = MasterKey::generate();
    seed_audit(store.as_ref(), &old, 250).await;

    let pipeline = KeyRotationPipeline::new(store.clone(), old.clone(), new.clone(), 100).unwrap();
    let report = pipeline.run().await.unwrap();
    assert_eq!(
        report,
        RotationReport {
            scanned: 250,
            migrated: 250,
            already_current: 0,
            batches: 3,
        }
    );

    for (i, record) in store.audit_records().iter().enumerate() {
        let plain = new.open_str(&record.encrypted_payload).unwrap();
        assert_eq!(plain, format!("{{\"n\":{i}}}"));
        assert_eq!(
            old.open(&record.encrypted_payload),
            Err(DecryptionError::Authentication)
        );
    }

    // Rerun: nothing left to do
    let rerun = pipeline.run().await.unwrap();
    assert_eq!(rerun.migrated, 0);
    assert_eq!(rerun.already_current, 250);
}

#[tokio::test]
async fn resumes_after_partial_run() {
    let store = Arc::new(MemoryStore::new());
    let old = MasterKey::generate();
    let new = MasterKey::generate();
    seed_audit(store.as_ref(), &old, 30).await;

    // Simulate a run killed after the first ten records
    for record in store.scan_audit(None, 10).await.unwrap() {
        let plain = old.open(&record.encrypted_payload).unwrap();
        store
            .update_audit_payload(record.id, &new.seal(&plain).unwrap())
            .await
            .unwrap();
    }

    let report = KeyRotationPipeline::new(store.clone(), old, new.clone(), 7)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.already_current, 10);
    assert_eq!(report.migrated, 20);
    assert_eq!(report.batches, 5);
    assert!(
        store
            .audit_records()
            .iter()
            .all(|r| new.open(&r.encrypted_payload).is_ok())
    );
}

#[tokio::test]
async fn corrupt_record_aborts_with_its_id() {
    let store = Arc::new(MemoryStore::new());
    let old = MasterKey::generate();
    let new = MasterKey::generate();
    seed_audit(store.as_ref(), &old, 20).await;
    store.update_audit_payload(13, "not-a-blob").await.unwrap();

    let err = KeyRotationPipeline::new(store.clone(), old.clone(), new.clone(), 5)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    match err {
        RotationError::Record {
            record_id,
            source: RecordFailure::Decrypt(DecryptionError::FieldCount(1)),
        } => assert_eq!(record_id, 13),
        other => panic!("unexpected error: {other:?}"),
    }

    let records = store.audit_records();
    assert!(records[..12].iter().all(|r| new.open(&r.encrypted_payload).is_ok()));
    assert!(records[13..].iter().all(|r| old.open(&r.encrypted_payload).is_ok()));
}

#[tokio::test]
async fn transient_persist_failure_is_retried() {
    let store = Arc::new(FlakyStore::new());
    let old = MasterKey::generate();
    let new = MasterKey::generate();
    seed_audit(&store.inner, &old, 5).await;
    store.fail_updates(3, 2);

    let report = KeyRotationPipeline::new(store.clone(), old, new.clone(), 100)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.migrated, 5);
    assert_eq!(store.update_attempts(3), 3);
    assert_eq!(store.update_attempts(2), 1);
    assert!(
        store
            .inner
            .audit_records()
            .iter()
            .all(|r| new.open(&r.encrypted_payload).is_ok())
    );
}

#[tokio::test]
async fn persistent_persist_failure_aborts_without_counting() {
    let store = Arc::new(FlakyStore::new());
    let old = MasterKey::generate();
    let new = MasterKey::generate();
    seed_audit(&store.inner, &old, 4).await;
    store.fail_updates(2, u32::MAX);

    let err = KeyRotationPipeline::new(store.clone(), old.clone(), new, 100)
        .unwrap()
        .with_persist_attempts(3)
        .run()
        .await
        .unwrap_err();

    match err {
        RotationError::Record {
            record_id,
            source:
                RecordFailure::Persist {
                    attempts,
                    source: StoreError::Unavailable(_),
                },
        } => {
            assert_eq!(record_id, 2);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.update_attempts(2), 3);

    // Record 2 still holds its old payload
    let records = store.inner.audit_records();
    assert!(old.open(&records[1].encrypted_payload).is_ok());
}
