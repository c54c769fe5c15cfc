//! Batch pre-flight and settle-all execution.

mod common;

use common::Harness;
use pdf_seal::error::OffenseReason;
use pdf_seal::model::{DocumentStatus, Placement, SignerInfo, SigningRequest};
use pdf_seal::signing::{BatchSignerInput, MAX_PREFLIGHT_IDS};
use pdf_seal::store::DocumentRepository;
use pdf_seal::Error;
use uuid::Uuid;

fn input() -> BatchSignerInput {
    BatchSignerInput {
        signer: SignerInfo::new("Carlos Lima"),
        placements: vec![Placement::new(1, 0.1, 0.8, 160.0, 50.0)],
        ..Default::default()
    }
}

async fn drafts(h: &Harness, owner: Uuid, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(h.draft(Some(owner), 1).await);
    }
    ids
}

#[tokio::test]
async fn test_one_signed_document_rejects_the_batch() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let mut ids = drafts(&h, owner, 20).await;

    let signed = h.draft(Some(owner), 1).await;
    h.pipeline
        .sign(SigningRequest::new(signed, Some(owner), SignerInfo::new("Carlos Lima")))
        .await
        .unwrap();
    ids.push(signed);

    let objects_before = h.storage.inner().len();
    let events_before = h.db.event_count();

    match h.batch.sign_batch(owner, &ids, input()).await {
        Err(Error::BatchRejected { offenders, .. }) => {
            assert_eq!(offenders.len(), 1);
            assert_eq!(offenders[0].document_id, signed);
            assert_eq!(offenders[0].reason, OffenseReason::AlreadySigned);
        },
        other => panic!("expected batch rejection, got {:?}", other.map(|r| r.total)),
    }

    assert_eq!(h.storage.inner().len(), objects_before);
    assert_eq!(h.db.event_count(), events_before);
    for id in &ids[..20] {
        let document = DocumentRepository::get(&*h.db, *id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Draft);
    }
}

#[tokio::test]
async fn test_foreign_and_duplicate_ids_are_offenders() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let mine = h.draft(Some(owner), 1).await;
    let theirs = h.draft(Some(Uuid::new_v4()), 1).await;
    let missing = Uuid::new_v4();

    let err = h
        .batch
        .sign_batch(owner, &[mine, theirs, missing, mine], input())
        .await
        .unwrap_err();
    let Error::BatchRejected { offenders, .. } = err else {
        panic!("expected batch rejection");
    };
    let reasons: Vec<_> = offenders.iter().map(|o| (o.document_id, o.reason)).collect();
    assert_eq!(
        reasons,
        vec![
            (theirs, OffenseReason::NotFound),
            (missing, OffenseReason::NotFound),
            (mine, OffenseReason::Duplicate),
        ]
    );
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let ids = drafts(&h, owner, 21).await;

    match h.batch.sign_batch(owner, &ids, input()).await {
        Err(Error::BatchRejected { offenders, .. }) => assert!(offenders.is_empty()),
        other => panic!("expected batch rejection, got {:?}", other.map(|r| r.total)),
    }
    assert!(matches!(
        h.batch.sign_batch(owner, &[], input()).await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_huge_batch_is_refused_unread() {
    let h = Harness::new();
    let ids: Vec<Uuid> = (0..=MAX_PREFLIGHT_IDS).map(|_| Uuid::new_v4()).collect();

    match h.batch.preflight(Uuid::new_v4(), &ids).await {
        Err(Error::Validation(msg)) => {
            assert!(msg.contains(&format!("at most {}", MAX_PREFLIGHT_IDS)), "{}", msg);
        },
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_one_download_failure_does_not_stop_the_others() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let ids = drafts(&h, owner, 10).await;

    let broken = ids[4];
    let original = DocumentRepository::get(&*h.db, broken).await.unwrap().unwrap().original_path;
    h.storage.fail_downloads_of(&original);

    let result = h.batch.sign_batch(owner, &ids, input()).await.unwrap();
    assert_eq!(result.total, 10);
    assert_eq!(result.successful, 9);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_ids(), vec![broken]);

    let failure = result.results.iter().find(|r| r.document_id == broken).unwrap();
    let error = failure.error.as_ref().unwrap();
    assert_eq!(error.code, "DEPENDENCY_FAILURE");
    assert!(error.retryable);
    assert!(!error.message.contains("connection reset"));

    // Results keep the request order.
    let order: Vec<Uuid> = result.results.iter().map(|r| r.document_id).collect();
    assert_eq!(order, ids);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["successful"], 9);
    assert!(json["results"][0]["documentId"].is_string());
}
