//! Certificate issuance, rotation and passphrase checks.

mod common;

use chrono::Utc;
use common::{issue_request, Harness, PASSPHRASE};
use pdf_seal::store::ObjectStorage;
use pdf_seal::Error;
use uuid::Uuid;

#[tokio::test]
async fn test_validity_matches_requested_years() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let record = h.issuer.issue(issue_request(owner, 3)).await.unwrap();

    let span = record.valid_until - record.valid_from;
    let expected = chrono::Duration::days(3 * 365);
    assert!((span - expected).num_days().abs() <= 2, "span was {} days", span.num_days());
    assert!(record.valid_from <= Utc::now());
    assert!(record.is_active);
    assert_eq!(record.fingerprint.len(), 64);
    assert!(h.storage.inner().contains(&record.storage_path));
}

#[tokio::test]
async fn test_second_issue_leaves_one_active() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let first = h.issuer.issue(issue_request(owner, 1)).await.unwrap();
    let second = h.issuer.issue(issue_request(owner, 1)).await.unwrap();

    let all = h.vault.list(owner).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
    assert_eq!(h.vault.active_for(owner).await.unwrap().unwrap().id, second.id);

    // Switching back is one atomic step as well.
    h.vault.activate(owner, first.id).await.unwrap();
    let all = h.vault.list(owner).await.unwrap();
    assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
    assert_eq!(h.vault.active_for(owner).await.unwrap().unwrap().id, first.id);
}

#[tokio::test]
async fn test_concurrent_issues_leave_one_active() {
    let h = Harness::new();
    let owner = Uuid::new_v4();

    let (a, b) = tokio::join!(
        h.issuer.issue(issue_request(owner, 1)),
        h.issuer.issue(issue_request(owner, 2))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let all = h.vault.list(owner).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
    let active = h.vault.active_for(owner).await.unwrap().unwrap();
    assert!(active.id == a.id || active.id == b.id);
}

#[tokio::test]
async fn test_rotation_keeps_every_row() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let first = h.issuer.issue(issue_request(owner, 1)).await.unwrap();
    let second = h.issuer.issue(issue_request(owner, 1)).await.unwrap();
    h.vault.revoke(owner, first.id, None).await.unwrap();
    let third = h.issuer.issue(issue_request(owner, 1)).await.unwrap();
    h.vault.activate(owner, second.id).await.unwrap();

    let ids: Vec<Uuid> = h.vault.list(owner).await.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 3);
    for id in [first.id, second.id, third.id] {
        assert!(ids.contains(&id));
    }
}

#[tokio::test]
async fn test_stored_secrets_are_encrypted() {
    let h = Harness::new();
    let record = h.issuer.issue(issue_request(Uuid::new_v4(), 1)).await.unwrap();
    assert!(!record.encrypted_passphrase.contains(PASSPHRASE));

    let blob = h.storage.download(&record.storage_path).await.unwrap();
    assert!(openssl::pkcs12::Pkcs12::from_der(&blob).is_err());
}

#[tokio::test]
async fn test_passphrase_validation_is_opaque() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let record = h.issuer.issue(issue_request(owner, 1)).await.unwrap();

    assert!(h.vault.validate_passphrase(owner, record.id, PASSPHRASE).await.unwrap());
    assert!(!h.vault.validate_passphrase(owner, record.id, "wrong passphrase").await.unwrap());
    assert!(matches!(
        h.vault.validate_passphrase(Uuid::new_v4(), record.id, PASSPHRASE).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_revoked_certificate_is_kept_and_unusable() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let record = h.issuer.issue(issue_request(owner, 1)).await.unwrap();

    let revoked = h
        .vault
        .revoke(owner, record.id, Some("key compromise".to_string()))
        .await
        .unwrap();
    assert!(!revoked.is_active);
    assert!(revoked.revoked_at.is_some());
    assert_eq!(h.vault.list(owner).await.unwrap().len(), 1);
    assert!(matches!(
        h.vault.revoke(owner, record.id, None).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(h.vault.activate(owner, record.id).await, Err(Error::Conflict(_))));
}
