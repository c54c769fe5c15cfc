//! Public validation lookups over signed documents.

mod common;

use common::Harness;
use pdf_seal::model::{AccessGate, DocumentStatus, SignerInfo, SigningRequest};
use pdf_seal::validation::{CodeSubmission, ValidationGateway, ValidationOutcome};
use pdf_seal::Error;
use uuid::Uuid;

async fn signed_with_gate(h: &Harness, owner: Uuid, gate: AccessGate) -> Uuid {
    let id = h.draft_with_gate(Some(owner), 1, gate).await;
    let mut signer = SignerInfo::new("Bruno Costa");
    signer.email = Some("bruno@example.com".to_string());
    h.pipeline
        .sign(SigningRequest::new(id, Some(owner), signer))
        .await
        .unwrap();
    id
}

fn gateway(h: &Harness) -> ValidationGateway {
    ValidationGateway::new(&h.config, h.db.clone(), h.db.clone())
}

#[tokio::test]
async fn test_gated_document_reveals_nothing_without_code() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let id = signed_with_gate(&h, owner, AccessGate::with_code("Harbor-42")).await;
    let gateway = gateway(&h);

    let outcome = gateway.resolve(id, None, CodeSubmission::Query, "192.0.2.10").await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json, serde_json::json!({ "requiresCode": true }));

    let outcome = gateway
        .resolve(id, Some("harbor-42"), CodeSubmission::Form, "192.0.2.10")
        .await
        .unwrap();
    let ValidationOutcome::Resolved { document, events } = outcome else {
        panic!("expected resolved outcome");
    };
    assert_eq!(document.id, id);
    assert_eq!(document.status, DocumentStatus::Signed);
    assert!(document.requires_access_code);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signer_name, "Bruno Costa");

    let json = serde_json::to_string(&document).unwrap();
    assert!(!json.contains("Harbor-42"));
    assert!(!json.contains("originals/"));
}

#[tokio::test]
async fn test_failed_codes_lock_out_one_client() {
    let h = Harness::new();
    let id = signed_with_gate(&h, Uuid::new_v4(), AccessGate::with_code("Harbor-42")).await;
    let gateway = gateway(&h);

    for _ in 0..5 {
        let result = gateway.resolve(id, Some("guess"), CodeSubmission::Form, "192.0.2.11").await;
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }
    // Locked out even with the right code.
    assert!(matches!(
        gateway.resolve(id, Some("Harbor-42"), CodeSubmission::Form, "192.0.2.11").await,
        Err(Error::RateLimited { .. })
    ));
    assert!(matches!(
        gateway.resolve(id, Some("Harbor-42"), CodeSubmission::Form, "192.0.2.12").await,
        Ok(ValidationOutcome::Resolved { .. })
    ));
}

#[tokio::test]
async fn test_canceled_documents_stay_visible() {
    let h = Harness::new();
    let owner = Uuid::new_v4();
    let id = signed_with_gate(&h, owner, AccessGate::default()).await;
    h.lifecycle.cancel(owner, id).await.unwrap();

    let outcome = gateway(&h)
        .resolve(id, None, CodeSubmission::Query, "192.0.2.13")
        .await
        .unwrap();
    let ValidationOutcome::Resolved { document, .. } = outcome else {
        panic!("expected resolved outcome");
    };
    assert_eq!(document.status, DocumentStatus::Canceled);
    assert!(document.canceled_at.is_some());

    let verification = h.verification.verify_document(id, None).await.unwrap();
    assert_eq!(verification.hash_match, Some(true));
    assert!(verification.messages.iter().any(|m| m.contains("canceled")));
}

#[tokio::test]
async fn test_verification_honors_access_code() {
    let h = Harness::new();
    let id = signed_with_gate(&h, Uuid::new_v4(), AccessGate::with_code("Harbor-42")).await;

    assert!(matches!(
        h.verification.verify_document(id, None).await,
        Err(Error::Forbidden(_))
    ));
    let result = h.verification.verify_document(id, Some("HARBOR-42")).await.unwrap();
    assert_eq!(result.hash_match, Some(true));
    assert!(result.has_visual_seal);

    let draft = h.draft(None, 1).await;
    assert!(matches!(
        h.verification.verify_document(draft, None).await,
        Err(Error::NotFound(_))
    ));
}
