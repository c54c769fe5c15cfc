//! HTTP surface, driven through the router without a socket.

mod common;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{sample_pdf, MASTER_KEY};
use pdf_seal::api::{router, AppState, FORWARDED_FOR_HEADER, USER_ID_HEADER};
use pdf_seal::config::SealConfig;
use pdf_seal::store::{MemoryDatabase, MemoryObjectStorage};

fn config() -> SealConfig {
    SealConfig::new()
        .with_master_key(MASTER_KEY)
        .unwrap()
        .with_base_url("https://seal.example.com")
}

fn app() -> Router {
    app_with(config())
}

fn app_with(config: SealConfig) -> Router {
    router(AppState::with_database(
        config,
        Arc::new(MemoryObjectStorage::default()),
        Arc::new(MemoryDatabase::new()),
    ))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn json_request(method: &str, uri: &str, user: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Attach the socket peer and, optionally, a forwarded-for header.
fn via(mut request: Request<Body>, peer: [u8; 4], forwarded: Option<&str>) -> Request<Body> {
    let addr = SocketAddr::from((IpAddr::from(peer), 40_000));
    request.extensions_mut().insert(ConnectInfo(addr));
    if let Some(forwarded) = forwarded {
        request
            .headers_mut()
            .insert(FORWARDED_FOR_HEADER, forwarded.parse().unwrap());
    }
    request
}

async fn upload(app: &Router, owner: Uuid, access_code: Option<&str>) -> Uuid {
    let uri = match access_code {
        Some(code) => format!("/documents?title=Lease&accessCode={}", code),
        None => "/documents?title=Lease".to_string(),
    };
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(USER_ID_HEADER, owner.to_string())
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(sample_pdf(2)))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "draft");
    body["documentId"].as_str().unwrap().parse().unwrap()
}

fn sign_request(owner: Uuid, document_id: Uuid) -> Request<Body> {
    json_request("POST", "/sign", Some(owner), sign_body(document_id))
}

fn sign_body(document_id: Uuid) -> Value {
    json!({
        "documentId": document_id,
        "placements": [{ "page": 1, "x": 0.5, "y": 0.9, "width": 180, "height": 60 }],
        "qrConfig": { "pages": "last", "position": "bottom_right" },
        "signer": { "name": "Ana Souza", "email": "ana@example.com" }
    })
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "pdf_seal");
}

#[tokio::test]
async fn test_missing_identity_is_401_in_callers_language() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/certificates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_LANGUAGE, "pt-BR,pt;q=0.9")
        .body(Body::from("{}"))
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("x-error-code").unwrap(), "UNAUTHORIZED");
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Autenticação necessária");
}

#[tokio::test]
async fn test_invalid_certificate_request_is_400() {
    let app = app();
    let owner = Uuid::new_v4();
    let request = json_request(
        "POST",
        "/certificates",
        Some(owner),
        json!({
            "type": "personal",
            "keyStrength": 1024,
            "validityYears": 1,
            "subjectAttributes": { "commonName": "Ana Souza" },
            "passphrase": "correct horse battery"
        }),
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_KEY_STRENGTH");

    let request = json_request("POST", "/certificates", Some(owner), json!({ "type": "personal" }));
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_sign_then_validate_with_access_code() {
    let app = app();
    let owner = Uuid::new_v4();
    let id = upload(&app, owner, Some("Sunflower")).await;

    let (status, _, signed) = send(&app, sign_request(owner, id)).await;
    assert_eq!(status, StatusCode::OK, "{}", signed);
    assert_eq!(signed["hash"].as_str().unwrap().len(), 64);
    assert_eq!(signed["hasPkiSignature"], false);
    assert_eq!(signed["validationUrl"], format!("https://seal.example.com/validate/{}", id));

    // No code: nothing but the flag.
    let (status, _, body) = send(&app, get(&format!("/validate/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "requiresCode": true }));

    // Correct code, different case.
    let (status, _, body) = send(&app, get(&format!("/validate/{}?code=sUNFLOWER", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["status"], "signed");
    assert_eq!(body["document"]["requiresAccessCode"], true);
    assert!(body["document"].get("accessCode").is_none());
    assert!(!body.to_string().contains("Sunflower"));
    assert_eq!(body["events"][0]["signerName"], "Ana Souza");

    let (status, _, body) =
        send(&app, get(&format!("/verify-signature/{}?code=Sunflower", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classification"], "visual_only");
    assert_eq!(body["hashMatch"], true);

    // Signing again conflicts.
    let (status, _, body) = send(&app, sign_request(owner, id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_SIGNED");
}

#[tokio::test]
async fn test_wrong_codes_are_403_then_429() {
    let app = app();
    let owner = Uuid::new_v4();
    let id = upload(&app, owner, Some("Sunflower")).await;
    let (status, _, _) = send(&app, sign_request(owner, id)).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..5 {
        let uri = format!("/validate/{}", id);
        let request = json_request("POST", &uri, None, json!({ "code": "tulip" }));
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.get("document").is_none());
    }
    let uri = format!("/validate/{}", id);
    let request = json_request("POST", &uri, None, json!({ "code": "Sunflower" }));
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.get(header::RETRY_AFTER).is_some());
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_unknown_and_draft_documents_are_404() {
    let app = app();
    let owner = Uuid::new_v4();
    let draft = upload(&app, owner, None).await;

    for id in [draft, Uuid::new_v4()] {
        let (status, _, body) = send(&app, get(&format!("/validate/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_signed_files_are_served_and_originals_are_not() {
    let app = app();
    let owner = Uuid::new_v4();
    let id = upload(&app, owner, None).await;
    let (_, _, signed) = send(&app, sign_request(owner, id)).await;

    let path = signed["signedUrl"]
        .as_str()
        .unwrap()
        .trim_start_matches("memory://objects/")
        .to_string();
    assert!(path.starts_with("signed/"));
    let response = app.clone().oneshot(get(&format!("/files/{}", path))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF-"));

    let (status, _, _) = send(&app, get(&format!("/files/originals/{}.pdf", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_rejection_names_offenders() {
    let app = app();
    let owner = Uuid::new_v4();
    let fresh = upload(&app, owner, None).await;
    let signed = upload(&app, owner, None).await;
    let (status, _, _) = send(&app, sign_request(owner, signed)).await;
    assert_eq!(status, StatusCode::OK);

    let request = json_request(
        "POST",
        "/sign/batch",
        Some(owner),
        json!({
            "documentIds": [fresh, signed],
            "signerInputs": { "signer": { "name": "Ana Souza" } }
        }),
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "BATCH_REJECTED");
    assert_eq!(body["error"]["details"]["offenders"][0]["document_id"], signed.to_string());

    let request = json_request(
        "POST",
        "/sign/batch",
        Some(owner),
        json!({
            "documentIds": [fresh],
            "signerInputs": { "signer": { "name": "Ana Souza" } }
        }),
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["successful"], 1);
}

#[tokio::test]
async fn test_cancel_requires_owner() {
    let app = app();
    let owner = Uuid::new_v4();
    let id = upload(&app, owner, None).await;

    let (status, _, _) = send(
        &app,
        json_request("POST", &format!("/documents/{}/cancel", id), Some(Uuid::new_v4()), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(
        &app,
        json_request("POST", &format!("/documents/{}/cancel", id), Some(owner), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");
}

async fn gated_signed_document(app: &Router) -> Uuid {
    let owner = Uuid::new_v4();
    let id = upload(app, owner, Some("Sunflower")).await;
    let request = sign_request(owner, id);
    let (status, _, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    id
}

fn wrong_code(id: Uuid) -> Request<Body> {
    json_request("POST", &format!("/validate/{}", id), None, json!({ "code": "tulip" }))
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_lockout() {
    let app = app();
    let id = gated_signed_document(&app).await;
    let peer = [203, 0, 113, 9];

    let mut statuses = Vec::new();
    for attempt in 0..12 {
        let forwarded = format!("198.51.100.{}", attempt);
        let (status, _, _) = send(&app, via(wrong_code(id), peer, Some(&forwarded))).await;
        statuses.push(status);
    }
    assert!(statuses[..5].iter().all(|s| *s == StatusCode::FORBIDDEN));
    assert!(statuses[5..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));

    let request = json_request(
        "POST",
        &format!("/validate/{}", id),
        None,
        json!({ "code": "Sunflower" }),
    );
    let (status, _, _) = send(&app, via(request, peer, Some("192.0.2.77"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_the_client_address() {
    let proxy = [10, 0, 0, 1];
    let app = app_with(config().with_trusted_proxies([IpAddr::from(proxy)]));
    let id = gated_signed_document(&app).await;

    for _ in 0..5 {
        let (status, _, _) = send(&app, via(wrong_code(id), proxy, Some("198.51.100.7"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    let (status, _, _) = send(&app, via(wrong_code(id), proxy, Some("198.51.100.7"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Spoofed leftmost hop; the proxy appended the real address.
    let forwarded = "198.51.100.8, 198.51.100.7";
    let (status, _, _) = send(&app, via(wrong_code(id), proxy, Some(forwarded))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let uri = format!("/validate/{}?code=sunflower", id);
    let (status, _, body) = send(&app, via(get(&uri), proxy, Some("198.51.100.8"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["status"], "signed");
}
