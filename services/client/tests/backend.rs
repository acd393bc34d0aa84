//! Drives the HTTP adapter and the scan flow against an in-process mock of
//! the analysis backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use client_lib::adapters::{FileSessionStore, HttpBackendAdapter};
use gougestop_core::domain::{DocumentType, SessionToken, UsState, Upload};
use gougestop_core::flow::{FlowPorts, ScanFlow, Screen, ScreenKind, ShareStatus};
use gougestop_core::ports::{
    AnalysisService, AuthService, BillingService, PortError, SessionStore, ShareService,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

//=========================================================================================
// Mock backend
//=========================================================================================

#[derive(Debug, Clone)]
struct AnalyzeHit {
    state: String,
    token: Option<String>,
    file_name: Option<String>,
    bytes: usize,
}

#[derive(Default)]
struct Recorded {
    analyze: Vec<AnalyzeHit>,
    shares: Vec<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

const LIVE_TOKEN: &str = "tok-live";

fn bill_payload() -> Value {
    json!({
        "success": true,
        "document_type": "bill",
        "provider_name": "Sunrise Labs",
        "date_of_service": "2026-02-11",
        "items": [
            {"cpt_code": "80053", "test_description": "Comprehensive metabolic panel",
             "medicare_allowed": 10.56, "provider_charge": 312.0, "markup_dollars": 301.44, "markup_percent": 2854.5},
            {"cpt_code": "85025", "test_description": "CBC with differential",
             "medicare_allowed": 7.77, "provider_charge": null}
        ],
        "total_medicare_allowed": 18.33,
        "total_provider_charges": 312.0,
        "total_markup": 301.44,
        "average_markup_percent": 2854.5,
        "coverage_alerts": [
            {"cpt_code": "80053", "alert_level": "flag", "alert_title": "Frequency limit exceeded",
             "denial_rate": 18.2, "frequency_limit": {"limit": 1, "period": "year", "source": "CMS"}}
        ],
        "nearby_labs": [],
        "data_disclaimer": "Rates from the 2026 Clinical Lab Fee Schedule."
    })
}

async fn analyze(
    State(recorded): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut file_name = None;
    let mut bytes = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            file_name = field.file_name().map(str::to_string);
            bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        }
    }

    let state = params.get("state").cloned().unwrap_or_default();
    recorded.lock().unwrap().analyze.push(AnalyzeHit {
        state: state.clone(),
        token: params.get("token").cloned(),
        file_name,
        bytes,
    });

    match state.as_str() {
        "NY" => (
            StatusCode::FORBIDDEN,
            Json(json!({"success": true, "detail": "Free scan limit reached"})),
        ),
        "CA" => (
            StatusCode::OK,
            Json(json!({"success": false, "error": "Could not read document"})),
        ),
        "FL" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "OCR backend unavailable"})),
        ),
        "WA" => (StatusCode::BAD_GATEWAY, Json(json!({}))),
        "OR" => (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token expired"}))),
        _ => (StatusCode::OK, Json(bill_payload())),
    }
}

async fn send_code(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "limited@example.com" {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"detail": "Too many code requests. Try again later."})),
        )
    } else {
        (StatusCode::OK, Json(json!({"success": true})))
    }
}

async fn verify_code(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["code"] == "123456" {
        (StatusCode::OK, Json(json!({"token": LIVE_TOKEN})))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Invalid or expired code"})),
        )
    }
}

async fn check_token(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"valid": body["token"] == LIVE_TOKEN}))
}

async fn usage(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({"scans_remaining": 2, "is_paid": false}))
}

async fn create_checkout(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["token"] == "" {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Sign in to upgrade"})),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({"checkout_url": "https://checkout.stripe.test/c/pay_123"})),
        )
    }
}

async fn share_results(
    State(recorded): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorded.lock().unwrap().shares.push(body.clone());
    if body["recipient_email"] == "bounce@example.com" {
        return (
            StatusCode::OK,
            Json(json!({"success": false, "detail": "Recipient rejected"})),
        );
    }
    let html = body["results_html"].as_str().unwrap_or("");
    if html.contains("Your GougeStop Results") {
        (StatusCode::OK, Json(json!({"success": true})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"detail": "Missing results"})))
    }
}

async fn spawn_backend() -> (String, Shared) {
    let recorded = Shared::default();
    let app = Router::new()
        .route("/analyze", post(analyze))
        .route("/auth/send-code", post(send_code))
        .route("/auth/verify-code", post(verify_code))
        .route("/auth/check-token", post(check_token))
        .route("/auth/usage", post(usage))
        .route("/stripe/create-checkout", post(create_checkout))
        .route("/share-results", post(share_results))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), recorded)
}

fn adapter(base_url: &str) -> Arc<HttpBackendAdapter> {
    Arc::new(HttpBackendAdapter::new(base_url, Duration::from_secs(5)).unwrap())
}

fn photo() -> Upload {
    Upload::new("bill.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
}

fn state(code: &str) -> UsState {
    UsState::parse(code).unwrap()
}

fn ports(backend: Arc<HttpBackendAdapter>, store: Arc<FileSessionStore>) -> FlowPorts {
    FlowPorts {
        auth: backend.clone(),
        analysis: backend.clone(),
        billing: backend.clone(),
        sharing: backend,
        store,
    }
}

//=========================================================================================
// Adapter tests
//=========================================================================================

#[tokio::test]
async fn analyze_uploads_the_file_with_state_and_token() {
    let (url, recorded) = spawn_backend().await;
    let backend = adapter(&url);
    let token = SessionToken::new(LIVE_TOKEN);

    let result = backend.analyze(&photo(), state("TX"), Some(&token)).await.unwrap();
    assert_eq!(result.document_type, DocumentType::Bill);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[1].provider_charge, None);
    assert_eq!(result.total_markup, Some(301.44));

    let hits = recorded.lock().unwrap().analyze.clone();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].state, "TX");
    assert_eq!(hits[0].token.as_deref(), Some(LIVE_TOKEN));
    assert_eq!(hits[0].file_name.as_deref(), Some("bill.jpg"));
    assert_eq!(hits[0].bytes, 4);
}

#[tokio::test]
async fn analyze_without_a_token_omits_it() {
    let (url, recorded) = spawn_backend().await;
    adapter(&url).analyze(&photo(), state("TX"), None).await.unwrap();
    assert_eq!(recorded.lock().unwrap().analyze[0].token, None);
}

#[tokio::test]
async fn analyze_maps_each_failure_mode() {
    let (url, _) = spawn_backend().await;
    let backend = adapter(&url);

    let outcome = |code: &'static str| {
        let backend = backend.clone();
        async move { backend.analyze(&photo(), state(code), None).await.unwrap_err() }
    };

    // 403 wins over a body that claims success.
    assert_eq!(outcome("NY").await, PortError::LimitReached);
    assert_eq!(outcome("CA").await, PortError::Server("Could not read document".to_string()));
    assert_eq!(outcome("FL").await, PortError::Server("OCR backend unavailable".to_string()));
    assert_eq!(outcome("WA").await, PortError::Server("Server error: 502".to_string()));
    assert_eq!(outcome("OR").await, PortError::Auth("Token expired".to_string()));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = adapter(&format!("http://{}", addr))
        .analyze(&photo(), state("TX"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn auth_endpoints_round_trip() {
    let (url, _) = spawn_backend().await;
    let backend = adapter(&url);

    assert_eq!(
        backend.send_code("limited@example.com").await.unwrap_err(),
        PortError::Validation("Too many code requests. Try again later.".to_string())
    );
    backend.send_code("pat@example.com").await.unwrap();

    assert_eq!(
        backend.verify_code("pat@example.com", "999999").await.unwrap_err(),
        PortError::Auth("Invalid or expired code".to_string())
    );
    let token = backend.verify_code("pat@example.com", "123456").await.unwrap();
    assert_eq!(token.as_str(), LIVE_TOKEN);

    assert!(backend.check_token(&token).await.unwrap());
    assert!(!backend.check_token(&SessionToken::new("stale")).await.unwrap());

    let usage = backend.fetch_usage(&token).await.unwrap();
    assert_eq!(usage.scans_remaining, 2);
    assert!(!usage.is_paid);
}

#[tokio::test]
async fn checkout_and_share() {
    let (url, recorded) = spawn_backend().await;
    let backend = adapter(&url);
    let token = SessionToken::new(LIVE_TOKEN);

    assert_eq!(
        backend.create_checkout(Some(&token)).await.unwrap(),
        "https://checkout.stripe.test/c/pay_123"
    );
    assert_eq!(
        backend.create_checkout(None).await.unwrap_err(),
        PortError::Server("Sign in to upgrade".to_string())
    );

    backend
        .share_results(Some(&token), "doc@example.com", "<h2>Your GougeStop Results</h2>")
        .await
        .unwrap();
    assert_eq!(
        backend
            .share_results(Some(&token), "bounce@example.com", "<h2>Your GougeStop Results</h2>")
            .await
            .unwrap_err(),
        PortError::Server("Recipient rejected".to_string())
    );

    let shares = recorded.lock().unwrap().shares.clone();
    assert_eq!(shares[0]["token"], LIVE_TOKEN);
    assert_eq!(shares[0]["recipient_email"], "doc@example.com");
}

//=========================================================================================
// Full flow
//=========================================================================================

#[tokio::test]
async fn sign_in_scan_share_and_hit_the_paywall() {
    let (url, recorded) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path().join("session.json")));
    let backend = adapter(&url);

    // First run: email verification stores the token.
    let mut flow = ScanFlow::new(ports(backend.clone(), store.clone()), UsState::default());
    flow.resume_session().await.unwrap();
    flow.request_code("pat@example.com").await.unwrap();
    flow.verify_code("123456").await.unwrap();
    assert_eq!(store.load_token().unwrap(), Some(SessionToken::new(LIVE_TOKEN)));

    // Second run: the cached token is revalidated and the gate is skipped.
    let mut flow = ScanFlow::new(ports(backend.clone(), store.clone()), UsState::default());
    assert_eq!(flow.resume_session().await.unwrap(), &Screen::Capture);
    assert_eq!(flow.usage().unwrap().scans_remaining, 2);

    flow.attach_file(photo()).unwrap();
    assert_eq!(flow.submit().await.unwrap().kind(), ScreenKind::Results);
    assert_eq!(flow.usage().unwrap().scans_remaining, 1);

    let status = flow.share_results("doc@example.com").await.unwrap();
    assert_eq!(status, ShareStatus::Sent);
    let html = recorded.lock().unwrap().shares[0]["results_html"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(html.contains("Sunrise Labs \u{00B7} 2026-02-11 (Bill)"));
    assert!(html.contains("Coverage Alerts (1)"));

    let status = flow.share_results("bounce@example.com").await.unwrap();
    assert_eq!(status, ShareStatus::Failed("Recipient rejected".to_string()));
    assert_eq!(flow.screen().kind(), ScreenKind::Results);

    flow.reset().unwrap();
    flow.select_state("NY").unwrap();
    flow.attach_file(photo()).unwrap();
    assert_eq!(flow.submit().await.unwrap(), &Screen::Paywall);
    assert_eq!(
        flow.start_checkout().await.unwrap(),
        "https://checkout.stripe.test/c/pay_123"
    );
}

#[tokio::test]
async fn stale_cached_token_is_cleared() {
    let (url, _) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path().join("session.json")));
    store.save_token(&SessionToken::new("stale")).unwrap();

    let mut flow = ScanFlow::new(ports(adapter(&url), store.clone()), UsState::default());
    flow.resume_session().await.unwrap();

    assert!(!flow.has_access());
    assert_eq!(store.load_token().unwrap(), None);
}

#[tokio::test]
async fn backend_error_lands_on_the_error_screen_and_resets() {
    let (url, _) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path().join("session.json")));

    let mut flow = ScanFlow::new(ports(adapter(&url), store), UsState::default());
    flow.redeem_invite("GOUGESTOP2026").unwrap();
    flow.select_state("CA").unwrap();
    flow.attach_file(photo()).unwrap();

    assert_eq!(
        flow.submit().await.unwrap(),
        &Screen::Error("Could not read document".to_string())
    );
    flow.reset().unwrap();
    assert_eq!(flow.screen(), &Screen::Capture);
    assert!(flow.upload().is_none());
    assert_eq!(flow.selected_state().code(), "CA");
}
