//! Authentication Flow Tests
//!
//! Verifies both grant flows against a wiremock server:
//! - On-premise password grant (`/api/Account/Authenticate`, token in `result`)
//! - Cloud refresh-token grant (identity endpoint, token in `access_token`)
//! - Failure handling and local preconditions

use orchestrator_sdk::{Credentials, OrchestratorError, OrchestratorSession, SessionConfig};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn on_premise_config(server: &MockServer) -> SessionConfig {
    SessionConfig::builder(server.uri(), "Default").build().unwrap()
}

fn cloud_config(server: &MockServer) -> SessionConfig {
    SessionConfig::builder(format!("{}/acme/Default", server.uri()), "Default")
        .cloud(true)
        .tenant_logical_name("DefaultTenant")
        .client_id("client-123")
        .refresh_token("refresh-abc")
        .identity_url(format!("{}/oauth/token", server.uri()))
        .build()
        .unwrap()
}

// ============================================================================
// On-premise
// ============================================================================

#[tokio::test]
async fn test_on_premise_authentication_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "tenancyName": "Default",
            "usernameOrEmailAddress": "admin",
            "password": "s3cret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "tok123",
            "targetUrl": null,
            "success": true,
            "error": null,
            "unAuthorizedRequest": false
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "s3cret")),
    )
    .await
    .unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.token().unwrap().expose(), "tok123");
    assert_eq!(session.base_url(), mock_server.uri());
}

#[tokio::test]
async fn test_on_premise_authentication_failure_carries_status_and_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Invalid credentials, failed to login.",
            "errorCode": 1000
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "wrong")),
    )
    .await;

    match result {
        Err(OrchestratorError::Authentication { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid credentials, failed to login.");
        }
        other => panic!("expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_failure_without_message_uses_generic_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap_err();

    assert_eq!(error.status(), Some(503));
    assert!(error.to_string().contains("No error message returned by server"));
}

#[tokio::test]
async fn test_authentication_requires_exactly_200() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": "tok123"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        error,
        OrchestratorError::Authentication { status: 201, .. }
    ));
}

#[tokio::test]
async fn test_authentication_success_without_token_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        error,
        OrchestratorError::Authentication { status: 200, .. }
    ));
}

#[tokio::test]
async fn test_authentication_malformed_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap_err();

    assert!(matches!(error, OrchestratorError::Api(_)));
    assert!(error.to_string().contains("Parse error"));
}

#[tokio::test]
async fn test_on_premise_without_credentials_never_calls_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "tok123"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(on_premise_config(&mock_server), None)
        .await
        .unwrap_err();

    assert!(error.is_precondition());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on port 9 (discard) on test machines
    let config = SessionConfig::builder("http://127.0.0.1:9", "Default")
        .build()
        .unwrap();

    let error = OrchestratorSession::connect(config, Some(Credentials::new("admin", "pw")))
        .await
        .unwrap_err();

    assert!(matches!(error, OrchestratorError::Api(_)));
}

// ============================================================================
// Cloud
// ============================================================================

#[tokio::test]
async fn test_cloud_authentication_success_with_access_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("X-UIPATH-TenantName", "DefaultTenant"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "grant_type": "refresh_token",
            "client_id": "client-123",
            "refresh_token": "refresh-abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cloud-token",
            "id_token": "id",
            "scope": "openid profile",
            "expires_in": 86400,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = OrchestratorSession::connect(cloud_config(&mock_server), None)
        .await
        .unwrap();

    assert_eq!(session.token().unwrap().expose(), "cloud-token");
    assert!(session.config().is_cloud());
}

#[tokio::test]
async fn test_cloud_authentication_accepts_result_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "legacy-token"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = OrchestratorSession::connect(cloud_config(&mock_server), None)
        .await
        .unwrap();

    assert_eq!(session.token().unwrap().expose(), "legacy-token");
}

#[tokio::test]
async fn test_cloud_authentication_failure_reads_oauth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Unknown or invalid refresh token."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = OrchestratorSession::connect(cloud_config(&mock_server), None)
        .await
        .unwrap_err();

    match error {
        OrchestratorError::Authentication { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Unknown or invalid refresh token.");
        }
        other => panic!("expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cloud_without_cloud_fields_fails_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let error = SessionConfig::builder(mock_server.uri(), "Default")
        .cloud(true)
        .identity_url(format!("{}/oauth/token", mock_server.uri()))
        .build()
        .unwrap_err();

    assert!(error.is_precondition());
}

#[tokio::test]
async fn test_cloud_with_blank_cloud_fields_fails_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let error = SessionConfig::builder(mock_server.uri(), "Default")
        .cloud(true)
        .tenant_logical_name("")
        .client_id("")
        .refresh_token("")
        .identity_url(format!("{}/oauth/token", mock_server.uri()))
        .build()
        .unwrap_err();

    assert!(error.is_precondition());
}

// ============================================================================
// Re-authentication and sign-out
// ============================================================================

#[tokio::test]
async fn test_reauthenticate_replaces_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "first"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "second"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut session = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap();
    assert_eq!(session.token().unwrap().expose(), "first");

    session.sign_out();
    assert!(!session.is_authenticated());

    session
        .authenticate(Some(Credentials::new("admin", "pw")))
        .await
        .unwrap();
    assert_eq!(session.token().unwrap().expose(), "second");
}

#[tokio::test]
async fn test_failed_reauthentication_keeps_previous_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "first"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/Account/Authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Locked out"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut session = OrchestratorSession::connect(
        on_premise_config(&mock_server),
        Some(Credentials::new("admin", "pw")),
    )
    .await
    .unwrap();

    let error = session
        .authenticate(Some(Credentials::new("admin", "pw")))
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(401));
    assert_eq!(session.token().unwrap().expose(), "first");
}
