use native_token::auth::{AuthError, RefreshTokenSource, Refresher, TokenSource};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refresher(server: &MockServer) -> Refresher {
    Refresher::builder()
        .token_endpoint(format!("{}/token", server.uri()))
        .client_id("cli-123")
        .build()
}

#[tokio::test]
async fn empty_refresh_token_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = refresher(&server)
        .refresh("", &CancellationToken::new())
        .await
        .expect_err("empty refresh token");
    assert!(matches!(err, AuthError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn refresh_posts_grant_and_returns_rotated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .and(body_string_contains("client_id=cli-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "token_type": "Bearer",
            "refresh_token": "new-refresh",
            "expires_in": "3600",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = refresher(&server)
        .refresh("old-refresh", &CancellationToken::new())
        .await
        .expect("refreshed");
    assert_eq!(token.access_token, "access-2");
    assert_eq!(token.refresh_token(), Some("new-refresh"));
    assert!(token.is_valid());
}

#[tokio::test]
async fn refresh_without_rotation_keeps_old_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    let token = refresher(&server)
        .refresh("old-refresh", &CancellationToken::new())
        .await
        .expect("refreshed");
    assert_eq!(token.refresh_token(), Some("old-refresh"));
    assert_eq!(token.token_type, "Bearer");
}

#[tokio::test]
async fn confidential_refresher_sends_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = Refresher::builder()
        .token_endpoint(format!("{}/token", server.uri()))
        .client_id("cli-123")
        .client_secret("s3cret")
        .build();
    refresher
        .refresh("old-refresh", &CancellationToken::new())
        .await
        .expect("refreshed");
}

#[tokio::test]
async fn invalid_grant_is_a_denial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let err = refresher(&server)
        .refresh("stale", &CancellationToken::new())
        .await
        .expect_err("invalid grant");
    assert!(
        matches!(&err, AuthError::AuthorizationDenied { error, .. } if error == "invalid_grant"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn reply_without_token_or_error_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "Bearer" })))
        .mount(&server)
        .await;

    let err = refresher(&server)
        .refresh("r", &CancellationToken::new())
        .await
        .expect_err("no token");
    assert!(matches!(err, AuthError::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn refresh_source_follows_rotation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r2",
            "expires_in": 60,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=r2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a2",
            "expires_in": 60,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = RefreshTokenSource::new(refresher(&server), "r1");
    assert_eq!(source.token().await.expect("first").access_token, "a1");
    assert_eq!(source.current_refresh_token().await, "r2");
    assert_eq!(source.token().await.expect("second").access_token, "a2");
    assert_eq!(source.current_refresh_token().await, "r2");
}
