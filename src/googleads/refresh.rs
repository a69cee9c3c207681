//! OAuth refresh-token exchange.
//!
//! Trades the long-lived refresh token from the configuration file for a
//! short-lived access token. The interactive consent flow that produces the
//! refresh token is not handled here.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Refresh
// ─────────────────────────────────────────────────────────────────────────────

/// Exchanges a refresh token for an access token.
///
/// # Arguments
///
/// * `http` - The HTTP client to use
/// * `token_url` - OAuth token endpoint
/// * `client_id` - OAuth client ID
/// * `client_secret` - OAuth client secret
/// * `refresh_token` - Refresh token from the configuration file
///
/// # Errors
///
/// - `AppError::SessionExpired` - The refresh token was revoked or has expired
/// - `AppError::OAuthError` - Any other rejection (e.g. bad client credentials)
/// - `AppError::ConnectionFailed` - Network error during refresh
///
/// Never logs the refresh token or the new access token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    token_url: &Url,
    client_id: &str,
    client_secret: &SecretString,
    refresh_token: &SecretString,
) -> Result<AccessTokenResponse, AppError> {
    info!("[ADS-AUTH] Refreshing access token...");

    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id),
        ("client_secret", client_secret.expose_secret()),
        ("refresh_token", refresh_token.expose_secret()),
    ];

    let response = http
        .post(token_url.as_str())
        .form(&params)
        .send()
        .await
        .map_err(|_| {
            error!("[ADS-AUTH] Token refresh request failed");
            AppError::ConnectionFailed("Failed to connect for token refresh".to_string())
        })?;

    let status = response.status();

    if status.is_success() {
        let token_response: AccessTokenResponse = response.json().await.map_err(|_| {
            error!("[ADS-AUTH] Failed to parse token refresh response");
            AppError::Internal("Invalid token refresh response".to_string())
        })?;

        match token_response.expires_in {
            Some(secs) => info!("[ADS-AUTH] Token refresh successful, expires in {}s", secs),
            None => info!("[ADS-AUTH] Token refresh successful"),
        }
        return Ok(token_response);
    }

    let error_code = response
        .json::<TokenErrorResponse>()
        .await
        .map(|body| body.error)
        .ok();

    error!("[ADS-AUTH] Token refresh failed: {}", status);

    match error_code.as_deref() {
        Some("invalid_grant") => Err(AppError::SessionExpired),
        Some(code) => Err(AppError::OAuthError(code.to_string())),
        None => Err(AppError::OAuthError(format!(
            "Token refresh failed (HTTP {})",
            status.as_u16()
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod wiremock_tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(server: &MockServer) -> Result<AccessTokenResponse, AppError> {
        let token_url = Url::parse(&format!("{}/token", server.uri())).unwrap();
        refresh_access_token(
            &reqwest::Client::new(),
            &token_url,
            "my_client_id",
            &SecretString::from("my_client_secret".to_string()),
            &SecretString::from("my_refresh_token".to_string()),
        )
        .await
    }

    #[tokio::test]
    async fn refresh_token_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new_access_token",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/adwords",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = call(&mock_server).await.unwrap();

        assert_eq!(response.access_token, "ya29.new_access_token");
        assert_eq!(response.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn refresh_token_sends_correct_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=my_client_id"))
            .and(body_string_contains("client_secret=my_client_secret"))
            .and(body_string_contains("refresh_token=my_refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new_token"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(call(&mock_server).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_grant_returns_session_expired() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(matches!(call(&mock_server).await, Err(AppError::SessionExpired)));
    }

    #[tokio::test]
    async fn invalid_client_returns_oauth_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "The OAuth client was not found."
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = call(&mock_server).await;
        assert!(matches!(result, Err(AppError::OAuthError(code)) if code == "invalid_client"));
    }

    #[tokio::test]
    async fn server_error_returns_oauth_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(matches!(call(&mock_server).await, Err(AppError::OAuthError(_))));
    }
}
