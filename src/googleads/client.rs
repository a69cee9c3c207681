//! Google Ads REST client with token refresh and safe logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use url::Url;

use super::failure::{self, REQUEST_ID_HEADER};
use super::refresh;
use super::API_VERSION;
use crate::config::{AdsCredentials, UploadSettings};
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all Google Ads API requests.
const CLIENT_USER_AGENT: &str = concat!("customer-match/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Path component of `url`, for logging. Scheme, host, query and fragment are dropped.
pub fn sanitize_url_for_logs(url: &Url) -> String {
    url.path().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// GoogleAdsClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the Google Ads REST interface.
///
/// The access token is fetched lazily from the refresh token and replaced
/// whenever a request comes back 401. `refresh_lock` serializes refreshes so
/// concurrent callers don't each hit the token endpoint.
#[derive(Clone)]
pub struct GoogleAdsClient {
    http: reqwest::Client,
    base_url: Url,
    token_url: Url,
    creds: Arc<AdsCredentials>,
    access_token: Arc<RwLock<Option<SecretString>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl GoogleAdsClient {
    /// Creates a client for the endpoints in `settings`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(creds: AdsCredentials, settings: &UploadSettings) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: settings.api_base_url.clone(),
            token_url: settings.token_url.clone(),
            creds: Arc::new(creds),
            access_token: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Seeds the access token so the first request skips the refresh.
    pub async fn set_access_token(&self, token: SecretString) {
        let mut guard = self.access_token.write().await;
        *guard = Some(token);
    }

    /// Builds the URL for a versioned API path (e.g. `customers/1/googleAds:search`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the path can't be joined.
    pub fn build_url(&self, path: &str) -> Result<Url, AppError> {
        let versioned = format!("{}/{}", API_VERSION, path.trim_start_matches('/'));
        self.base_url
            .join(&versioned)
            .map_err(|_| AppError::Internal(format!("Invalid path: {}", path)))
    }

    /// POSTs `body` as JSON and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// - `AppError::Api` - The API rejected the request
    /// - `AppError::SessionExpired` / `AppError::OAuthError` - Token refresh failed
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| AppError::Internal(format!("Failed to serialize request: {}", e)))?;
        let response = self.request_authed(Method::POST, path, Some(bytes)).await?;
        decode_response(response).await
    }

    /// GETs a versioned path and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Same as [`GoogleAdsClient::post_json`].
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, AppError> {
        let response = self.request_authed(Method::GET, path, None).await?;
        decode_response(response).await
    }

    /// Executes an authenticated request with automatic token refresh.
    ///
    /// Attaches the bearer token, `developer-token` and, when configured,
    /// `login-customer-id`. On a 401 the token is refreshed (once, even with
    /// concurrent callers) and the request retried.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionExpired` - Still unauthorized after a refresh
    /// - `AppError::ConnectionFailed` - Network error
    pub async fn request_authed(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, AppError> {
        let url = self.build_url(path)?;

        let original_token = match self.current_token().await {
            Some(token) => token,
            None => {
                self.refresh_if_unchanged(None).await?;
                self.current_token().await.ok_or(AppError::SessionExpired)?
            }
        };

        let response = self
            .execute_authed_request(method.clone(), url.clone(), body.clone(), &original_token)
            .await?;

        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!("[ADS] Received 401, attempting token refresh...");
        self.refresh_if_unchanged(Some(&original_token)).await?;

        let new_token = self.current_token().await.ok_or(AppError::SessionExpired)?;
        let retry_response = self
            .execute_authed_request(method, url, body, &new_token)
            .await?;

        if retry_response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("[ADS] Still unauthorized after token refresh");
            return Err(AppError::SessionExpired);
        }

        Ok(retry_response)
    }

    async fn current_token(&self) -> Option<String> {
        let guard = self.access_token.read().await;
        guard.as_ref().map(|t| t.expose_secret().to_string())
    }

    /// Refreshes unless another caller already replaced `seen` while we waited.
    async fn refresh_if_unchanged(&self, seen: Option<&str>) -> Result<(), AppError> {
        let _refresh_guard = self.refresh_lock.lock().await;

        let current = self.current_token().await;
        if current.as_deref() != seen {
            info!("[ADS] Token already refreshed by another task");
            return Ok(());
        }

        let token_response = refresh::refresh_access_token(
            &self.http,
            &self.token_url,
            &self.creds.client_id,
            &self.creds.client_secret,
            &self.creds.refresh_token,
        )
        .await?;

        let mut guard = self.access_token.write().await;
        *guard = Some(SecretString::from(token_response.access_token));
        Ok(())
    }

    /// Executes a single authenticated request (no retry logic).
    async fn execute_authed_request(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        access_token: &str,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(&url);

        let mut request = self
            .http
            .request(method.clone(), url.as_str())
            .bearer_auth(access_token)
            .header("developer-token", self.creds.developer_token.expose_secret());

        if let Some(login_customer_id) = &self.creds.login_customer_id {
            request = request.header("login-customer-id", login_customer_id);
        }

        if let Some(body_bytes) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body_bytes);
        }

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let request_id = response
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[ADS] {} {} {} {}ms {}",
                    method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms,
                    request_id
                );

                Ok(response)
            }
            Err(_) => {
                info!("[ADS] {} {} FAILED {}ms", method, sanitized_url, duration_ms);
                Err(AppError::ConnectionFailed(
                    "Connection to the Google Ads API failed".to_string(),
                ))
            }
        }
    }
}

async fn decode_response<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, AppError> {
    if !response.status().is_success() {
        return Err(failure::parse_error_response(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to parse Google Ads response: {}", e)))
}

/// Builds the configured HTTP client.
fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
