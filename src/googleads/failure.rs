//! Decoding of Google Ads API failures and partial failures.
//!
//! Both arrive as a `google.rpc.Status` whose `details` carry a
//! `GoogleAdsFailure` with one entry per rejected field or operation.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Response header carrying the server-side request ID.
pub(crate) const REQUEST_ID_HEADER: &str = "request-id";

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// A failed Google Ads API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub request_id: Option<String>,
    /// RPC status name, e.g. `INVALID_ARGUMENT`.
    pub status: String,
    pub message: String,
    pub errors: Vec<ApiErrorDetail>,
}

/// One error inside a `GoogleAdsFailure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
    pub message: String,
    /// Rendered as `category: CODE`, e.g. `userListError: NAME_ALREADY_USED`.
    pub error_code: Option<String>,
    /// Field names from the error location, outermost first.
    pub field_path: Vec<String>,
    /// Index of the rejected operation, when the path starts at `operations`.
    pub index: Option<u64>,
}

impl ApiFailure {
    /// Console lines: a summary, then each error with the fields it points at.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Request with ID \"{}\" failed with status \"{}\" and includes the following errors:",
            self.request_id.as_deref().unwrap_or("unknown"),
            self.status
        )];

        if self.errors.is_empty() {
            lines.push(format!("\tError with message \"{}\".", self.message));
        }
        for error in &self.errors {
            lines.push(format!("\tError with message \"{}\".", error.message));
            for field in &error.field_path {
                lines.push(format!("\t\tOn field: {}", field));
            }
        }
        lines
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Google Ads request {} failed with status {}: {}",
            self.request_id.as_deref().unwrap_or("unknown"),
            self.status,
            self.message
        )
    }
}

impl ApiErrorDetail {
    /// Console line for a rejected operation inside an otherwise accepted request.
    pub fn partial_failure_line(&self) -> String {
        let index = self
            .index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "unknown".into());
        format!(
            "A partial failure at index {} occurred. Error message: {} Error code: {}",
            index,
            self.message,
            self.error_code.as_deref().unwrap_or("unspecified")
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: WireStatus,
}

/// `google.rpc.Status` as rendered by the REST interface.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<WireDetail>,
}

/// A status detail. Only `GoogleAdsFailure` details carry `errors`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDetail {
    #[serde(default)]
    pub errors: Vec<WireAdsError>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAdsError {
    #[serde(default)]
    pub error_code: Option<Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: Option<WireLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireLocation {
    #[serde(default)]
    pub field_path_elements: Vec<WireFieldPathElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireFieldPathElement {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub index: Option<u64>,
}

impl From<WireAdsError> for ApiErrorDetail {
    fn from(wire: WireAdsError) -> Self {
        let elements = wire.location.map(|l| l.field_path_elements).unwrap_or_default();
        let index = elements
            .iter()
            .find(|e| e.field_name == "operations")
            .and_then(|e| e.index);
        Self {
            message: wire.message,
            error_code: wire.error_code.as_ref().and_then(render_error_code),
            field_path: elements.into_iter().map(|e| e.field_name).collect(),
            index,
        }
    }
}

/// `{"userListError": "NAME_ALREADY_USED"}` → `userListError: NAME_ALREADY_USED`.
fn render_error_code(code: &Value) -> Option<String> {
    let object = code.as_object()?;
    let (category, value) = object.iter().next()?;
    match value.as_str() {
        Some(v) => Some(format!("{}: {}", category, v)),
        None => Some(format!("{}: {}", category, value)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Flattens every `GoogleAdsFailure` error in a status.
pub(crate) fn decode_errors(status: WireStatus) -> (Option<String>, Vec<ApiErrorDetail>) {
    let mut request_id = None;
    let mut errors = Vec::new();
    for detail in status.details {
        if request_id.is_none() {
            request_id = detail.request_id;
        }
        errors.extend(detail.errors.into_iter().map(ApiErrorDetail::from));
    }
    (request_id, errors)
}

/// Decodes the `partialFailureError` of an add-operations response.
///
/// A missing status, or one with code 0, means every operation was accepted.
pub(crate) fn decode_partial_failure(status: Option<WireStatus>) -> Vec<ApiErrorDetail> {
    match status {
        Some(status) if status.code != 0 || !status.details.is_empty() => {
            let message = status.message.clone();
            let (_, errors) = decode_errors(status);
            if errors.is_empty() && !message.is_empty() {
                vec![ApiErrorDetail {
                    message,
                    error_code: None,
                    field_path: Vec::new(),
                    index: None,
                }]
            } else {
                errors
            }
        }
        _ => Vec::new(),
    }
}

/// Maps a non-success response to an `AppError`.
///
/// 429 becomes `RateLimited`. Everything else is decoded into an
/// `ApiFailure`, falling back to the HTTP status when the body isn't JSON.
/// A 404 whose body carries no error envelope becomes `NotFound`.
pub(crate) async fn parse_error_response(response: reqwest::Response) -> AppError {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return AppError::RateLimited {
            retry_after_secs: retry_after,
        };
    }

    let header_request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("Unable to read error body"));

    if status == reqwest::StatusCode::NOT_FOUND
        && serde_json::from_str::<ErrorEnvelope>(&body).is_err()
    {
        return AppError::NotFound("Google Ads resource not found".to_string());
    }

    AppError::Api(failure_from_body(status, header_request_id, &body))
}

fn failure_from_body(
    status: reqwest::StatusCode,
    header_request_id: Option<String>,
    body: &str,
) -> ApiFailure {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let rpc_status = envelope
                .error
                .status
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            let message = envelope.error.message.clone();
            let (detail_request_id, errors) = decode_errors(envelope.error);
            ApiFailure {
                request_id: header_request_id.or(detail_request_id),
                status: rpc_status,
                message,
                errors,
            }
        }
        Err(_) => ApiFailure {
            request_id: header_request_id,
            status: format!("HTTP {}", status.as_u16()),
            message: status.canonical_reason().unwrap_or("Unknown error").to_string(),
            errors: Vec::new(),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
