use thiserror::Error;

use crate::audience::UploadKeyType;
use crate::googleads::failure::ApiFailure;

/// Patterns (lowercase) that indicate sensitive data not safe for console output.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "refresh_token",
    "access_token",
    "client_secret",
    "authorization:",
    "developer-token:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for console output.
/// If sensitive content is detected, returns the fallback instead.
pub(crate) fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Caller / config ───────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An app ID is required for MOBILE_ADVERTISING_ID lists")]
    MissingAppId,

    #[error("Invalid customer ID: {0}")]
    InvalidCustomerId(String),

    #[error("Identifier of type {found} cannot be added to a {expected} list")]
    CategoryMismatch {
        expected: UploadKeyType,
        found: UploadKeyType,
    },

    // ── Auth ──────────────────────────────────────────────────────────────────
    #[error("Session expired")]
    SessionExpired,

    #[error("OAuth error: {0}")]
    OAuthError(String),

    // ── API ───────────────────────────────────────────────────────────────────
    #[error("{0}")]
    Api(ApiFailure),

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    // ── File / CSV ────────────────────────────────────────────────────────────
    #[error("Audience file error: {0}")]
    FileError(String),

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for errors raised before any request leaves the process.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::MissingAppId
                | AppError::InvalidCustomerId(_)
                | AppError::CategoryMismatch { .. }
                | AppError::FileError(_)
                | AppError::CsvInvalid(_)
        )
    }

    /// Renders the error as console lines.
    ///
    /// API failures keep the request ID, status, and every field path so the
    /// offending input can be located. Never leaks secrets or tokens.
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            AppError::Api(failure) => failure.report_lines(),

            AppError::RateLimited { retry_after_secs } => {
                let wait = match retry_after_secs {
                    Some(secs) => format!("Please wait {} seconds before trying again.", secs),
                    None => "Please wait a moment before trying again.".into(),
                };
                vec![format!("The Google Ads API is limiting requests. {}", wait)]
            }

            AppError::SessionExpired => vec![
                "The refresh token was rejected. Generate a new refresh token and update the configuration file."
                    .into(),
            ],

            AppError::OAuthError(msg) => vec![sanitize_message(
                &format!("Could not obtain an access token: {}", msg),
                "Could not obtain an access token.",
            )],

            AppError::JobFailed { job_id, message } => vec![format!(
                "Job '{}' failed: {}",
                job_id,
                sanitize_message(message, "the job reported an error")
            )],

            AppError::ConnectionFailed(msg) => vec![sanitize_message(
                &format!("Could not reach the Google Ads API: {}", msg),
                "Could not reach the Google Ads API.",
            )],

            other => vec![sanitize_message(&other.to_string(), "An unexpected error occurred.")],
        }
    }
}
