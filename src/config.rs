//! Credentials and upload settings.
//!
//! Credentials come from a `google-ads.yaml` style file merged with
//! `GOOGLE_ADS_*` environment overrides. Upload behaviour that used to be
//! module-level constants lives in [`UploadSettings`], an immutable value
//! handed to every component.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./googleads_config.yaml";

/// Bucket used for rows without a `List` value.
pub const DEFAULT_LIST_NAME: &str = "Generic List from the API";

/// Description attached to every list this tool creates.
pub const DEFAULT_LIST_DESCRIPTION: &str = "This is a list of users uploaded using Ads API.";

/// Days a matched user stays in a newly created list.
pub const DEFAULT_MEMBERSHIP_LIFESPAN_DAYS: u32 = 8;

/// Per-call operation cap for add-operations requests.
pub const DEFAULT_MAX_OPERATIONS_PER_REQUEST: usize = 990;

const DEFAULT_API_BASE_URL: &str = "https://googleads.googleapis.com/";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Environment prefix for credential overrides (e.g. `GOOGLE_ADS_DEVELOPER_TOKEN`).
const ENV_PREFIX: &str = "GOOGLE_ADS_";

// ─────────────────────────────────────────────────────────────────────────────
// AdsCredentials
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth and developer credentials for the Google Ads API.
///
/// Secret fields are wrapped in `SecretString` so they never show up in
/// `Debug` output or logs.
#[derive(Clone, Deserialize)]
pub struct AdsCredentials {
    #[serde(deserialize_with = "secret_string")]
    pub developer_token: SecretString,
    pub client_id: String,
    #[serde(deserialize_with = "secret_string")]
    pub client_secret: SecretString,
    #[serde(deserialize_with = "secret_string")]
    pub refresh_token: SecretString,
    /// Manager account the requests are made through, digits only.
    #[serde(default, deserialize_with = "optional_customer_id")]
    pub login_customer_id: Option<String>,
}

impl fmt::Debug for AdsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdsCredentials")
            .field("developer_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("login_customer_id", &self.login_customer_id)
            .finish()
    }
}

/// Loads credentials from `path`, with `GOOGLE_ADS_*` variables taking precedence.
///
/// # Errors
///
/// Returns `AppError::Config` if the file is missing or a required key is absent.
pub fn load_credentials(path: &Path) -> Result<AdsCredentials, AppError> {
    if !path.is_file() {
        return Err(AppError::Config(format!(
            "configuration file '{}' not found",
            path.display()
        )));
    }

    credentials_figment(Figment::new().merge(Yaml::file(path)))
        .extract()
        .map_err(|e| AppError::Config(e.to_string()))
}

/// Loads credentials from YAML text only. Used by tests.
pub fn load_credentials_from_str(yaml: &str) -> Result<AdsCredentials, AppError> {
    Figment::new()
        .merge(Yaml::string(yaml))
        .extract()
        .map_err(|e| AppError::Config(e.to_string()))
}

fn credentials_figment(base: Figment) -> Figment {
    base.merge(Env::prefixed(ENV_PREFIX))
}

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// YAML (and figment's env parsing) turn `1234567890` into a number, so accept both.
fn optional_customer_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    let value = match raw {
        None => return Ok(None),
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
    };
    normalize_customer_id(&value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Strips dashes from a customer ID (`123-456-7890` → `1234567890`).
///
/// # Errors
///
/// Returns `AppError::InvalidCustomerId` if anything but digits remains.
pub fn normalize_customer_id(raw: &str) -> Result<String, AppError> {
    let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidCustomerId(raw.to_string()));
    }
    Ok(digits)
}

// ─────────────────────────────────────────────────────────────────────────────
// UploadSettings
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable knobs shared by the partitioner, resolver, submitter and poller.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Treat physical row 1 of the audience file as the header.
    pub header_line: bool,
    /// Field delimiter of the audience file.
    pub delimiter: u8,
    pub default_list_name: String,
    pub list_description: String,
    pub membership_lifespan_days: u32,
    /// Upper bound on operations per add-operations call.
    pub max_operations_per_request: usize,
    /// First delay between long-running operation polls.
    pub operation_poll_initial: Duration,
    /// Cap on the delay between long-running operation polls.
    pub operation_poll_max: Duration,
    pub api_base_url: Url,
    pub token_url: Url,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            header_line: true,
            delimiter: b',',
            default_list_name: DEFAULT_LIST_NAME.to_string(),
            list_description: DEFAULT_LIST_DESCRIPTION.to_string(),
            membership_lifespan_days: DEFAULT_MEMBERSHIP_LIFESPAN_DAYS,
            max_operations_per_request: DEFAULT_MAX_OPERATIONS_PER_REQUEST,
            operation_poll_initial: Duration::from_millis(500),
            operation_poll_max: Duration::from_secs(10),
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("static URL is valid"),
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("static URL is valid"),
        }
    }
}

impl UploadSettings {
    /// Sets the header flag.
    pub fn header_line(mut self, header_line: bool) -> Self {
        self.header_line = header_line;
        self
    }

    /// Sets the per-request operation cap.
    pub fn max_operations_per_request(mut self, max: usize) -> Self {
        self.max_operations_per_request = max;
        self
    }

    /// Points the API and token endpoints at another host (used by tests).
    pub fn endpoints(mut self, api_base_url: Url, token_url: Url) -> Self {
        self.api_base_url = api_base_url;
        self.token_url = token_url;
        self
    }

    /// Sets both operation poll delays.
    pub fn operation_poll(mut self, initial: Duration, max: Duration) -> Self {
        self.operation_poll_initial = initial;
        self.operation_poll_max = max;
        self
    }

    /// Rejects settings the upload pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_operations_per_request == 0 {
            return Err(AppError::Config(
                "max_operations_per_request must be greater than 0".into(),
            ));
        }
        if self.default_list_name.trim().is_empty() {
            return Err(AppError::Config("default_list_name must not be empty".into()));
        }
        if self.operation_poll_initial.is_zero() {
            return Err(AppError::Config(
                "operation_poll_initial must be greater than 0".into(),
            ));
        }
        if self.operation_poll_initial > self.operation_poll_max {
            return Err(AppError::Config(
                "operation_poll_initial must not exceed operation_poll_max".into(),
            ));
        }
        Ok(())
    }
}
