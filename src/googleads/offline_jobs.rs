//! Offline user data jobs: create, add operations, run, and wait.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::GoogleAdsClient;
use super::failure::{decode_partial_failure, ApiErrorDetail, WireStatus};
use crate::audience::{AddressInfo, Identifier};
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// JobStatus
// ─────────────────────────────────────────────────────────────────────────────

/// Processing state of an offline user data job, as reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    /// `UNSPECIFIED`, `UNKNOWN`, or anything newer than this client.
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// True while the job may still change state.
    pub fn is_in_progress(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running | JobStatus::Unknown)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// One identifier inside a user-data operation.
///
/// Serializes externally tagged, e.g. `{"hashedEmail": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UserIdentifier {
    HashedEmail(String),
    HashedPhoneNumber(String),
    MobileId(String),
    ThirdPartyUserId(String),
    AddressInfo(OfflineUserAddressInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineUserAddressInfo {
    pub hashed_first_name: String,
    pub hashed_last_name: String,
    pub country_code: String,
    pub postal_code: String,
}

/// A single `create` operation carrying one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDataOperation {
    pub create: UserData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_identifiers: Vec<UserIdentifier>,
}

impl From<&AddressInfo> for OfflineUserAddressInfo {
    fn from(address: &AddressInfo) -> Self {
        Self {
            hashed_first_name: address.hashed_first_name.clone(),
            hashed_last_name: address.hashed_last_name.clone(),
            country_code: address.country_code.clone(),
            postal_code: address.postal_code.clone(),
        }
    }
}

impl From<&Identifier> for UserIdentifier {
    fn from(identifier: &Identifier) -> Self {
        match identifier {
            Identifier::HashedEmail(v) => UserIdentifier::HashedEmail(v.clone()),
            Identifier::HashedPhone(v) => UserIdentifier::HashedPhoneNumber(v.clone()),
            Identifier::MobileId(v) => UserIdentifier::MobileId(v.clone()),
            Identifier::ThirdPartyUserId(v) => UserIdentifier::ThirdPartyUserId(v.clone()),
            Identifier::Address(a) => UserIdentifier::AddressInfo(a.into()),
        }
    }
}

impl From<&Identifier> for UserDataOperation {
    fn from(identifier: &Identifier) -> Self {
        Self {
            create: UserData {
                user_identifiers: vec![identifier.into()],
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateJobRequest<'a> {
    job: NewJob<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewJob<'a> {
    #[serde(rename = "type")]
    job_type: &'static str,
    customer_match_user_list_metadata: UserListMetadata<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserListMetadata<'a> {
    user_list: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    resource_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddOperationsRequest<'a> {
    enable_partial_failure: bool,
    operations: &'a [UserDataOperation],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddOperationsResponse {
    #[serde(default)]
    partial_failure_error: Option<WireStatus>,
}

/// A `google.longrunning.Operation`.
#[derive(Debug, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    error: Option<WireStatus>,
}

impl Operation {
    /// Message of the operation's error, if it finished unsuccessfully.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        if error.code == 0 && error.message.is_empty() {
            return None;
        }
        Some(error.message.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Operations
// ─────────────────────────────────────────────────────────────────────────────

const CUSTOMER_MATCH_USER_LIST: &str = "CUSTOMER_MATCH_USER_LIST";

impl GoogleAdsClient {
    /// Creates a Customer Match job bound to `user_list` and returns its resource name.
    ///
    /// # Errors
    ///
    /// Propagates transport and API errors.
    pub async fn create_offline_user_data_job(
        &self,
        customer_id: &str,
        user_list: &str,
    ) -> Result<String, AppError> {
        let request = CreateJobRequest {
            job: NewJob {
                job_type: CUSTOMER_MATCH_USER_LIST,
                customer_match_user_list_metadata: UserListMetadata { user_list },
            },
        };

        let path = format!("customers/{}/offlineUserDataJobs:create", customer_id);
        let response: CreateJobResponse = self.post_json(&path, &request).await?;

        info!("[ADS] Created offline user data job {}", response.resource_name);
        Ok(response.resource_name)
    }

    /// Adds operations to a job with partial failure enabled.
    ///
    /// Returns the rejected operations; indices are relative to `operations`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the whole request is rejected.
    pub async fn add_offline_user_data_job_operations(
        &self,
        job_resource_name: &str,
        operations: &[UserDataOperation],
    ) -> Result<Vec<ApiErrorDetail>, AppError> {
        let request = AddOperationsRequest {
            enable_partial_failure: true,
            operations,
        };

        let path = format!("{}:addOperations", job_resource_name);
        let response: AddOperationsResponse = self.post_json(&path, &request).await?;

        Ok(decode_partial_failure(response.partial_failure_error))
    }

    /// Starts processing the job and returns the long-running operation name.
    ///
    /// # Errors
    ///
    /// Propagates transport and API errors.
    pub async fn run_offline_user_data_job(&self, job_resource_name: &str) -> Result<String, AppError> {
        let path = format!("{}:run", job_resource_name);
        let operation: Operation = self.post_json(&path, &serde_json::json!({})).await?;

        info!("[ADS] Job {} started as operation {}", job_resource_name, operation.name);
        Ok(operation.name)
    }

    /// Fetches a long-running operation.
    ///
    /// # Errors
    ///
    /// Propagates transport and API errors.
    pub async fn get_operation(&self, name: &str) -> Result<Operation, AppError> {
        self.get_json(name).await
    }

    /// Polls an operation until it is done, backing off from `initial` to `max`.
    ///
    /// There is no overall deadline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::JobFailed` if the operation finishes with an error.
    pub async fn wait_for_operation(
        &self,
        name: &str,
        initial: Duration,
        max: Duration,
    ) -> Result<(), AppError> {
        let mut delay = initial;

        loop {
            let operation = self.get_operation(name).await?;

            if operation.done {
                return match operation.error_message() {
                    Some(message) => Err(AppError::JobFailed {
                        job_id: name.to_string(),
                        message,
                    }),
                    None => Ok(()),
                };
            }

            debug!("[ADS] Operation {} not done, waiting {:?}", name, delay);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(max);
        }
    }
}
