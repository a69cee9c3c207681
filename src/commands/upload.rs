//! The `upload` command: file to audiences to jobs.

use std::path::PathBuf;

use tracing::{info, warn};

use super::resolve::resolve_or_create;
use super::submit::{submit, PollingMode, SubmissionResult};
use super::{AccountContext, Console, CustomerMatchOps};
use crate::audience::{partition, read_audience_file, AudienceBucket, UploadKeyType};
use crate::config::UploadSettings;
use crate::error::AppError;
use crate::validation;

/// Parameters of one `upload` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub audience_file: PathBuf,
    pub key_type: UploadKeyType,
    pub app_id: Option<String>,
    /// Hash PII fields before upload; otherwise they are sent as given.
    pub hash_required: bool,
    pub mode: PollingMode,
}

/// One bucket that made it to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBucket {
    pub name: String,
    pub user_list_resource_name: String,
    pub submission: SubmissionResult,
}

/// What happened to every bucket of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub processed_rows: usize,
    pub uploaded: Vec<UploadedBucket>,
    /// Buckets without compatible identifiers.
    pub skipped: Vec<String>,
    /// Buckets abandoned after an API error.
    pub failed: Vec<String>,
}

/// Errors that abandon the current bucket but let later buckets run.
fn is_bucket_error(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Api(_)
            | AppError::RateLimited { .. }
            | AppError::NotFound(_)
            | AppError::JobFailed { .. }
    )
}

/// Runs an upload end to end.
///
/// The file is validated, read and partitioned before any request is made.
/// Buckets are then processed one at a time in the order the file first
/// names them.
///
/// # Errors
///
/// - Caller errors (`Config`, `MissingAppId`, `FileError`, `CsvInvalid`) before any request
/// - Auth and connection errors, which stop the whole run
pub async fn run_upload<O: CustomerMatchOps>(
    ops: &O,
    account: &AccountContext,
    request: &UploadRequest,
    settings: &UploadSettings,
    console: &mut Console,
) -> Result<UploadSummary, AppError> {
    settings.validate()?;

    let app_id = request.app_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    if request.key_type.requires_app_id() && app_id.is_none() {
        return Err(AppError::MissingAppId);
    }

    let path = request.audience_file.as_path();
    let warnings = validation::validate(path, settings, request.key_type)
        .await?
        .into_result(path)?;
    for warning in &warnings {
        warn!("[UPLOAD] {}: {}", path.display(), warning);
    }

    let rows = read_audience_file(path, settings)?;
    console.line(format!("Processed {} lines from file {}.", rows.len(), path.display()));

    let mut parts = partition(&rows, request.key_type, request.hash_required, settings)?;
    let mut summary = UploadSummary {
        processed_rows: rows.len(),
        ..UploadSummary::default()
    };

    for name in std::mem::take(&mut parts.names) {
        console.line(format!("Processing data for list '{}'.", name));

        let Some(pos) = parts.buckets.iter().position(|b| b.name() == name) else {
            console.line(format!(
                "The list '{}' will be skipped as no compatible data has been found.",
                name
            ));
            summary.skipped.push(name);
            continue;
        };
        let bucket = parts.buckets.swap_remove(pos);

        match upload_bucket(ops, account, &bucket, request, app_id, settings, console).await {
            Ok(uploaded) => summary.uploaded.push(uploaded),
            Err(err) if is_bucket_error(&err) => {
                warn!("[UPLOAD] List '{}' abandoned: {}", name, err);
                for line in err.report_lines() {
                    console.line(line);
                }
                summary.failed.push(name);
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        "[UPLOAD] Done: {} uploaded, {} skipped, {} failed",
        summary.uploaded.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    console.line("The process has finished.");
    Ok(summary)
}

async fn upload_bucket<O: CustomerMatchOps>(
    ops: &O,
    account: &AccountContext,
    bucket: &AudienceBucket,
    request: &UploadRequest,
    app_id: Option<&str>,
    settings: &UploadSettings,
    console: &mut Console,
) -> Result<UploadedBucket, AppError> {
    let user_list_resource_name = resolve_or_create(
        ops,
        &account.customer_id,
        bucket.name(),
        request.key_type,
        app_id,
        settings,
        console,
    )
    .await?;

    console.line(format!("Uploading data for list '{}'", bucket.name()));
    let submission = submit(
        ops,
        account,
        bucket,
        &user_list_resource_name,
        request.mode,
        settings,
        console,
    )
    .await?;

    Ok(UploadedBucket {
        name: bucket.name().to_string(),
        user_list_resource_name,
        submission,
    })
}
