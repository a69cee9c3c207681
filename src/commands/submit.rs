//! Submitting a bucket's identifiers as an offline user data job.

use tracing::{info, warn};

use super::status::{check_job_status, fetch_audience_size, AudienceSize};
use super::{AccountContext, Console, CustomerMatchOps};
use crate::audience::AudienceBucket;
use crate::batching::{split, BatchConfig};
use crate::config::UploadSettings;
use crate::error::AppError;
use crate::googleads::{ApiErrorDetail, UserDataOperation};

/// What to do once the job is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingMode {
    /// Block until the run operation is done, then print the audience size.
    Wait,
    /// Check the status once and print how to re-check later.
    SkipPolling,
}

/// Outcome of submitting one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub job_resource_name: String,
    pub operation_count: usize,
    /// Number of add-operations requests sent.
    pub request_count: usize,
    /// Rejected operations, indexed within the whole bucket.
    pub partial_failures: Vec<ApiErrorDetail>,
    /// Only filled in by [`PollingMode::Wait`].
    pub audience_size: Option<AudienceSize>,
}

/// One create operation per identifier, in bucket order.
pub fn build_operations(bucket: &AudienceBucket) -> Vec<UserDataOperation> {
    bucket
        .identifiers()
        .iter()
        .map(UserDataOperation::from)
        .collect()
}

/// Uploads `bucket` into the list at `user_list_resource_name`.
///
/// Operations are sent in batches of at most
/// `settings.max_operations_per_request`. Rejected operations are printed and
/// collected but never stop the upload.
///
/// # Errors
///
/// Any error that rejects a whole request (job creation, an add-operations
/// call, the run, or the wait).
pub async fn submit<O: CustomerMatchOps>(
    ops: &O,
    account: &AccountContext,
    bucket: &AudienceBucket,
    user_list_resource_name: &str,
    mode: PollingMode,
    settings: &UploadSettings,
    console: &mut Console,
) -> Result<SubmissionResult, AppError> {
    let batch_config = BatchConfig::new(settings.max_operations_per_request)?;
    let operations = build_operations(bucket);

    let job_resource_name = ops
        .create_offline_user_data_job(&account.customer_id, user_list_resource_name)
        .await?;
    console.line(format!(
        "Created an offline user data job with resource name: \"{}\".",
        job_resource_name
    ));

    let batches = split(&operations, batch_config);
    let mut partial_failures = Vec::new();

    for (n, batch) in batches.iter().enumerate() {
        info!(
            "[UPLOAD] Adding batch {}/{} ({} operations) to {}",
            n + 1,
            batches.len(),
            batch.len(),
            job_resource_name
        );
        let failures = ops.add_operations(&job_resource_name, batch.items).await?;

        for mut failure in failures {
            failure.index = failure
                .index
                .map(|local| batch.global_index(local as usize) as u64);
            console.line(failure.partial_failure_line());
            partial_failures.push(failure);
        }
    }

    if !partial_failures.is_empty() {
        warn!(
            "[UPLOAD] {} of {} operations were rejected for {}",
            partial_failures.len(),
            operations.len(),
            bucket.name()
        );
    }
    console.line("The operations are added to the offline user data job.");

    let operation_name = ops.run_job(&job_resource_name).await?;

    let audience_size = match mode {
        PollingMode::SkipPolling => {
            check_job_status(ops, account, &job_resource_name, user_list_resource_name, console)
                .await?;
            None
        }
        PollingMode::Wait => {
            console.line("Request to execute the added operations started.");
            console.line("Waiting until operation completes...");
            ops.wait_for_operation(
                &operation_name,
                settings.operation_poll_initial,
                settings.operation_poll_max,
            )
            .await?;
            Some(
                fetch_audience_size(ops, &account.customer_id, user_list_resource_name, console)
                    .await?,
            )
        }
    };

    Ok(SubmissionResult {
        job_resource_name,
        operation_count: operations.len(),
        request_count: batches.len(),
        partial_failures,
        audience_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audience::{AddressInfo, Identifier, UploadKeyType};
    use crate::commands::ops::fake::FakeAds;
    use crate::googleads::{JobStatus, UserIdentifier};
    use std::path::PathBuf;

    const LIST: &str = "customers/1/userLists/9";

    fn account() -> AccountContext {
        AccountContext {
            customer_id: "1".into(),
            config_path: PathBuf::from("config.yaml"),
        }
    }

    fn email_bucket(count: usize) -> AudienceBucket {
        let mut bucket = AudienceBucket::new("Big", UploadKeyType::ContactInfo);
        for i in 0..count {
            bucket
                .push(Identifier::HashedEmail(format!("{:064x}", i)))
                .unwrap();
        }
        bucket
    }

    #[test]
    fn one_operation_per_identifier() {
        let mut bucket = AudienceBucket::new("X", UploadKeyType::ContactInfo);
        bucket.push(Identifier::HashedEmail("e".into())).unwrap();
        bucket.push(Identifier::HashedPhone("p".into())).unwrap();
        bucket
            .push(Identifier::Address(AddressInfo {
                hashed_first_name: "f".into(),
                hashed_last_name: "l".into(),
                country_code: "US".into(),
                postal_code: "94043".into(),
            }))
            .unwrap();

        let operations = build_operations(&bucket);

        assert_eq!(operations.len(), 3);
        assert!(operations
            .iter()
            .all(|op| op.create.user_identifiers.len() == 1));
        assert_eq!(
            operations[1].create.user_identifiers[0],
            UserIdentifier::HashedPhoneNumber("p".into())
        );
    }

    #[tokio::test]
    async fn large_bucket_is_split_into_capped_requests() {
        let ads = FakeAds::new().with_job_status(JobStatus::Pending);

        let result = submit(
            &ads,
            &account(),
            &email_bucket(2500),
            LIST,
            PollingMode::SkipPolling,
            &UploadSettings::default(),
            &mut Console::capture(),
        )
        .await
        .unwrap();

        assert_eq!(result.operation_count, 2500);
        assert_eq!(result.request_count, 3);
        assert_eq!(ads.snapshot(|s| s.add_calls.clone()), vec![990, 990, 520]);
        assert_eq!(ads.snapshot(|s| s.runs.len()), 1);
    }

    #[tokio::test]
    async fn partial_failure_indices_are_bucket_wide_and_do_not_abort() {
        let ads = FakeAds::new().with_job_status(JobStatus::Running);
        ads.state.lock().unwrap().partial_failures.insert(
            1,
            vec![ApiErrorDetail {
                message: "The SHA256 encoded value is malformed.".into(),
                error_code: Some("offlineUserDataJobError: INVALID_SHA256_FORMAT".into()),
                field_path: vec!["operations".into()],
                index: Some(5),
            }],
        );
        let settings = UploadSettings::default().max_operations_per_request(10);
        let mut console = Console::capture();

        let result = submit(
            &ads,
            &account(),
            &email_bucket(25),
            LIST,
            PollingMode::SkipPolling,
            &settings,
            &mut console,
        )
        .await
        .unwrap();

        assert_eq!(ads.snapshot(|s| s.add_calls.clone()), vec![10, 10, 5]);
        assert_eq!(result.partial_failures.len(), 1);
        assert_eq!(result.partial_failures[0].index, Some(15));
        assert!(console
            .lines()
            .iter()
            .any(|l| l.starts_with("A partial failure at index 15 occurred.")));
        assert_eq!(ads.snapshot(|s| s.runs.len()), 1);
    }

    #[tokio::test]
    async fn wait_mode_blocks_on_operation_then_reports_size() {
        let ads = FakeAds::new();
        ads.state.lock().unwrap().sizes = (0, 0);
        let mut console = Console::capture();

        let result = submit(
            &ads,
            &account(),
            &email_bucket(3),
            LIST,
            PollingMode::Wait,
            &UploadSettings::default(),
            &mut console,
        )
        .await
        .unwrap();

        assert_eq!(
            ads.snapshot(|s| s.waits.clone()),
            vec![format!("{}/operations/run", result.job_resource_name)]
        );
        assert_eq!(
            result.audience_size,
            Some(AudienceSize {
                size_for_display: 0,
                size_for_search: 0
            })
        );
        assert!(console
            .lines()
            .contains(&"Waiting until operation completes...".to_string()));
    }

    #[tokio::test]
    async fn skip_polling_checks_status_once() {
        let ads = FakeAds::new().with_job_status(JobStatus::Pending);

        let result = submit(
            &ads,
            &account(),
            &email_bucket(1),
            LIST,
            PollingMode::SkipPolling,
            &UploadSettings::default(),
            &mut Console::capture(),
        )
        .await
        .unwrap();

        assert_eq!(result.audience_size, None);
        assert!(ads.snapshot(|s| s.waits.is_empty()));
        let queries = ads.snapshot(|s| s.queries.clone());
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains(&result.job_resource_name));
    }
}
