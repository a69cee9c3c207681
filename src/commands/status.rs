//! One-shot status check of an offline user data job.

use tracing::info;

use super::{AccountContext, Console, CustomerMatchOps};
use crate::error::AppError;
use crate::googleads::{JobStatus, OfflineUserDataJobRow};

/// Estimated audience size of a user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudienceSize {
    pub size_for_display: i64,
    pub size_for_search: i64,
}

/// Outcome of a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusReport {
    pub job_id: Option<i64>,
    pub job_type: String,
    pub status: JobStatus,
    pub failure_reason: Option<String>,
    /// Present only when the job succeeded.
    pub audience_size: Option<AudienceSize>,
}

/// GAQL query for a job's status.
pub fn job_status_query(job_resource_name: &str) -> String {
    format!(
        "SELECT offline_user_data_job.resource_name, offline_user_data_job.id, \
         offline_user_data_job.status, offline_user_data_job.type, \
         offline_user_data_job.failure_reason FROM offline_user_data_job \
         WHERE offline_user_data_job.resource_name = '{}' LIMIT 1",
        job_resource_name
    )
}

fn audience_size_query(user_list_resource_name: &str) -> String {
    format!(
        "SELECT user_list.resource_name, user_list.size_for_display, user_list.size_for_search \
         FROM user_list WHERE user_list.resource_name = '{}'",
        user_list_resource_name
    )
}

/// Fetches and prints the estimated size of a user list.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the list isn't visible to the customer.
pub async fn fetch_audience_size<O: CustomerMatchOps>(
    ops: &O,
    customer_id: &str,
    user_list_resource_name: &str,
    console: &mut Console,
) -> Result<AudienceSize, AppError> {
    let rows = ops
        .search(customer_id, &audience_size_query(user_list_resource_name))
        .await?;
    let list = rows
        .into_iter()
        .find_map(|row| row.user_list)
        .ok_or_else(|| AppError::NotFound(format!("User list {}", user_list_resource_name)))?;

    let size = AudienceSize {
        size_for_display: list.size_for_display.unwrap_or(0),
        size_for_search: list.size_for_search.unwrap_or(0),
    };
    let resource_name = if list.resource_name.is_empty() {
        user_list_resource_name
    } else {
        list.resource_name.as_str()
    };

    console.line(format!(
        "The estimated number of users that the user list '{}' has is {} for Display and {} for Search.",
        resource_name, size.size_for_display, size.size_for_search
    ));
    console.line(
        "Reminder: It may take several hours for the user list to be populated. \
         Estimates of size zero are possible.",
    );

    Ok(size)
}

/// Queries the job once and prints what it found.
///
/// On success the audience size follows; on failure the reason. While the
/// job is still pending, prints the query and the `check-job` command to run
/// later. Never loops.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the job doesn't exist, plus any API error.
pub async fn check_job_status<O: CustomerMatchOps>(
    ops: &O,
    account: &AccountContext,
    job_resource_name: &str,
    user_list_resource_name: &str,
    console: &mut Console,
) -> Result<JobStatusReport, AppError> {
    let query = job_status_query(job_resource_name);
    let rows = ops.search(&account.customer_id, &query).await?;
    let job: OfflineUserDataJobRow = rows
        .into_iter()
        .find_map(|row| row.offline_user_data_job)
        .ok_or_else(|| AppError::NotFound(format!("Offline user data job {}", job_resource_name)))?;

    let job_type = job.job_type.unwrap_or_else(|| "UNKNOWN".into());
    let job_id = job
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| job_resource_name.rsplit('/').next().unwrap_or_default().to_string());

    info!("[UPLOAD] Job {} is {}", job_resource_name, job.status);
    console.line(format!(
        "Offline user data job ID '{}' with type '{}' has status: {}",
        job_id, job_type, job.status
    ));

    let mut audience_size = None;
    match job.status {
        status if status.is_in_progress() => {
            console.line(format!(
                "To check the status of the job periodically, use the following GAQL query with GoogleAdsService.Search: {}",
                query
            ));
            console.line("Or you can use the check-job command with the following args:");
            console.line(format!(
                "\ncustomer-match check-job --config-file {} --customer-id {} --job-resource-name {} --user-list-resource-name {}",
                account.config_path.display(),
                account.customer_id,
                job_resource_name,
                user_list_resource_name
            ));
        }
        JobStatus::Success => {
            audience_size = Some(
                fetch_audience_size(ops, &account.customer_id, user_list_resource_name, console)
                    .await?,
            );
        }
        JobStatus::Failed => {
            console.line(format!(
                "\tFailure Reason: {}",
                job.failure_reason.as_deref().unwrap_or_default()
            ));
        }
        _ => {}
    }

    Ok(JobStatusReport {
        job_id: job.id,
        job_type,
        status: job.status,
        failure_reason: job.failure_reason,
        audience_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ops::fake::FakeAds;
    use std::path::PathBuf;

    const JOB: &str = "customers/1/offlineUserDataJobs/77";
    const LIST: &str = "customers/1/userLists/9";

    fn account() -> AccountContext {
        AccountContext {
            customer_id: "1".into(),
            config_path: PathBuf::from("./googleads_config.yaml"),
        }
    }

    #[test]
    fn status_query_targets_one_job() {
        let query = job_status_query(JOB);
        assert!(query.contains("FROM offline_user_data_job"));
        assert!(query.ends_with(&format!("= '{}' LIMIT 1", JOB)));
    }

    #[tokio::test]
    async fn success_reports_audience_size() {
        let ads = FakeAds::new().with_job_status(JobStatus::Success);
        ads.state.lock().unwrap().sizes = (1200, 3400);
        let mut console = Console::capture();

        let report = check_job_status(&ads, &account(), JOB, LIST, &mut console)
            .await
            .unwrap();

        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(
            report.audience_size,
            Some(AudienceSize {
                size_for_display: 1200,
                size_for_search: 3400
            })
        );
        assert_eq!(
            console.lines()[0],
            "Offline user data job ID '77' with type 'CUSTOMER_MATCH_USER_LIST' has status: SUCCESS"
        );
        assert_eq!(
            console.lines()[1],
            format!(
                "The estimated number of users that the user list '{}' has is 1200 for Display and 3400 for Search.",
                LIST
            )
        );
        assert!(console.lines()[2].starts_with("Reminder:"));
    }

    #[tokio::test]
    async fn failure_prints_reason_verbatim() {
        let ads = FakeAds::new().with_job_status(JobStatus::Failed);
        ads.state.lock().unwrap().failure_reason = Some("INSUFFICIENT_MATCHED_TRANSACTIONS".into());
        let mut console = Console::capture();

        let report = check_job_status(&ads, &account(), JOB, LIST, &mut console)
            .await
            .unwrap();

        assert_eq!(report.audience_size, None);
        assert_eq!(console.lines()[1], "\tFailure Reason: INSUFFICIENT_MATCHED_TRANSACTIONS");
        assert_eq!(ads.snapshot(|s| s.queries.len()), 1);
    }

    #[tokio::test]
    async fn pending_prints_recheck_guidance() {
        let ads = FakeAds::new().with_job_status(JobStatus::Pending);
        let mut console = Console::capture();

        let report = check_job_status(&ads, &account(), JOB, LIST, &mut console)
            .await
            .unwrap();

        assert_eq!(report.status, JobStatus::Pending);
        let lines = console.lines();
        assert!(lines[1].contains(&job_status_query(JOB)));
        assert!(lines[3].contains("--job-resource-name customers/1/offlineUserDataJobs/77"));
        assert!(lines[3].contains("--user-list-resource-name customers/1/userLists/9"));
        assert!(lines[3].contains("--config-file ./googleads_config.yaml"));
    }

    #[tokio::test]
    async fn unknown_status_is_treated_as_pending() {
        let ads = FakeAds::new().with_job_status(JobStatus::Unknown);
        let mut console = Console::capture();

        let report = check_job_status(&ads, &account(), JOB, LIST, &mut console)
            .await
            .unwrap();

        assert_eq!(report.status, JobStatus::Unknown);
        assert_eq!(console.lines().len(), 4);
    }

    #[tokio::test]
    async fn running_job_gets_the_same_guidance_as_pending() {
        let ads = FakeAds::new().with_job_status(JobStatus::Running);
        let mut console = Console::capture();

        let report = check_job_status(&ads, &account(), JOB, LIST, &mut console)
            .await
            .unwrap();

        assert_eq!(report.audience_size, None);
        assert_eq!(
            console.lines()[2],
            "Or you can use the check-job command with the following args:"
        );
        assert_eq!(ads.snapshot(|s| s.queries.len()), 1);
    }
}
