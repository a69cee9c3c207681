//! The API surface the command handlers depend on.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::AppError;
use crate::googleads::{ApiErrorDetail, GoogleAdsClient, NewUserList, SearchRow, UserDataOperation};

type OpsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// Google Ads calls used by the uploader, allowing test fakes.
pub trait CustomerMatchOps: Send + Sync + Clone {
    /// Runs a GAQL query.
    fn search<'a>(&'a self, customer_id: &'a str, query: &'a str) -> OpsFuture<'a, Vec<SearchRow>>;

    /// Creates a user list and returns its resource name.
    fn create_user_list<'a>(
        &'a self,
        customer_id: &'a str,
        list: &'a NewUserList,
    ) -> OpsFuture<'a, String>;

    /// Creates a Customer Match job for `user_list` and returns its resource name.
    fn create_offline_user_data_job<'a>(
        &'a self,
        customer_id: &'a str,
        user_list: &'a str,
    ) -> OpsFuture<'a, String>;

    /// Adds operations with partial failure enabled; indices are per request.
    fn add_operations<'a>(
        &'a self,
        job_resource_name: &'a str,
        operations: &'a [UserDataOperation],
    ) -> OpsFuture<'a, Vec<ApiErrorDetail>>;

    /// Runs the job and returns the long-running operation name.
    fn run_job<'a>(&'a self, job_resource_name: &'a str) -> OpsFuture<'a, String>;

    /// Blocks until the operation is done.
    fn wait_for_operation<'a>(
        &'a self,
        operation_name: &'a str,
        initial: Duration,
        max: Duration,
    ) -> OpsFuture<'a, ()>;
}

impl CustomerMatchOps for GoogleAdsClient {
    fn search<'a>(&'a self, customer_id: &'a str, query: &'a str) -> OpsFuture<'a, Vec<SearchRow>> {
        Box::pin(GoogleAdsClient::search(self, customer_id, query))
    }

    fn create_user_list<'a>(
        &'a self,
        customer_id: &'a str,
        list: &'a NewUserList,
    ) -> OpsFuture<'a, String> {
        Box::pin(GoogleAdsClient::create_user_list(self, customer_id, list))
    }

    fn create_offline_user_data_job<'a>(
        &'a self,
        customer_id: &'a str,
        user_list: &'a str,
    ) -> OpsFuture<'a, String> {
        Box::pin(GoogleAdsClient::create_offline_user_data_job(
            self,
            customer_id,
            user_list,
        ))
    }

    fn add_operations<'a>(
        &'a self,
        job_resource_name: &'a str,
        operations: &'a [UserDataOperation],
    ) -> OpsFuture<'a, Vec<ApiErrorDetail>> {
        Box::pin(GoogleAdsClient::add_offline_user_data_job_operations(
            self,
            job_resource_name,
            operations,
        ))
    }

    fn run_job<'a>(&'a self, job_resource_name: &'a str) -> OpsFuture<'a, String> {
        Box::pin(GoogleAdsClient::run_offline_user_data_job(self, job_resource_name))
    }

    fn wait_for_operation<'a>(
        &'a self,
        operation_name: &'a str,
        initial: Duration,
        max: Duration,
    ) -> OpsFuture<'a, ()> {
        Box::pin(GoogleAdsClient::wait_for_operation(
            self,
            operation_name,
            initial,
            max,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Fake
// ─────────────────────────────────────────────────────────────────────────────
