//! Thin Google Ads REST transport: auth, search, user lists and offline jobs.

pub mod client;
pub mod failure;
pub mod offline_jobs;
pub mod refresh;
pub mod search;
pub mod user_lists;

/// Google Ads API version every path is prefixed with.
pub const API_VERSION: &str = "v17";

pub use client::GoogleAdsClient;
pub use failure::{ApiErrorDetail, ApiFailure};
pub use offline_jobs::{JobStatus, Operation, UserDataOperation, UserIdentifier};
pub use search::{gaql_string, OfflineUserDataJobRow, SearchRow, UserListRow};
pub use user_lists::NewUserList;
