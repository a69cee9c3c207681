//! Creating CRM-based (Customer Match) user lists.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::GoogleAdsClient;
use crate::audience::UploadKeyType;
use crate::error::AppError;

/// A Customer Match list to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserList {
    pub name: String,
    pub description: String,
    pub membership_life_span_days: u32,
    pub upload_key_type: UploadKeyType,
    /// Only sent for `MOBILE_ADVERTISING_ID` lists.
    pub app_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MutateUserListsRequest<'a> {
    operations: [UserListOperation<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserListOperation<'a> {
    create: UserListCreate<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserListCreate<'a> {
    name: &'a str,
    description: &'a str,
    membership_life_span: u32,
    crm_based_user_list: CrmBasedUserList<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CrmBasedUserList<'a> {
    upload_key_type: UploadKeyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct MutateUserListsResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutateResult {
    resource_name: String,
}

impl<'a> From<&'a NewUserList> for UserListCreate<'a> {
    fn from(list: &'a NewUserList) -> Self {
        let app_id = if list.upload_key_type.requires_app_id() {
            list.app_id.as_deref()
        } else {
            None
        };
        Self {
            name: &list.name,
            description: &list.description,
            membership_life_span: list.membership_life_span_days,
            crm_based_user_list: CrmBasedUserList {
                upload_key_type: list.upload_key_type,
                app_id,
            },
        }
    }
}

impl GoogleAdsClient {
    /// Creates a user list and returns its resource name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` if the list is rejected (e.g. the name is taken)
    /// and `AppError::Internal` if the response has no result.
    pub async fn create_user_list(
        &self,
        customer_id: &str,
        list: &NewUserList,
    ) -> Result<String, AppError> {
        let request = MutateUserListsRequest {
            operations: [UserListOperation { create: list.into() }],
        };

        let path = format!("customers/{}/userLists:mutate", customer_id);
        let response: MutateUserListsResponse = self.post_json(&path, &request).await?;

        let resource_name = response
            .results
            .into_iter()
            .next()
            .map(|r| r.resource_name)
            .ok_or_else(|| AppError::Internal("User list mutate returned no results".into()))?;

        info!("[ADS] Created user list {}", resource_name);
        Ok(resource_name)
    }
}
