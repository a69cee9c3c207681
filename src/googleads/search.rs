//! GAQL search with pagination.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::client::GoogleAdsClient;
use super::offline_jobs::JobStatus;
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// One GAQL result row. Only the resources this tool queries are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRow {
    #[serde(default)]
    pub user_list: Option<UserListRow>,
    #[serde(default)]
    pub offline_user_data_job: Option<OfflineUserDataJobRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListRow {
    #[serde(default)]
    pub resource_name: String,
    #[serde(default, deserialize_with = "int64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "int64")]
    pub size_for_display: Option<i64>,
    #[serde(default, deserialize_with = "int64")]
    pub size_for_search: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineUserDataJobRow {
    #[serde(default)]
    pub resource_name: String,
    #[serde(default, deserialize_with = "int64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// The REST interface renders int64 fields as JSON strings.
fn int64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Quotes `value` as a GAQL string literal.
pub fn gaql_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

impl GoogleAdsClient {
    /// Runs a GAQL query and collects every page of results.
    ///
    /// # Errors
    ///
    /// Propagates transport and API errors from [`GoogleAdsClient::post_json`].
    pub async fn search(&self, customer_id: &str, query: &str) -> Result<Vec<SearchRow>, AppError> {
        let path = format!("customers/{}/googleAds:search", customer_id);
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = SearchRequest {
                query,
                page_token: page_token.as_deref(),
            };
            let response: SearchResponse = self.post_json(&path, &request).await?;
            rows.extend(response.results);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    debug!("[ADS] Fetching next search page");
                    page_token = Some(token);
                }
                None => break,
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::googleads::client::tests::authed_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn gaql_string_escapes_quotes_and_backslashes() {
        assert_eq!(gaql_string("Plain"), "'Plain'");
        assert_eq!(gaql_string("O'Brien"), r"'O\'Brien'");
        assert_eq!(gaql_string(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn int64_fields_accept_strings_and_numbers() {
        let row: UserListRow = serde_json::from_value(json!({
            "resourceName": "customers/1/userLists/2",
            "id": "2",
            "sizeForDisplay": 1200,
            "sizeForSearch": "3400"
        }))
        .unwrap();

        assert_eq!(row.id, Some(2));
        assert_eq!(row.size_for_display, Some(1200));
        assert_eq!(row.size_for_search, Some(3400));
    }

    #[test]
    fn unknown_job_status_is_tolerated() {
        let row: OfflineUserDataJobRow = serde_json::from_value(json!({
            "resourceName": "customers/1/offlineUserDataJobs/9",
            "status": "UNSPECIFIED"
        }))
        .unwrap();

        assert_eq!(row.status, JobStatus::Unknown);
    }

    #[tokio::test]
    async fn search_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v17/customers/123/googleAds:search"))
            .and(body_partial_json(json!({ "pageToken": "page-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "userList": { "resourceName": "customers/123/userLists/2", "name": "B" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v17/customers/123/googleAds:search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "userList": { "resourceName": "customers/123/userLists/1", "name": "A" } }],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = authed_client(&server).await;
        let rows = client
            .search("123", "SELECT user_list.name FROM user_list")
            .await
            .unwrap();

        let names: Vec<String> = rows
            .into_iter()
            .filter_map(|r| r.user_list.and_then(|u| u.name))
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn empty_search_has_no_rows() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v17/customers/123/googleAds:search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = authed_client(&server).await;
        let rows = client.search("123", "SELECT user_list.id FROM user_list").await.unwrap();

        assert!(rows.is_empty());
    }
}
