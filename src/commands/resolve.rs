//! Finding a user list by name, or creating it.

use tracing::info;

use super::{Console, CustomerMatchOps};
use crate::audience::UploadKeyType;
use crate::config::UploadSettings;
use crate::error::AppError;
use crate::googleads::{gaql_string, NewUserList};

/// GAQL query that looks a user list up by its exact name.
pub fn user_list_query(name: &str) -> String {
    format!(
        "SELECT user_list.id, user_list.name FROM user_list WHERE user_list.name = {}",
        gaql_string(name)
    )
}

/// Returns the resource name of the list called `name`, creating it if needed.
///
/// The first match wins when several lists share the name. A new list gets
/// the configured description and membership lifespan; `app_id` is attached
/// only to `MOBILE_ADVERTISING_ID` lists.
///
/// # Errors
///
/// - `AppError::MissingAppId` - Mobile list without an app ID (no request is made)
/// - Any API error from the search or the create call
pub async fn resolve_or_create<O: CustomerMatchOps>(
    ops: &O,
    customer_id: &str,
    name: &str,
    key_type: UploadKeyType,
    app_id: Option<&str>,
    settings: &UploadSettings,
    console: &mut Console,
) -> Result<String, AppError> {
    let app_id = app_id.map(str::trim).filter(|id| !id.is_empty());
    if key_type.requires_app_id() && app_id.is_none() {
        return Err(AppError::MissingAppId);
    }

    let rows = ops.search(customer_id, &user_list_query(name)).await?;
    if let Some(existing) = rows
        .into_iter()
        .filter_map(|row| row.user_list)
        .find(|list| !list.resource_name.is_empty())
    {
        info!("[UPLOAD] Found user list '{}' as {}", name, existing.resource_name);
        return Ok(existing.resource_name);
    }

    console.line(format!("The user list {} will be created.", name));
    let list = NewUserList {
        name: name.to_string(),
        description: settings.list_description.clone(),
        membership_life_span_days: settings.membership_lifespan_days,
        upload_key_type: key_type,
        app_id: app_id.filter(|_| key_type.requires_app_id()).map(String::from),
    };
    let resource_name = ops.create_user_list(customer_id, &list).await?;
    console.line(format!(
        "User list with resource name \"{}\" was created.",
        resource_name
    ));

    Ok(resource_name)
}
