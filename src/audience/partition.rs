//! Reading the audience file and grouping its rows into buckets.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::model::{present, AddressInfo, AudienceBucket, Identifier, RawRecord, UploadKeyType};
use super::normalize::prepare;
use crate::config::UploadSettings;
use crate::error::AppError;

/// Result of partitioning an audience file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Every referenced bucket name, in first-reference order.
    pub names: Vec<String>,
    /// Buckets holding at least one identifier, in first-reference order.
    pub buckets: Vec<AudienceBucket>,
    /// Names referenced by some row that received no compatible identifiers.
    pub empty_buckets: Vec<String>,
}

/// Reads every row of the audience file.
///
/// With `settings.header_line` the first row names the columns; otherwise
/// columns are positional in [`super::COLUMNS`] order.
///
/// # Errors
///
/// Returns `AppError::FileError` if the file can't be opened and
/// `AppError::CsvInvalid` if a row can't be parsed.
pub fn read_audience_file(
    path: &Path,
    settings: &UploadSettings,
) -> Result<Vec<RawRecord>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(settings.header_line)
        .delimiter(settings.delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| AppError::FileError(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<RawRecord>().enumerate() {
        let record = record.map_err(|e| AppError::CsvInvalid(format!("row {}: {}", i + 1, e)))?;
        rows.push(record);
    }

    debug!("[UPLOAD] Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Groups `rows` into named buckets holding identifiers of `key_type` only.
///
/// A row's bucket is its `List` value, or `settings.default_list_name` when
/// that is empty. Email and phone each yield their own identifier; an address
/// needs first name, last name, country code and zip code.
///
/// # Errors
///
/// Returns `AppError::CategoryMismatch` if an identifier of another category
/// reaches a bucket.
pub fn partition(
    rows: &[RawRecord],
    key_type: UploadKeyType,
    hash_required: bool,
    settings: &UploadSettings,
) -> Result<Partition, AppError> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, AudienceBucket> = HashMap::new();

    for row in rows {
        let name = present(&row.list_name).unwrap_or(settings.default_list_name.as_str());

        if !by_name.contains_key(name) {
            order.push(name.to_string());
            by_name.insert(name.to_string(), AudienceBucket::new(name, key_type));
        }

        let identifiers = row_identifiers(row, key_type, hash_required);
        if let Some(bucket) = by_name.get_mut(name) {
            for identifier in identifiers {
                bucket.push(identifier)?;
            }
        }
    }

    let mut result = Partition {
        names: order.clone(),
        ..Partition::default()
    };
    for name in order {
        match by_name.remove(&name) {
            Some(bucket) if !bucket.is_empty() => result.buckets.push(bucket),
            _ => result.empty_buckets.push(name),
        }
    }
    Ok(result)
}

/// Identifiers one row contributes to a list of `key_type`.
fn row_identifiers(row: &RawRecord, key_type: UploadKeyType, hash_required: bool) -> Vec<Identifier> {
    let mut out = Vec::new();

    match key_type {
        UploadKeyType::ContactInfo => {
            if let Some(email) = present(&row.email) {
                out.push(Identifier::HashedEmail(prepare(email, hash_required)));
            }
            if let Some(phone) = present(&row.phone) {
                out.push(Identifier::HashedPhone(prepare(phone, hash_required)));
            }
            if let (Some(first), Some(last), Some(country), Some(zip)) = (
                present(&row.first_name),
                present(&row.last_name),
                present(&row.country_code),
                present(&row.zip_code),
            ) {
                out.push(Identifier::Address(AddressInfo {
                    hashed_first_name: prepare(first, hash_required),
                    hashed_last_name: prepare(last, hash_required),
                    country_code: country.to_string(),
                    postal_code: zip.to_string(),
                }));
            }
        }
        UploadKeyType::MobileAdvertisingId => {
            if let Some(mobile_id) = present(&row.mobile_id) {
                out.push(Identifier::MobileId(mobile_id.to_string()));
            }
        }
        UploadKeyType::CrmId => {
            if let Some(user_id) = present(&row.user_id) {
                out.push(Identifier::ThirdPartyUserId(user_id.to_string()));
            }
        }
    }

    out
}
