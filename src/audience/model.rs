//! Audience records, identifiers and buckets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// UploadKeyType
// ─────────────────────────────────────────────────────────────────────────────

/// Category of identifier a Customer Match list accepts.
///
/// Serializes to the API's enum names (`CONTACT_INFO`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadKeyType {
    /// Emails, phone numbers and mailing addresses.
    #[value(name = "CONTACT_INFO")]
    ContactInfo,
    /// Mobile advertising IDs (IDFA / AAID). Lists need an app ID.
    #[value(name = "MOBILE_ADVERTISING_ID")]
    MobileAdvertisingId,
    /// Advertiser-assigned CRM user IDs.
    #[value(name = "CRM_ID")]
    CrmId,
}

impl UploadKeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKeyType::ContactInfo => "CONTACT_INFO",
            UploadKeyType::MobileAdvertisingId => "MOBILE_ADVERTISING_ID",
            UploadKeyType::CrmId => "CRM_ID",
        }
    }

    /// Whether lists of this type must be bound to a mobile app.
    pub fn requires_app_id(self) -> bool {
        matches!(self, UploadKeyType::MobileAdvertisingId)
    }
}

impl fmt::Display for UploadKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RawRecord
// ─────────────────────────────────────────────────────────────────────────────

/// Column names recognised in the audience file, in positional order.
pub const COLUMNS: [&str; 9] = [
    "Email",
    "Phone",
    "MobileId",
    "UserId",
    "FirstName",
    "LastName",
    "CountryCode",
    "ZipCode",
    "List",
];

/// One row of the audience file. Every column is optional; empty cells are `None`.
///
/// Field order matters: headerless files are read positionally in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "MobileId")]
    pub mobile_id: Option<String>,
    #[serde(rename = "UserId")]
    pub user_id: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name: Option<String>,
    #[serde(rename = "CountryCode")]
    pub country_code: Option<String>,
    #[serde(rename = "ZipCode")]
    pub zip_code: Option<String>,
    #[serde(rename = "List")]
    pub list_name: Option<String>,
}

/// Returns the value if it is present and non-empty.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifier
// ─────────────────────────────────────────────────────────────────────────────

/// Mailing address identifier. Names are hashed, country and zip are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub hashed_first_name: String,
    pub hashed_last_name: String,
    pub country_code: String,
    pub postal_code: String,
}

/// A single matchable user identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    HashedEmail(String),
    HashedPhone(String),
    MobileId(String),
    ThirdPartyUserId(String),
    Address(AddressInfo),
}

impl Identifier {
    /// The list category this identifier belongs to.
    pub fn key_type(&self) -> UploadKeyType {
        match self {
            Identifier::HashedEmail(_) | Identifier::HashedPhone(_) | Identifier::Address(_) => {
                UploadKeyType::ContactInfo
            }
            Identifier::MobileId(_) => UploadKeyType::MobileAdvertisingId,
            Identifier::ThirdPartyUserId(_) => UploadKeyType::CrmId,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AudienceBucket
// ─────────────────────────────────────────────────────────────────────────────

/// Identifiers destined for one named list, grouped by identifier kind.
///
/// A bucket has a fixed category; identifiers of another category are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceBucket {
    name: String,
    key_type: UploadKeyType,
    emails: Vec<String>,
    phones: Vec<String>,
    addresses: Vec<AddressInfo>,
    mobile_ids: Vec<String>,
    user_ids: Vec<String>,
}

impl AudienceBucket {
    pub fn new(name: impl Into<String>, key_type: UploadKeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
            emails: Vec::new(),
            phones: Vec::new(),
            addresses: Vec::new(),
            mobile_ids: Vec::new(),
            user_ids: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> UploadKeyType {
        self.key_type
    }

    /// Adds an identifier to the matching collection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CategoryMismatch` if the identifier's category
    /// differs from the bucket's.
    pub fn push(&mut self, identifier: Identifier) -> Result<(), AppError> {
        let found = identifier.key_type();
        if found != self.key_type {
            return Err(AppError::CategoryMismatch {
                expected: self.key_type,
                found,
            });
        }

        match identifier {
            Identifier::HashedEmail(v) => self.emails.push(v),
            Identifier::HashedPhone(v) => self.phones.push(v),
            Identifier::Address(a) => self.addresses.push(a),
            Identifier::MobileId(v) => self.mobile_ids.push(v),
            Identifier::ThirdPartyUserId(v) => self.user_ids.push(v),
        }
        Ok(())
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    pub fn phones(&self) -> &[String] {
        &self.phones
    }

    pub fn addresses(&self) -> &[AddressInfo] {
        &self.addresses
    }

    pub fn mobile_ids(&self) -> &[String] {
        &self.mobile_ids
    }

    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// Total identifiers across all collections.
    pub fn len(&self) -> usize {
        self.emails.len()
            + self.phones.len()
            + self.addresses.len()
            + self.mobile_ids.len()
            + self.user_ids.len()
    }

    /// True when every collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All identifiers: emails, then phones, addresses, mobile IDs, user IDs.
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.emails.iter().cloned().map(Identifier::HashedEmail));
        out.extend(self.phones.iter().cloned().map(Identifier::HashedPhone));
        out.extend(self.addresses.iter().cloned().map(Identifier::Address));
        out.extend(self.mobile_ids.iter().cloned().map(Identifier::MobileId));
        out.extend(self.user_ids.iter().cloned().map(Identifier::ThirdPartyUserId));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_key_type_serializes_to_api_names() {
        assert_eq!(
            serde_json::to_string(&UploadKeyType::ContactInfo).unwrap(),
            r#""CONTACT_INFO""#
        );
        assert_eq!(
            serde_json::to_string(&UploadKeyType::MobileAdvertisingId).unwrap(),
            r#""MOBILE_ADVERTISING_ID""#
        );
        assert_eq!(serde_json::to_string(&UploadKeyType::CrmId).unwrap(), r#""CRM_ID""#);
    }

    #[test]
    fn only_mobile_lists_require_app_id() {
        assert!(UploadKeyType::MobileAdvertisingId.requires_app_id());
        assert!(!UploadKeyType::ContactInfo.requires_app_id());
        assert!(!UploadKeyType::CrmId.requires_app_id());
    }

    #[test]
    fn identifier_categories() {
        assert_eq!(Identifier::HashedEmail("a".into()).key_type(), UploadKeyType::ContactInfo);
        assert_eq!(Identifier::HashedPhone("a".into()).key_type(), UploadKeyType::ContactInfo);
        assert_eq!(Identifier::MobileId("a".into()).key_type(), UploadKeyType::MobileAdvertisingId);
        assert_eq!(Identifier::ThirdPartyUserId("a".into()).key_type(), UploadKeyType::CrmId);
    }

    #[test]
    fn bucket_rejects_mixed_categories() {
        let mut bucket = AudienceBucket::new("X", UploadKeyType::ContactInfo);
        bucket.push(Identifier::HashedEmail("e".into())).unwrap();

        let result = bucket.push(Identifier::MobileId("m".into()));

        assert!(matches!(
            result,
            Err(AppError::CategoryMismatch {
                expected: UploadKeyType::ContactInfo,
                found: UploadKeyType::MobileAdvertisingId,
            })
        ));
        assert_eq!(bucket.len(), 1);
        assert!(bucket.mobile_ids().is_empty());
    }

    #[test]
    fn bucket_identifiers_follow_collection_order() {
        let mut bucket = AudienceBucket::new("X", UploadKeyType::ContactInfo);
        bucket.push(Identifier::HashedPhone("p".into())).unwrap();
        bucket.push(Identifier::HashedEmail("e".into())).unwrap();

        assert_eq!(
            bucket.identifiers(),
            vec![
                Identifier::HashedEmail("e".into()),
                Identifier::HashedPhone("p".into())
            ]
        );
    }

    #[test]
    fn new_bucket_is_empty() {
        let bucket = AudienceBucket::new("X", UploadKeyType::CrmId);
        assert!(bucket.is_empty());
        assert_eq!(bucket.name(), "X");
        assert_eq!(bucket.key_type(), UploadKeyType::CrmId);
    }
}
