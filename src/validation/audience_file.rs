//! Pre-flight validation of audience files.
//!
//! Reads only a fixed-size sample (512 KB), so it is cheap on large files,
//! and catches the problems that would otherwise surface halfway through an
//! upload:
//! - missing or empty file
//! - UTF-8 encoding errors
//! - missing headers or rows wider than the header

use std::fmt;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::audience::{UploadKeyType, COLUMNS};
use crate::config::UploadSettings;
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the sample buffer for validation (512 KB).
pub const VALIDATION_SAMPLE_SIZE: usize = 512 * 1024;

/// Maximum number of records to validate in the sample.
const MAX_RECORDS_TO_VALIDATE: usize = 1000;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const ADDRESS_COLUMNS: [&str; 4] = ["FirstName", "LastName", "CountryCode", "ZipCode"];

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of validating an audience file.
#[derive(Debug, Clone)]
pub struct AudienceFileReport {
    /// True when `errors` is empty.
    pub ok: bool,
    pub errors: Vec<AudienceFileError>,
    pub warnings: Vec<AudienceFileWarning>,
    pub stats: AudienceFileStats,
}

#[derive(Debug, Clone, Default)]
pub struct AudienceFileStats {
    pub file_size_bytes: u64,
    /// Bytes actually inspected.
    pub sample_bytes: u64,
    /// Header names, or the positional column names for headerless files.
    pub headers: Vec<String>,
    /// Data rows checked in the sample.
    pub validated_rows: u64,
}

/// Problems that stop the upload before any request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceFileError {
    NotFound,
    EmptyFile,
    NotUtf8,
    NoHeaders,
    /// A row has more fields than there are columns.
    InconsistentColumns {
        expected: usize,
        found: usize,
        /// 1-based physical row, header included.
        row: u64,
    },
    CsvParseError { message: String },
    IoError { message: String },
}

/// Issues worth mentioning that don't block the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceFileWarning {
    HasBom,
    /// Header names that are not audience columns; their values are ignored.
    UnknownColumns { columns: Vec<String> },
    /// None of the columns this list type reads are present, so every list
    /// will be skipped.
    NoColumnsForListType { list_type: UploadKeyType },
    /// Only the first part of the file was checked.
    SampleOnlyValidation { validated_rows: u64 },
}

impl fmt::Display for AudienceFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudienceFileError::NotFound => write!(f, "file not found"),
            AudienceFileError::EmptyFile => write!(f, "file is empty"),
            AudienceFileError::NotUtf8 => write!(f, "file is not valid UTF-8"),
            AudienceFileError::NoHeaders => write!(f, "file has no header row"),
            AudienceFileError::InconsistentColumns { expected, found, row } => write!(
                f,
                "row {} has {} fields, expected {}",
                row, found, expected
            ),
            AudienceFileError::CsvParseError { message } => write!(f, "{}", message),
            AudienceFileError::IoError { message } => write!(f, "{}", message),
        }
    }
}

impl fmt::Display for AudienceFileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudienceFileWarning::HasBom => write!(f, "file starts with a UTF-8 byte order mark"),
            AudienceFileWarning::UnknownColumns { columns } => {
                write!(f, "ignoring unknown columns: {}", columns.join(", "))
            }
            AudienceFileWarning::NoColumnsForListType { list_type } => write!(
                f,
                "no column usable for {} lists (expected one of: {})",
                list_type,
                relevant_columns(*list_type).join(", ")
            ),
            AudienceFileWarning::SampleOnlyValidation { validated_rows } => write!(
                f,
                "only the first {} rows were validated",
                validated_rows
            ),
        }
    }
}

impl AudienceFileReport {
    fn failed(error: AudienceFileError, warnings: Vec<AudienceFileWarning>, stats: AudienceFileStats) -> Self {
        Self {
            ok: false,
            errors: vec![error],
            warnings,
            stats,
        }
    }

    /// Converts a failed report into an error, returning the warnings otherwise.
    ///
    /// # Errors
    ///
    /// `AppError::FileError` for a missing file, `AppError::CsvInvalid` for
    /// everything else.
    pub fn into_result(self, path: &Path) -> Result<Vec<AudienceFileWarning>, AppError> {
        if self.ok {
            return Ok(self.warnings);
        }
        if self.errors.contains(&AudienceFileError::NotFound) {
            return Err(AppError::FileError(format!("{}: file not found", path.display())));
        }
        let details: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        Err(AppError::CsvInvalid(format!(
            "{}: {}",
            path.display(),
            details.join("; ")
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Validates an audience file for an upload of `key_type`.
///
/// # Arguments
///
/// * `path` - Audience file to check
/// * `settings` - Header flag and delimiter
/// * `key_type` - List type the rows will be uploaded as
///
/// # Errors
///
/// Never fails for problems with the file itself; those are reported in
/// `AudienceFileReport::errors`. Returns `AppError::Internal` only if the
/// sample buffer can't be read after the file was opened.
pub async fn validate(
    path: &Path,
    settings: &UploadSettings,
    key_type: UploadKeyType,
) -> Result<AudienceFileReport, AppError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut stats = AudienceFileStats::default();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(AudienceFileReport::failed(AudienceFileError::NotFound, warnings, stats)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(AudienceFileReport::failed(AudienceFileError::NotFound, warnings, stats));
        }
        Err(e) => {
            return Ok(AudienceFileReport::failed(
                AudienceFileError::IoError { message: e.to_string() },
                warnings,
                stats,
            ));
        }
    };

    stats.file_size_bytes = metadata.len();
    if stats.file_size_bytes == 0 {
        return Ok(AudienceFileReport::failed(AudienceFileError::EmptyFile, warnings, stats));
    }

    let sample_size = (stats.file_size_bytes as usize).min(VALIDATION_SAMPLE_SIZE);
    let mut buffer = vec![0u8; sample_size];

    let mut file = match File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            return Ok(AudienceFileReport::failed(
                AudienceFileError::IoError { message: e.to_string() },
                warnings,
                stats,
            ));
        }
    };
    file.read_exact(&mut buffer)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read audience file: {}", e)))?;

    stats.sample_bytes = sample_size as u64;
    let is_sample_only = stats.file_size_bytes > stats.sample_bytes;

    let has_bom = buffer.starts_with(UTF8_BOM);
    if has_bom {
        warnings.push(AudienceFileWarning::HasBom);
    }
    let mut data = &buffer[if has_bom { UTF8_BOM.len() } else { 0 }..];

    if let Err(e) = std::str::from_utf8(data) {
        // A multi-byte character cut by the sample boundary is not an encoding error.
        if is_sample_only && e.error_len().is_none() {
            data = &data[..e.valid_up_to()];
        } else {
            return Ok(AudienceFileReport::failed(AudienceFileError::NotUtf8, warnings, stats));
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(settings.header_line)
        .delimiter(settings.delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(Cursor::new(data));

    // Short rows leave trailing columns empty; only rows wider than the
    // columns are a problem.
    let expected_columns = if settings.header_line {
        let headers: Vec<String> = match reader.headers() {
            Ok(h) => h.iter().map(String::from).collect(),
            Err(e) => {
                return Ok(AudienceFileReport::failed(
                    AudienceFileError::CsvParseError { message: e.to_string() },
                    warnings,
                    stats,
                ));
            }
        };
        if headers.iter().all(|h| h.is_empty()) {
            return Ok(AudienceFileReport::failed(AudienceFileError::NoHeaders, warnings, stats));
        }

        let unknown: Vec<String> = headers
            .iter()
            .filter(|h| !COLUMNS.contains(&h.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            warnings.push(AudienceFileWarning::UnknownColumns { columns: unknown });
        }
        if !has_usable_columns(&headers, key_type) {
            warnings.push(AudienceFileWarning::NoColumnsForListType { list_type: key_type });
        }

        stats.headers = headers;
        stats.headers.len()
    } else {
        stats.headers = COLUMNS.iter().map(|c| c.to_string()).collect();
        COLUMNS.len()
    };

    let header_rows: u64 = if settings.header_line { 1 } else { 0 };
    let mut records = reader.records().take(MAX_RECORDS_TO_VALIDATE).peekable();

    while let Some(result) = records.next() {
        // The last record of a partial sample may be cut short.
        let is_last_in_sample = is_sample_only && records.peek().is_none();

        match result {
            Ok(record) => {
                if is_last_in_sample {
                    break;
                }
                stats.validated_rows += 1;

                let found = record.len();
                if found > expected_columns {
                    errors.push(AudienceFileError::InconsistentColumns {
                        expected: expected_columns,
                        found,
                        row: stats.validated_rows + header_rows,
                    });
                }
            }
            Err(e) => {
                if is_last_in_sample && is_likely_truncation_error(&e) {
                    break;
                }
                errors.push(AudienceFileError::CsvParseError { message: e.to_string() });
                break;
            }
        }
    }

    if is_sample_only {
        warnings.push(AudienceFileWarning::SampleOnlyValidation {
            validated_rows: stats.validated_rows,
        });
    }

    Ok(AudienceFileReport {
        ok: errors.is_empty(),
        errors,
        warnings,
        stats,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Columns a list of `key_type` reads.
fn relevant_columns(key_type: UploadKeyType) -> Vec<&'static str> {
    match key_type {
        UploadKeyType::ContactInfo => {
            let mut cols = vec!["Email", "Phone"];
            cols.extend(ADDRESS_COLUMNS);
            cols
        }
        UploadKeyType::MobileAdvertisingId => vec!["MobileId"],
        UploadKeyType::CrmId => vec!["UserId"],
    }
}

/// Whether any identifier of `key_type` can be built from these headers.
fn has_usable_columns(headers: &[String], key_type: UploadKeyType) -> bool {
    let has = |name: &str| headers.iter().any(|h| h == name);
    match key_type {
        UploadKeyType::ContactInfo => {
            has("Email") || has("Phone") || ADDRESS_COLUMNS.iter().all(|c| has(*c))
        }
        UploadKeyType::MobileAdvertisingId => has("MobileId"),
        UploadKeyType::CrmId => has("UserId"),
    }
}

fn is_likely_truncation_error(err: &csv::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unexpected eof") || msg.contains("record ends in a quote") || msg.contains("premature eof")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    async fn check(content: &[u8], key_type: UploadKeyType) -> AudienceFileReport {
        let file = create_temp_csv(content);
        validate(file.path(), &UploadSettings::default(), key_type)
            .await
            .expect("Validation should not fail")
    }

    #[tokio::test]
    async fn valid_contact_file_passes() {
        let report = check(b"Email,Phone,List\na@b.com,555,X\n", UploadKeyType::ContactInfo).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert_eq!(report.stats.headers, vec!["Email", "Phone", "List"]);
        assert_eq!(report.stats.validated_rows, 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let report = validate(
            Path::new("/no/such/audience.csv"),
            &UploadSettings::default(),
            UploadKeyType::ContactInfo,
        )
        .await
        .unwrap();

        assert_eq!(report.errors, vec![AudienceFileError::NotFound]);
        assert!(matches!(
            report.into_result(Path::new("/no/such/audience.csv")),
            Err(AppError::FileError(_))
        ));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let report = check(b"", UploadKeyType::ContactInfo).await;
        assert_eq!(report.errors, vec![AudienceFileError::EmptyFile]);
    }

    #[tokio::test]
    async fn non_utf8_is_rejected() {
        let report = check(b"Email,List\n\xff\xfe,X\n", UploadKeyType::ContactInfo).await;
        assert!(!report.ok);
        assert!(report.errors.contains(&AudienceFileError::NotUtf8));
    }

    #[tokio::test]
    async fn bom_is_a_warning() {
        let mut content = Vec::new();
        content.extend_from_slice(UTF8_BOM);
        content.extend_from_slice(b"Email,List\na@b.com,X\n");

        let report = check(&content, UploadKeyType::ContactInfo).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report.warnings.contains(&AudienceFileWarning::HasBom));
        assert_eq!(report.stats.headers, vec!["Email", "List"]);
    }

    #[tokio::test]
    async fn wide_row_is_reported_with_row_number() {
        let report = check(
            b"Email,List\na@b.com,X\nc@d.com,Y,extra\n",
            UploadKeyType::ContactInfo,
        )
        .await;

        assert!(!report.ok);
        assert!(report.errors.contains(&AudienceFileError::InconsistentColumns {
            expected: 2,
            found: 3,
            row: 3,
        }));
    }

    #[tokio::test]
    async fn unknown_columns_are_a_warning() {
        let report = check(b"Email,Notes\na@b.com,vip\n", UploadKeyType::ContactInfo).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report.warnings.contains(&AudienceFileWarning::UnknownColumns {
            columns: vec!["Notes".into()],
        }));
    }

    #[tokio::test]
    async fn missing_mobile_id_column_is_a_warning() {
        let report = check(b"Email,List\na@b.com,X\n", UploadKeyType::MobileAdvertisingId).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report.warnings.contains(&AudienceFileWarning::NoColumnsForListType {
            list_type: UploadKeyType::MobileAdvertisingId,
        }));
    }

    #[tokio::test]
    async fn partial_address_columns_are_not_usable() {
        let partial = check(b"FirstName,LastName\nJane,Doe\n", UploadKeyType::ContactInfo).await;
        assert!(partial.ok, "{:?}", partial.errors);
        assert!(partial.warnings.contains(&AudienceFileWarning::NoColumnsForListType {
            list_type: UploadKeyType::ContactInfo,
        }));

        let full = check(
            b"FirstName,LastName,CountryCode,ZipCode\nJane,Doe,US,94043\n",
            UploadKeyType::ContactInfo,
        )
        .await;
        assert!(full.ok, "{:?}", full.errors);
        assert!(full.warnings.is_empty());
    }

    #[tokio::test]
    async fn short_rows_are_accepted() {
        let report = check(
            b"Email,Phone,List\na@b.com\nc@d.com,555,X\n",
            UploadKeyType::ContactInfo,
        )
        .await;

        assert!(report.ok, "{:?}", report.errors);
        assert_eq!(report.stats.validated_rows, 2);
    }

    #[tokio::test]
    async fn padded_header_names_are_trimmed() {
        let report = check(b"Email, Phone ,List\na@b.com,555,X\n", UploadKeyType::ContactInfo).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.stats.headers, vec!["Email", "Phone", "List"]);
    }

    #[tokio::test]
    async fn headerless_files_allow_short_rows() {
        let file = create_temp_csv(b"a@b.com,555\nc@d.com,,,,,,,,Promo\n");
        let settings = UploadSettings::default().header_line(false);

        let report = validate(file.path(), &settings, UploadKeyType::ContactInfo)
            .await
            .unwrap();

        assert!(report.ok, "{:?}", report.errors);
        assert_eq!(report.stats.validated_rows, 2);
        assert_eq!(report.stats.headers.len(), COLUMNS.len());
    }

    #[tokio::test]
    async fn large_file_is_sample_only() {
        let mut content = Vec::new();
        content.extend_from_slice(b"Email,List\n");
        let mut i = 0;
        while content.len() <= VALIDATION_SAMPLE_SIZE {
            content.extend_from_slice(format!("user{}@example.com,List{}\n", i, i % 3).as_bytes());
            i += 1;
        }

        let report = check(&content, UploadKeyType::ContactInfo).await;

        assert!(report.ok, "{:?}", report.errors);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, AudienceFileWarning::SampleOnlyValidation { .. })));
    }

    #[tokio::test]
    async fn into_result_joins_errors() {
        let report = check(b"Email,List\na@b.com,X,Y\n", UploadKeyType::ContactInfo).await;
        let err = report.into_result(Path::new("aud.csv")).unwrap_err();
        assert!(matches!(err, AppError::CsvInvalid(msg) if msg.contains("row 2")));
    }
}
