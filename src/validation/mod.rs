//! Audience file validation.
//!
//! Checks a fixed-size sample of the input so problems are reported before
//! any list is created or job submitted.

pub mod audience_file;

pub use audience_file::{
    validate, AudienceFileError, AudienceFileReport, AudienceFileStats, AudienceFileWarning,
    VALIDATION_SAMPLE_SIZE,
};
