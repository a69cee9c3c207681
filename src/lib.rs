//! Customer Match audience uploader for the Google Ads API.
//!
//! Reads a delimited audience file, normalizes and hashes PII, groups rows
//! into named user lists and uploads each list through an offline user data
//! job.

pub mod audience;
pub mod batching;
pub mod commands;
pub mod config;
pub mod error;
pub mod googleads;
pub mod validation;
