//! Command handlers behind the `upload` and `check-job` subcommands.
//!
//! Handlers talk to the API through [`CustomerMatchOps`] so orchestration can
//! be tested against fakes, and write user-facing lines to a [`Console`].

use std::path::PathBuf;

pub mod ops;
pub mod resolve;
pub mod status;
pub mod submit;
pub mod upload;

pub use ops::CustomerMatchOps;
pub use resolve::{resolve_or_create, user_list_query};
pub use status::{check_job_status, fetch_audience_size, job_status_query, AudienceSize, JobStatusReport};
pub use submit::{build_operations, submit, PollingMode, SubmissionResult};
pub use upload::{run_upload, UploadRequest, UploadSummary};

/// The account a command runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    /// Customer ID without dashes.
    pub customer_id: String,
    /// Credentials file, echoed in the `check-job` guidance.
    pub config_path: PathBuf,
}

/// Sink for report lines.
///
/// Prints to stdout, or collects the lines when capturing.
#[derive(Debug, Default)]
pub struct Console {
    echo: bool,
    lines: Vec<String>,
}

impl Console {
    pub fn stdout() -> Self {
        Self {
            echo: true,
            lines: Vec::new(),
        }
    }

    pub fn capture() -> Self {
        Self::default()
    }

    pub fn line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{}", line);
        } else {
            self.lines.push(line);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
