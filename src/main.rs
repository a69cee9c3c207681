//! `customer-match` binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use customer_match::audience::UploadKeyType;
use customer_match::commands::{
    check_job_status, run_upload, AccountContext, Console, PollingMode, UploadRequest,
};
use customer_match::config::{
    load_credentials, normalize_customer_id, UploadSettings, DEFAULT_CONFIG_PATH,
};
use customer_match::error::AppError;
use customer_match::googleads::GoogleAdsClient;

/// Uploads Customer Match audiences to Google Ads.
#[derive(Debug, Parser)]
#[command(name = "customer-match", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload an audience file, creating user lists as needed.
    Upload(UploadArgs),
    /// Check the status of an offline user data job.
    CheckJob(CheckJobArgs),
}

#[derive(Debug, Args)]
struct AccountArgs {
    /// Configuration file for Google Ads API access.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config_file: PathBuf,
    /// Customer ID to operate on; dashes are allowed.
    #[arg(long)]
    customer_id: String,
}

#[derive(Debug, Args)]
struct UploadArgs {
    #[command(flatten)]
    account: AccountArgs,
    /// Audience file to upload.
    #[arg(long, default_value = "./audience.csv")]
    audience_file: PathBuf,
    /// Customer Match upload key type.
    #[arg(long, value_enum, default_value_t = UploadKeyType::ContactInfo)]
    list_type: UploadKeyType,
    /// App ID to associate with the list. Only used for MOBILE_ADVERTISING_ID lists.
    #[arg(long)]
    app_id: Option<String>,
    /// Hash emails, phone numbers and names before uploading.
    #[arg(long)]
    hash_required: bool,
    /// Wait for each job to finish before moving on.
    #[arg(long)]
    wait: bool,
    /// The audience file has no header row; columns are positional.
    #[arg(long)]
    no_header: bool,
    /// Field delimiter of the audience file.
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// First delay between job completion checks with --wait, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_initial_ms: u64,
    /// Longest delay between job completion checks with --wait, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    poll_max_ms: u64,
}

#[derive(Debug, Args)]
struct CheckJobArgs {
    #[command(flatten)]
    account: AccountArgs,
    /// Resource name of the offline user data job.
    #[arg(long)]
    job_resource_name: String,
    /// Resource name of the user list the job populates.
    #[arg(long)]
    user_list_resource_name: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            for line in err.report_lines() {
                eprintln!("{}", line);
            }
            if err.is_caller_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut console = Console::stdout();

    match cli.command {
        Command::Upload(args) => {
            let mut settings = UploadSettings::default()
                .header_line(!args.no_header)
                .operation_poll(
                    Duration::from_millis(args.poll_initial_ms),
                    Duration::from_millis(args.poll_max_ms),
                );
            settings.delimiter = delimiter_byte(args.delimiter)?;

            let (client, account) = connect(&args.account, &settings)?;
            let request = UploadRequest {
                audience_file: args.audience_file,
                key_type: args.list_type,
                app_id: args.app_id,
                hash_required: args.hash_required,
                mode: if args.wait {
                    PollingMode::Wait
                } else {
                    PollingMode::SkipPolling
                },
            };
            run_upload(&client, &account, &request, &settings, &mut console).await?;
        }
        Command::CheckJob(args) => {
            let settings = UploadSettings::default();
            let (client, account) = connect(&args.account, &settings)?;
            check_job_status(
                &client,
                &account,
                &args.job_resource_name,
                &args.user_list_resource_name,
                &mut console,
            )
            .await?;
        }
    }

    Ok(())
}

fn connect(
    args: &AccountArgs,
    settings: &UploadSettings,
) -> Result<(GoogleAdsClient, AccountContext), AppError> {
    let account = AccountContext {
        customer_id: normalize_customer_id(&args.customer_id)?,
        config_path: args.config_file.clone(),
    };
    let creds = load_credentials(&args.config_file)?;
    let client = GoogleAdsClient::new(creds, settings)?;
    Ok((client, account))
}

fn delimiter_byte(delimiter: char) -> Result<u8, AppError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| AppError::Config(format!("delimiter '{}' must be a single ASCII character", delimiter)))
}
