//! deltasync-extract - incremental user extraction

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deltasync_common::logging::{init_logging, LogConfig, LogLevel};
use deltasync_extract::config::{
    CallPolicies, CallPolicy, FailureAction, RetryPolicy, DEFAULT_INGESTION_TIMEOUT_SECS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
use deltasync_extract::{ExtractionJobConfig, ExtractionWorker, WorkerStatus};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "deltasync-extract")]
#[command(author, version, about = "Incremental user extraction into an ingestion endpoint")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one extraction per company and wait for all of them
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Base URL of the source portal
    #[arg(long, env = "DELTASYNC_DOMAIN")]
    domain: String,

    #[arg(long, env = "DELTASYNC_USERNAME")]
    username: String,

    #[arg(long, env = "DELTASYNC_PASSWORD", hide_env_values = true)]
    password: String,

    /// Only users modified after this epoch-millis timestamp are extracted
    #[arg(long, env = "DELTASYNC_WATERMARK", default_value_t = 0)]
    watermark: i64,

    /// Company (tenant) to extract; repeat or comma-separate for several
    #[arg(long = "company-id", env = "DELTASYNC_COMPANY_IDS", value_delimiter = ',', required = true)]
    company_ids: Vec<String>,

    #[arg(long, env = "DELTASYNC_DATASOURCE_ID")]
    datasource_id: String,

    /// Ingestion endpoint receiving one POST per user
    #[arg(long, env = "DELTASYNC_INGESTION_URL")]
    ingestion_url: String,

    /// Attempts per source request
    #[arg(long, env = "DELTASYNC_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Pause between two attempts, in seconds
    #[arg(long, env = "DELTASYNC_RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    retry_delay_secs: u64,

    /// Timeout of each source request, in seconds
    #[arg(long, env = "DELTASYNC_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Timeout of each ingestion POST, in seconds
    #[arg(long, env = "DELTASYNC_INGESTION_TIMEOUT_SECS", default_value_t = DEFAULT_INGESTION_TIMEOUT_SECS)]
    ingestion_timeout_secs: u64,

    /// Abort a run after this many failed deliveries
    #[arg(long, env = "DELTASYNC_MAX_DELIVERY_ERRORS")]
    max_delivery_errors: Option<u32>,
}

impl RunArgs {
    fn policies(&self) -> CallPolicies {
        let upstream = RetryPolicy::fixed(
            self.max_attempts,
            Duration::from_secs(self.retry_delay_secs),
            Duration::from_secs(self.timeout_secs),
        );

        CallPolicies {
            ingestion: CallPolicy {
                retry: RetryPolicy::single_attempt(Duration::from_secs(
                    self.ingestion_timeout_secs,
                )),
                on_failure: FailureAction::RecordAndContinue,
            },
            ..CallPolicies::with_upstream_retry(upstream)
        }
    }

    fn job_config(&self) -> Result<ExtractionJobConfig> {
        let first = self
            .company_ids
            .first()
            .context("At least one --company-id is required")?;

        let config = ExtractionJobConfig::new(
            &self.domain,
            self.username.as_str(),
            self.password.as_str(),
            self.watermark,
            first.as_str(),
            self.datasource_id.as_str(),
            &self.ingestion_url,
        )?
        .with_policies(self.policies())
        .with_max_delivery_errors(self.max_delivery_errors);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("deltasync-extract")
        .filter_directives("hyper=warn,reqwest=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let base = args.job_config()?;
    let shutdown = CancellationToken::new();

    let mut handles = Vec::with_capacity(args.company_ids.len());
    for company_id in &args.company_ids {
        let config = base.for_company(company_id.as_str());
        let worker = ExtractionWorker::from_config(&config, shutdown.child_token())?;
        handles.push(worker.start());
    }

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling extraction workers");
                shutdown.cancel();
            }
        }
    });

    let reports = futures::future::join_all(handles.into_iter().map(|handle| async move {
        let company_id = handle.company_id().to_string();
        (company_id, handle.join_report().await)
    }))
    .await;

    let mut all_done = true;
    for (company_id, report) in &reports {
        info!(
            company_id = %company_id,
            status = %report.status,
            examined = report.stats.examined,
            forwarded = report.stats.forwarded,
            delivery_failures = report.stats.delivery_failures,
            "Worker finished"
        );
        all_done &= report.status == WorkerStatus::Done;
    }

    Ok(if all_done {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
