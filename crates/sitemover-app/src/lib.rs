#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! `sitemover` application wiring.
//!
//! Layout: `cli.rs` (arguments and command execution), `dispatcher.rs` (background jobs),
//! `migrate.rs` (job bodies), `jobs.rs` (file-backed job records), `error.rs`.

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod migrate;

use std::path::Path;

use sitemover_config::AppConfig;
use sitemover_core::describe_error;
use sitemover_telemetry::{LoggingConfig, Metrics, init_logging, log_format_from_str};
use tracing::{error, info};

pub use cli::{Cli, Command, Execution, execute};
pub use dispatcher::{JobCompletion, JobKind, JobSpec, MigrationDispatcher};
pub use error::{AppError, AppResult, EXIT_FAILURE, EXIT_USAGE};
pub use jobs::FileJobStore;

/// Load configuration, install logging, run `cli`, and print its document on stdout.
/// Returns the process exit code.
pub async fn run(cli: Cli) -> u8 {
    match run_cli(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %describe_error(&err), "command failed");
            eprintln!("error: {}", describe_error(&err));
            err.exit_code()
        }
    }
}

async fn run_cli(cli: Cli) -> AppResult<u8> {
    let Cli {
        metrics_out,
        command,
    } = cli;
    let config = AppConfig::from_env().map_err(|source| AppError::config("config.load", source))?;
    init_logging(&LoggingConfig {
        level: &config.log_level,
        format: log_format_from_str(config.log_format.as_deref()),
        build_sha: option_env!("SITEMOVER_BUILD_SHA").unwrap_or("dev"),
    })
    .map_err(|source| AppError::telemetry("telemetry.init_logging", source))?;
    let metrics =
        Metrics::new().map_err(|source| AppError::telemetry("telemetry.metrics", source))?;

    let execution = execute(&config, command, &metrics).await?;
    let rendered = serde_json::to_string_pretty(&execution.document).map_err(|source| {
        AppError::Encode {
            operation: "payload.render",
            source,
        }
    })?;
    println!("{rendered}");

    if let Some(pending) = execution.pending {
        let job_id = execution.job_id.clone();
        let completion = pending
            .await
            .map_err(|source| AppError::Join { job_id, source })?;
        info!(
            job_id = %completion.job_id,
            status = completion.payload.status.as_str(),
            "detached job finished"
        );
    }

    if let Some(path) = metrics_out {
        write_metrics(&path, &metrics).await?;
    }
    Ok(if execution.success { 0 } else { EXIT_FAILURE })
}

async fn write_metrics(path: &Path, metrics: &Metrics) -> AppResult<()> {
    let rendered = metrics
        .render()
        .map_err(|source| AppError::telemetry("telemetry.render", source))?;
    tokio::fs::write(path, rendered)
        .await
        .map_err(|err| AppError::io("metrics.write", path, err))
}
