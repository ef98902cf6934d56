//! Command-line surface of the `sitemover` binary.
//!
//! # Design
//! - Every subcommand becomes exactly one dispatched job; the CLI waits for it unless
//!   `upload --detach` asks for the submission receipt instead.
//! - The status payload is the command's output document. Exit status follows the
//!   payload, not whether a single item failed to copy.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use sitemover_archive::ArchiveFormat;
use sitemover_config::AppConfig;
use sitemover_core::ItemOutcome;
use sitemover_remote::{GroupServiceClient, RemoteStoreClient, RemoteStoreSink};
use sitemover_source::SourceClient;
use sitemover_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::dispatcher::{JobCompletion, JobKind, JobSpec, MigrationDispatcher};
use crate::error::{AppError, AppResult};
use crate::jobs::FileJobStore;
use crate::migrate;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(
    name = "sitemover",
    version,
    about = "Migrate LMS site content into archives, a remote store, or a messaging group"
)]
pub struct Cli {
    /// Write Prometheus metrics to this file once the command finishes.
    #[arg(long, global = true)]
    pub metrics_out: Option<PathBuf>,
    /// Migration to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported migrations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Package site content into a zip or tar.gz archive.
    Archive(ArchiveArgs),
    /// Copy site content into a remote store folder.
    Upload(UploadArgs),
    /// Package the site mail archive into a zip or tar.gz archive.
    MailArchive(ArchiveArgs),
    /// Post the site mail archive to a messaging group.
    MailGroup(GroupArgs),
}

/// Arguments shared by every migration.
#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    /// Source site identifier.
    #[arg(long = "site")]
    pub site_id: String,
    /// Source session token.
    #[arg(long, env = "SITEMOVER_SESSION", hide_env_values = true)]
    pub session: String,
    /// Job identifier; a random one is generated when omitted.
    #[arg(long)]
    pub job_id: Option<String>,
}

/// Arguments of `archive` and `mail-archive`.
#[derive(Debug, Clone, Args)]
pub struct ArchiveArgs {
    /// Site being migrated.
    #[command(flatten)]
    pub site: SiteArgs,
    /// Archive file to create.
    #[arg(long)]
    pub out: PathBuf,
    /// `zip` or `tar-gz`.
    #[arg(long, default_value_t = ArchiveFormat::Zip)]
    pub format: ArchiveFormat,
}

/// Arguments of `upload`.
#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// Site being migrated.
    #[command(flatten)]
    pub site: SiteArgs,
    /// Remote folder receiving the site content.
    #[arg(long)]
    pub folder_id: String,
    /// Print the submission receipt instead of waiting for the final payload.
    #[arg(long)]
    pub detach: bool,
}

/// Arguments of `mail-group`.
#[derive(Debug, Clone, Args)]
pub struct GroupArgs {
    /// Site being migrated.
    #[command(flatten)]
    pub site: SiteArgs,
    /// Target group identifier.
    #[arg(long = "group")]
    pub group_id: String,
}

/// What a command produced.
#[derive(Debug)]
pub struct Execution {
    /// Job that ran or was submitted.
    pub job_id: String,
    /// Document printed on stdout.
    pub document: Value,
    /// Whether the command should exit successfully.
    pub success: bool,
    /// A detached job still running; the process must outlive it.
    pub pending: Option<JoinHandle<JobCompletion<ItemOutcome>>>,
}

fn require(field: &'static str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidArgument {
            field,
            reason: "must not be empty",
            value: None,
        });
    }
    Ok(())
}

fn create_output(path: &Path) -> AppResult<File> {
    File::create(path).map_err(|err| AppError::io("archive.create_output", path, err))
}

/// Shared wiring for one command invocation.
struct Runner<'a> {
    config: &'a AppConfig,
    http: Client,
    store: FileJobStore,
    dispatcher: MigrationDispatcher,
}

impl<'a> Runner<'a> {
    fn new(config: &'a AppConfig, metrics: &Metrics) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|source| AppError::Http {
                operation: "http.build_client",
                source,
            })?;
        let store = FileJobStore::new(&config.job_dir);
        let dispatcher = MigrationDispatcher::new(
            config.max_concurrent_jobs,
            Arc::new(store.clone()),
            metrics.clone(),
        );
        Ok(Self {
            config,
            http,
            store,
            dispatcher,
        })
    }

    fn source(&self, site: &SiteArgs) -> SourceClient {
        SourceClient::new(
            self.http.clone(),
            self.config.source_url.clone(),
            site.session.clone(),
        )
    }

    /// Validate the site arguments and settle the job id.
    fn spec(&self, site: &SiteArgs, kind: JobKind, sink_label: &'static str) -> AppResult<JobSpec> {
        require("site", &site.site_id)?;
        require("session", &site.session)?;
        let job_id = site
            .job_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.store.record_path(&job_id).is_err() {
            return Err(AppError::InvalidArgument {
                field: "job-id",
                reason: "only letters, digits, '.', '_' and '-' are allowed",
                value: Some(job_id),
            });
        }
        Ok(JobSpec {
            job_id,
            site_id: site.site_id.clone(),
            kind,
            sink_label,
        })
    }

    async fn archive(&self, args: ArchiveArgs) -> AppResult<Execution> {
        let spec = self.spec(&args.site, JobKind::Archive, "archive")?;
        let out = create_output(&args.out)?;
        let source = self.source(&args.site);
        let job_id = spec.job_id.clone();
        let site_id = spec.site_id.clone();
        let format = args.format;
        info!(site_id = %site_id, out = %args.out.display(), %format, "archiving site content");
        let handle = self.dispatcher.submit(spec, async move {
            migrate::site_into_archive(&source, &site_id, format, out).await
        });
        finished(job_id, handle).await
    }

    async fn mail_archive(&self, args: ArchiveArgs) -> AppResult<Execution> {
        let spec = self.spec(&args.site, JobKind::MailArchive, "archive")?;
        let out = create_output(&args.out)?;
        let source = self.source(&args.site);
        let job_id = spec.job_id.clone();
        let site_id = spec.site_id.clone();
        let format = args.format;
        info!(site_id = %site_id, out = %args.out.display(), %format, "archiving site mail");
        let handle = self.dispatcher.submit(spec, async move {
            migrate::mail_into_archive(&source, &site_id, format, out).await
        });
        finished(job_id, handle).await
    }

    async fn upload(&self, args: UploadArgs) -> AppResult<Execution> {
        let spec = self.spec(&args.site, JobKind::Upload, "Box")?;
        require("folder-id", &args.folder_id)?;
        let source = self.source(&args.site);
        let remote = RemoteStoreClient::new(
            self.http.clone(),
            self.config.remote.api_url.clone(),
            self.config.remote.upload_url.clone(),
            self.config.remote.token.clone(),
        );
        let mut sink = RemoteStoreSink::new(remote, args.folder_id.clone());
        let job_id = spec.job_id.clone();
        let site_id = spec.site_id.clone();
        info!(site_id = %site_id, folder_id = %args.folder_id, "uploading site content");
        let handle = self.dispatcher.submit(spec, async move {
            migrate::site_into_sink(&source, &site_id, &mut sink).await
        });

        if !args.detach {
            return finished(job_id, handle).await;
        }
        let record = self
            .store
            .record_path(&job_id)
            .unwrap_or_else(|_| self.store.dir().to_path_buf());
        Ok(Execution {
            document: json!({
                "job_id": job_id,
                "status": "submitted",
                "record": record.display().to_string(),
            }),
            job_id,
            success: true,
            pending: Some(handle),
        })
    }

    async fn mail_group(&self, args: GroupArgs) -> AppResult<Execution> {
        let spec = self.spec(&args.site, JobKind::MailGroup, "group")?;
        require("group", &args.group_id)?;
        let base = self
            .config
            .group_service_url
            .clone()
            .ok_or(AppError::MissingDependency {
                name: "SITEMOVER_GROUP_SERVICE_URL",
            })?;
        let publisher = GroupServiceClient::new(self.http.clone(), base);
        let source = self.source(&args.site);
        let job_id = spec.job_id.clone();
        let site_id = spec.site_id.clone();
        let group_id = args.group_id;
        info!(site_id = %site_id, group_id = %group_id, "posting site mail to group");
        let handle = self.dispatcher.submit(spec, async move {
            migrate::mail_into_group(&source, &site_id, &group_id, &publisher).await
        });
        finished(job_id, handle).await
    }
}

async fn finished<T: Serialize>(
    job_id: String,
    handle: JoinHandle<JobCompletion<T>>,
) -> AppResult<Execution> {
    let completion = handle
        .await
        .map_err(|source| AppError::Join { job_id, source })?;
    let document =
        serde_json::to_value(&completion.payload).map_err(|source| AppError::Encode {
            operation: "payload.encode",
            source,
        })?;
    Ok(Execution {
        job_id: completion.job_id,
        document,
        success: completion.payload.is_success(),
        pending: None,
    })
}

/// Run `command` against `config`, counting into `metrics`.
///
/// # Errors
///
/// Returns an error for invalid arguments, missing collaborators, an unwritable output
/// file, or a job task that panicked. Migration failures are reported in the document.
pub async fn execute(config: &AppConfig, command: Command, metrics: &Metrics) -> AppResult<Execution> {
    let runner = Runner::new(config, metrics)?;
    match command {
        Command::Archive(args) => runner.archive(args).await,
        Command::MailArchive(args) => runner.mail_archive(args).await,
        Command::Upload(args) => runner.upload(args).await,
        Command::MailGroup(args) => runner.mail_group(args).await,
    }
}
