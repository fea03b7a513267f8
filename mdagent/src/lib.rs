use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dbtlineage::{LineageGraph, LineageIngestor, Manifest};
use dremiofetcher::{CancelToken, CatalogService, DiscoveryParams, DremioClient, DremioConfig};
use omstorage::lineage_check::{render_ascii, render_markdown};
use omstorage::{
    LineageVerifier, MetadataRepository, OpenMetadataClient, RepositoryConfig, SyncConfig,
    SyncEngine, SyncMode, TableFilter,
};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Parses the command line, runs the chosen command and reports whether it
/// finished without errors.
pub async fn run_cli() -> anyhow::Result<bool> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Command::Sync(args) => run_sync(args, cli.json).await,
        Command::Lineage(args) => run_lineage(args, cli.json).await,
        Command::CheckLineage(args) => run_check_lineage(args, cli.json).await,
        Command::TestConnection(args) => run_test_connection(args, cli.json).await,
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirrors a Dremio catalog and dbt lineage into OpenMetadata")]
struct Cli {
    /// Log filter, e.g. `debug` or `omstorage=debug,info`. Overrides RUST_LOG.
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,
    /// Print the command result as JSON instead of a text summary
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronizes the Dremio catalog into OpenMetadata
    Sync(SyncArgs),
    /// Ingests dbt model lineage from a manifest.json
    Lineage(LineageArgs),
    /// Audits the lineage recorded in OpenMetadata
    CheckLineage(CheckLineageArgs),
    /// Verifies that both Dremio and OpenMetadata are reachable
    TestConnection(ConnectionArgs),
}

#[derive(Args, Debug, Clone)]
struct DremioArgs {
    #[arg(long, env = "DREMIO_URL", default_value = "http://localhost:9047")]
    dremio_url: String,
    #[arg(long, env = "DREMIO_USER", default_value = "admin")]
    dremio_user: String,
    #[arg(long, env = "DREMIO_PASSWORD", hide_env_values = true)]
    dremio_password: String,
}

impl DremioArgs {
    fn config(&self) -> DremioConfig {
        DremioConfig::new(&self.dremio_url, &self.dremio_user, &self.dremio_password)
    }
}

#[derive(Args, Debug, Clone)]
struct RepositoryArgs {
    /// OpenMetadata API root
    #[arg(long, env = "OPENMETADATA_URL", default_value = "http://localhost:8585/api")]
    openmetadata_url: String,
    #[arg(long, env = "OPENMETADATA_JWT_TOKEN", hide_env_values = true)]
    openmetadata_token: String,
    /// Database service entities are attached to
    #[arg(long, env = "OPENMETADATA_SERVICE", default_value = "dremio_service")]
    service: String,
}

impl RepositoryArgs {
    fn config(&self) -> RepositoryConfig {
        RepositoryConfig::new(&self.openmetadata_url, &self.openmetadata_token, &self.service)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Full,
    Incremental,
    DryRun,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => SyncMode::Full,
            ModeArg::Incremental => SyncMode::Incremental,
            ModeArg::DryRun => SyncMode::DryRun,
        }
    }
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    mode: ModeArg,
    /// Containers deeper than this are not expanded
    #[arg(long)]
    max_depth: Option<usize>,
    /// Databases synchronized concurrently
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    #[command(flatten)]
    dremio: DremioArgs,
    #[command(flatten)]
    repository: RepositoryArgs,
}

#[derive(Args, Debug)]
struct LineageArgs {
    /// Path to dbt's target/manifest.json
    #[arg(long)]
    manifest: PathBuf,
    /// Compute edges without writing to OpenMetadata
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[command(flatten)]
    repository: RepositoryArgs,
}

#[derive(Args, Debug)]
struct CheckLineageArgs {
    /// Check a single table instead of a whole listing
    #[arg(long, conflicts_with_all = ["database", "schema"])]
    fqn: Option<String>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long, requires = "database")]
    schema: Option<String>,
    /// Write the rendered report to this file
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(flatten)]
    repository: RepositoryArgs,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    #[command(flatten)]
    dremio: DremioArgs,
    #[command(flatten)]
    repository: RepositoryArgs,
}

fn init_tracing(level: Option<&str>) {
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Cancels `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight requests");
            token.cancel();
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wires the HTTP clients into a [`SyncEngine`].
pub fn build_sync_engine(
    dremio: &DremioConfig,
    repository: &RepositoryConfig,
    sync: SyncConfig,
) -> anyhow::Result<SyncEngine> {
    let catalog: Arc<dyn CatalogService> =
        Arc::new(DremioClient::new(dremio).context("invalid Dremio configuration")?);
    let repository: Arc<dyn MetadataRepository> = Arc::new(
        OpenMetadataClient::new(repository).context("invalid OpenMetadata configuration")?,
    );
    Ok(SyncEngine::new(catalog, repository, sync))
}

fn repository_client(args: &RepositoryArgs) -> anyhow::Result<Arc<dyn MetadataRepository>> {
    let client = OpenMetadataClient::new(&args.config())
        .context("invalid OpenMetadata configuration")?;
    Ok(Arc::new(client))
}

async fn run_sync(args: SyncArgs, json: bool) -> anyhow::Result<bool> {
    let mut sync = SyncConfig::new(
        &args.repository.service,
        &args.dremio.dremio_user,
        &args.dremio.dremio_password,
    );
    sync.concurrency = args.concurrency;
    if let Some(max_depth) = args.max_depth {
        sync.discovery = DiscoveryParams { max_depth };
    }

    let engine = build_sync_engine(&args.dremio.config(), &args.repository.config(), sync)?;
    let cancel = CancelToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let stats = engine
        .sync(args.mode.into(), &cancel)
        .await
        .context("synchronization aborted")?;

    if json {
        print_json(&stats)?;
    } else {
        println!("Sync ({}) finished in {:.1}s", stats.mode, stats.duration.as_secs_f64());
        println!("  resources discovered: {}", stats.resources_discovered);
        println!(
            "  databases: {} created, {} updated",
            stats.databases_created, stats.databases_updated
        );
        println!(
            "  schemas:   {} created, {} updated",
            stats.schemas_created, stats.schemas_updated
        );
        println!(
            "  tables:    {} created, {} updated",
            stats.tables_created, stats.tables_updated
        );
        println!("  warnings:  {}", stats.warnings.len());
        println!("  errors:    {}", stats.errors.len());
        for err in &stats.errors {
            println!("    - {err}");
        }
        if stats.cancelled {
            println!("  (cancelled)");
        }
    }
    Ok(stats.is_success())
}

async fn run_lineage(args: LineageArgs, json: bool) -> anyhow::Result<bool> {
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("cannot read {}", args.manifest.display()))?;
    let graph = LineageGraph::from_manifest(&manifest, &args.repository.service);

    let unresolved: usize = graph
        .models()
        .iter()
        .map(|model| graph.edges(model).unresolved.len())
        .sum();
    if unresolved > 0 {
        warn!("{unresolved} dependency reference(s) could not be resolved");
    }

    let ingestor = LineageIngestor::new(repository_client(&args.repository)?);
    let stats = ingestor.ingest(&graph, args.dry_run).await;

    if json {
        print_json(&stats)?;
    } else {
        println!(
            "Lineage{} for {} model(s)",
            if args.dry_run { " (dry run)" } else { "" },
            stats.models_processed
        );
        println!("  tables upserted: {}", stats.tables_upserted);
        println!("  edges created:   {}", stats.lineage_created);
        println!("  errors:          {}", stats.errors.len());
        for err in &stats.errors {
            println!("    - {err}");
        }
    }
    Ok(stats.is_success())
}

async fn run_check_lineage(args: CheckLineageArgs, json: bool) -> anyhow::Result<bool> {
    let verifier = LineageVerifier::new(repository_client(&args.repository)?);

    if let Some(fqn) = &args.fqn {
        let result = verifier.check_entity(fqn).await;
        let text = render_ascii(&result);
        if json {
            print_json(&result)?;
        } else {
            print!("{text}");
        }
        if let Some(path) = &args.report {
            std::fs::write(path, &text)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            info!("report written to {}", path.display());
        }
        return Ok(result.issues.is_empty());
    }

    let filter = TableFilter {
        database: args.database.clone(),
        schema: args.schema.clone(),
    };
    let report = verifier
        .check_all(&filter)
        .await
        .context("cannot list tables")?;

    if json {
        print_json(&report)?;
    } else {
        println!("Lineage check for service {}", args.repository.service);
        println!("  tables:          {}", report.total);
        println!("  with lineage:    {}", report.with_lineage);
        println!("  without lineage: {}", report.without_lineage);
        println!("  completion:      {:.1}%", report.completion_rate * 100.0);
        println!("  with issues:     {}", report.with_issues);
    }
    if let Some(path) = &args.report {
        let markdown = render_markdown(&report, &args.repository.service, args.database.as_deref());
        std::fs::write(path, markdown)
            .with_context(|| format!("cannot write report to {}", path.display()))?;
        info!("report written to {}", path.display());
    }
    Ok(report.with_issues == 0)
}

#[derive(Serialize)]
struct ConnectionStatus {
    dremio: Result<String, String>,
    openmetadata: Result<String, String>,
}

async fn run_test_connection(args: ConnectionArgs, json: bool) -> anyhow::Result<bool> {
    let dremio = DremioClient::new(&args.dremio.config()).context("invalid Dremio configuration")?;
    let dremio_status = async {
        dremio
            .login(&args.dremio.dremio_user, &args.dremio.dremio_password)
            .await?;
        dremio.health().await?;
        Ok::<_, dremiofetcher::FetcherError>(format!("connected to {}", args.dremio.dremio_url))
    }
    .await
    .map_err(|err| err.to_string());

    let repository = repository_client(&args.repository)?;
    let repository_status = repository
        .health()
        .await
        .map(|version| format!("OpenMetadata {version} at {}", args.repository.openmetadata_url))
        .map_err(|err| err.to_string());

    let status = ConnectionStatus {
        dremio: dremio_status,
        openmetadata: repository_status,
    };
    if json {
        print_json(&status)?;
    } else {
        for (name, result) in [("Dremio", &status.dremio), ("OpenMetadata", &status.openmetadata)] {
            match result {
                Ok(message) => println!("{name}: ok ({message})"),
                Err(message) => {
                    error!("{name} connection failed: {message}");
                    println!("{name}: FAILED ({message})");
                }
            }
        }
    }
    Ok(status.dremio.is_ok() && status.openmetadata.is_ok())
}
