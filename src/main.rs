//! l7pool CLI entrypoint.
//!
//! This is the main entrypoint for the l7pool command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use l7_pool::certs::StaticCertificates;
use l7_pool::cli::{Cli, Commands, OutputFormatter};
use l7_pool::cloud::{
    generate_holder_id, Cloud, FileCloud, InMemoryCloud, LOCK_REFRESH_INTERVAL,
};
use l7_pool::config::{find_config_file, ConfigParser, ConfigValidator, PoolConfig};
use l7_pool::controller::Controller;
use l7_pool::error::{L7PoolError, Result};
use l7_pool::events::TracingRecorder;
use l7_pool::loadbalancer::Collaborators;
use l7_pool::naming::ClusterNamer;
use l7_pool::pool::LoadBalancerPool;

use clap::Parser;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Directory holding the cloud file, next to the configuration file.
const CLOUD_DIR: &str = ".l7pool";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `L7POOL_LOG_FORMAT=json` switches to one JSON object per line.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let json = std::env::var("L7POOL_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Sync { dry_run } => cmd_sync(cli.config.as_ref(), dry_run, &formatter).await,
        Commands::Run {
            interval_secs,
            cleanup_on_exit,
            dry_run,
        } => {
            cmd_run(
                cli.config.as_ref(),
                interval_secs,
                cleanup_on_exit,
                dry_run,
                &formatter,
            )
            .await
        }
        Commands::Status => cmd_status(cli.config.as_ref(), &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let config = parse_config(&config_file)?;

    let validator = ConfigValidator::new();
    let result = validator.check(&config);
    eprintln!("{}", formatter.format_validation(&config, &result, show_warnings));

    // Fails with the first error, if any.
    validator.validate(&config)?;
    Ok(())
}

/// Run one reconcile pass.
async fn cmd_sync(
    config_path: Option<&PathBuf>,
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let backend = Backend::open(&config, &config_file, dry_run).await?;

    let controller = Controller::new(build_pool(&config, backend.cloud()));
    let result = controller.reconcile(&config).await;
    eprintln!("{}", formatter.format_reconciliation(&result));

    backend.close().await;

    if result.success {
        Ok(())
    } else {
        Err(L7PoolError::internal(format!(
            "Reconciliation finished with {} error(s)",
            result.errors.len()
        )))
    }
}

/// Reconcile until interrupted.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    interval_secs: Option<u64>,
    cleanup_on_exit: bool,
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let backend = Backend::open(&config, &config_file, dry_run).await?;

    let interval = Duration::from_secs(interval_secs.unwrap_or(config.gc.interval_secs).max(1));
    info!(
        "Reconciling every {}s against the {} cloud",
        interval.as_secs(),
        backend.cloud().backend_type()
    );

    let controller = Controller::new(build_pool(&config, backend.cloud()));
    let passes = controller
        .run(|| load_config_file(&config_file), interval, shutdown_signal())
        .await;
    debug!("Ran {passes} reconcile pass(es)");

    let mut outcome = Ok(());
    if cleanup_on_exit {
        info!("Deleting every tracked load balancer before exit");
        if let Err(e) = controller.pool().shutdown().await {
            error!("Shutdown left load balancers behind: {e}");
            outcome = Err(e);
        }
    } else {
        let tracked = controller.pool().tracked_names().await;
        if !tracked.is_empty() {
            warn!(
                "Leaving {} load balancer(s) in place: {}",
                tracked.len(),
                tracked.join(", ")
            );
        }
    }

    backend.close().await;

    if outcome.is_ok() {
        let tracked = controller.pool().len().await;
        eprintln!("{}", formatter.format_stopped(passes, tracked));
    }
    outcome
}

/// Show the resources in the cloud file.
async fn cmd_status(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let cloud = FileCloud::with_path(cloud_path(&config, &config_file));
    debug!("Reading cloud file: {}", cloud.path().display());

    let resources = cloud.resources().await?;
    let lock = cloud.get_lock_info().await?;

    eprintln!("{}", formatter.format_status(&resources, lock.as_ref()));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Cloud backend of a command, with the lock held on the cloud file.
enum Backend {
    /// The cloud file, locked for the lifetime of the command.
    File {
        cloud: Arc<FileCloud>,
        lock_id: String,
        refresher: JoinHandle<()>,
    },
    /// A throwaway in-memory cloud.
    Memory(Arc<InMemoryCloud>),
}

impl Backend {
    /// Opens the cloud file and locks it, or an in-memory cloud for dry runs.
    async fn open(config: &PoolConfig, config_file: &Path, dry_run: bool) -> Result<Self> {
        if dry_run {
            info!("Dry run: reconciling against an in-memory cloud");
            return Ok(Self::Memory(Arc::new(InMemoryCloud::new())));
        }

        let cloud = Arc::new(FileCloud::with_path(cloud_path(config, config_file)));
        let lock = cloud.acquire_lock(&generate_holder_id()).await?;
        info!("Locked cloud file {}", cloud.path().display());

        let refresher = spawn_lock_refresh(Arc::clone(&cloud), lock.lock_id.clone());
        Ok(Self::File {
            cloud,
            lock_id: lock.lock_id,
            refresher,
        })
    }

    fn cloud(&self) -> Arc<dyn Cloud> {
        match self {
            Self::File { cloud, .. } => Arc::clone(cloud) as Arc<dyn Cloud>,
            Self::Memory(cloud) => Arc::clone(cloud) as Arc<dyn Cloud>,
        }
    }

    /// Stops refreshing the lock and releases it.
    async fn close(self) {
        if let Self::File {
            cloud,
            lock_id,
            refresher,
        } = self
        {
            refresher.abort();
            if let Err(e) = cloud.release_lock(&lock_id).await {
                warn!("Failed to release cloud lock: {e}");
            }
        }
    }
}

/// Keeps the cloud lock alive while a long command runs.
fn spawn_lock_refresh(cloud: Arc<FileCloud>, lock_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LOCK_REFRESH_INTERVAL);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cloud.refresh_lock(&lock_id).await {
                Ok(()) => debug!("Refreshed cloud lock {lock_id}"),
                Err(e) => warn!("Failed to refresh cloud lock: {e}"),
            }
        }
    })
}

/// Builds a pool wired to the configured collaborators.
fn build_pool(config: &PoolConfig, cloud: Arc<dyn Cloud>) -> Arc<LoadBalancerPool> {
    let collaborators = Collaborators {
        cloud,
        namer: Arc::new(ClusterNamer::new(config.cluster.uid.clone())),
        certs: Arc::new(StaticCertificates::new(config.certificates.clone())),
        recorder: Arc::new(TracingRecorder),
    };
    Arc::new(LoadBalancerPool::new(collaborators).with_gc_strategy(config.gc.strategy))
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Directory containing the configuration file.
fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new("."))
}

/// Loads `.env` and the configuration file with environment overrides.
fn parse_config(config_file: &Path) -> Result<PoolConfig> {
    let parser = ConfigParser::new().with_base_path(config_dir(config_file));
    parser.load_dotenv()?;
    parser.load_with_env(config_file)
}

/// Parses and validates the configuration file.
fn load_config_file(config_file: &Path) -> Result<PoolConfig> {
    let config = parse_config(config_file)?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Resolves, parses and validates the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<(PoolConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());
    let config = load_config_file(&config_file)?;
    Ok((config, config_file))
}

/// Path of the cloud file.
fn cloud_path(config: &PoolConfig, config_file: &Path) -> PathBuf {
    config.cloud.path.as_ref().map_or_else(
        || config_dir(config_file).join(CLOUD_DIR).join("cloud.json"),
        PathBuf::from,
    )
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
