//! Certkeeper - Main entry point
//!
//! Rate-limit aware TLS certificate renewal for fleets of sites.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use certkeeper::site::SiteSummary;
use certkeeper::{
    build_collaborators, index_sites, init_multi, CertManager, FileProbe, RateLimitPolicy,
    RenewalScheduler, SiteProbe,
};
use certkeeper_config::validate::{validate_certificates, validate_remote_hosts};
use certkeeper_config::{Config, DEFAULT_CONFIG_DIR};

/// Certkeeper - rate-limit aware TLS certificate renewal
#[derive(Parser, Debug)]
#[command(name = "certkeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration directory (config.kdl, config.toml or config.json)
    #[arg(long = "confdir", env = "CERTKEEPER_CONFDIR", default_value = DEFAULT_CONFIG_DIR)]
    confdir: PathBuf,

    /// Configuration file, overriding --confdir
    #[arg(short = 'c', long = "config", env = "CERTKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Keep running, one cycle every loop-restart-minutes
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Log line format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run renewal cycles (default)
    Run,
    /// Validate the configuration and exit
    Check {
        /// Also inspect deployed certificates and reach remote updaters
        #[arg(long = "online")]
        online: bool,
    },
    /// Print which sites the next cycle would renew, without renewing
    Plan,
    /// Renew one configured site now, bypassing admission control
    Force {
        /// Site URL as configured
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, cli.daemon).await,
        Commands::Check { online } => check(&config, online).await,
        Commands::Plan => plan(&config).await,
        Commands::Force { url } => force(&config, &url).await,
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))
        }
        None => {
            info!("Loading configuration from directory: {}", cli.confdir.display());
            Config::from_dir(&cli.confdir).with_context(|| {
                format!("Failed to load configuration from {}", cli.confdir.display())
            })
        }
    }
}

/// Validate configuration and exit
async fn check(config: &Config, online: bool) -> Result<()> {
    let mut result = config.validate();
    if online {
        result.merge(validate_certificates(config).await);
        result.merge(validate_remote_hosts(config).await);
    }

    for warning in &result.warnings {
        warn!("{}", warning.message);
    }

    if !result.is_valid() {
        bail!("Configuration validation failed:\n{}", result.error_summary());
    }

    info!("Configuration test successful:");
    info!("  - {} site(s)", config.sites.len());
    info!("  - {} updater(s)", config.updaters.len());
    info!("  - {} notifier(s)", config.notifiers.len());
    info!("  - {} DNS server(s)", config.dns_servers.len());
    info!("  - {} recipient rule(s)", config.manager.recipients.len());

    println!(
        "certkeeper: configuration test is successful ({} warning(s))",
        result.warnings.len()
    );
    Ok(())
}

/// Print the selection of the next cycle
async fn plan(config: &Config) -> Result<()> {
    let sites = init_multi(&config.sites).await;
    let groups = index_sites(&sites);
    let selection = RateLimitPolicy::new(config.manager.limits.clone()).sites_to_renew(&groups);

    for group in &groups {
        println!("{:<30} {:>4} site(s)", display_domain(&group.name), group.len());
    }
    println!();

    if selection.is_empty() {
        println!("Nothing to renew.");
    }
    for site in &selection.sites {
        println!("renew    {}", SiteSummary(site.as_ref()));
    }
    for exclusion in &selection.exclusions {
        println!("exclude  {}", exclusion);
    }
    for domain in &selection.backlogged {
        println!("backlog  {}", display_domain(domain));
    }
    Ok(())
}

fn display_domain(name: &str) -> &str {
    if name.is_empty() {
        "(no domain)"
    } else {
        name
    }
}

fn manager_for(config: &Config, collaborators: certkeeper::Collaborators) -> CertManager {
    CertManager::new(
        config.manager.clone(),
        collaborators.updaters,
        Vec::new(),
        collaborators.notifiers,
        collaborators.backends,
        collaborators.authority,
    )
}

/// Run one cycle, or cycles until a shutdown signal in daemon mode
async fn run(config: Config, daemon: bool) -> Result<()> {
    config
        .ensure_valid()
        .context("Configuration validation failed")?;

    let collaborators =
        build_collaborators(&config).context("Failed to build renewal collaborators")?;
    let sites = init_multi(&config.sites).await;
    info!(
        configured = config.sites.len(),
        probed = sites.len(),
        "Probed sites"
    );

    let scheduler = RenewalScheduler::new(manager_for(&config, collaborators), sites)
        .with_interval(Duration::from_secs(config.loop_restart_minutes * 60));

    if !daemon {
        let mut scheduler = scheduler;
        let report = scheduler.run_once().await;
        println!("{}", report);
        for failure in &report.failures {
            println!("  failed {} at {}: {}", failure.url, failure.stage, failure.error);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, stopping after the current cycle");
        if shutdown_tx.send(true).is_err() {
            debug!("Scheduler already stopped before shutdown was signalled");
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Renew a single configured site now
async fn force(config: &Config, url: &str) -> Result<()> {
    let site_config = config
        .site(url)
        .with_context(|| format!("Site '{}' is not configured", url))?
        .clone();

    let collaborators =
        build_collaborators(config).context("Failed to build renewal collaborators")?;

    let site = match FileProbe::open(site_config.clone()).await {
        Ok(probe) => probe,
        Err(e) => {
            warn!(site = %url, error = %e, "Cannot probe site; renewing anyway");
            FileProbe::unprobed(site_config)
        }
    };

    manager_for(config, collaborators)
        .force_renew_for_site(&site)
        .await
        .with_context(|| format!("Forced renewal of {} failed", url))?;

    match site.refresh().await {
        Ok(()) => println!(
            "certkeeper: renewed {} for {}",
            SiteSummary(&site),
            site.names().join(", ")
        ),
        Err(e) => {
            warn!(site = %url, error = %e, "Cannot re-read the deployed certificate");
            println!("certkeeper: {} renewed", url);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
