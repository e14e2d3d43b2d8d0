mod dataplane;
mod netaddr;

use clap::Parser;
use pkg_constants::loxilb::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RESYNC_SECS, INGRESS_CLASS_NAME};
use pkg_constants::network::{DEFAULT_API_ADDR, DEFAULT_LOXILB_URL};
use pkg_constants::paths::{DEFAULT_CONFIG, DEFAULT_LOXILB_ARGS, DEFAULT_LOXILB_BINARY};
use pkg_constants::registry::INGRESS_PREFIX;
use pkg_controllers::{ControllerConfig, IngressController, IngressReconciler};
use pkg_loxilb::LoxiClient;
use pkg_state::{ApiStore, Watcher};
use pkg_types::config::{ControllerConfigFile, load_config_file};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loxilb-ingress", about = "Ingress controller for the loxilb load balancer")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// loxilb API endpoint
    #[arg(long)]
    loxilb_url: Option<String>,

    /// Cluster API server endpoint
    #[arg(long)]
    api_server: Option<String>,

    /// Bearer token for the API server
    #[arg(long)]
    token: Option<String>,

    /// Address path-routed rules listen on (defaults to this host's non-loopback IPv4)
    #[arg(long)]
    external_ip: Option<String>,

    /// Number of concurrent reconcile workers
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds between full resyncs
    #[arg(long)]
    resync_secs: Option<u64>,

    /// Ingress class to handle
    #[arg(long)]
    ingress_class: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Run and supervise a local loxilb process
    #[arg(long)]
    spawn_loxilb: bool,

    /// loxilb binary used with --spawn-loxilb
    #[arg(long)]
    loxilb_binary: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let loxilb_url = cli
        .loxilb_url
        .or(file_cfg.loxilb_url)
        .unwrap_or_else(|| DEFAULT_LOXILB_URL.to_string());
    let api_server = cli
        .api_server
        .or(file_cfg.api_server)
        .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
    let token = cli.token.or(file_cfg.token).unwrap_or_default();
    let workers = cli.workers.or(file_cfg.workers).unwrap_or(1);
    let resync_interval = resync_interval(
        cli.resync_secs
            .or(file_cfg.resync_secs)
            .unwrap_or(DEFAULT_RESYNC_SECS),
    )?;
    let ingress_class = cli
        .ingress_class
        .or(file_cfg.ingress_class)
        .unwrap_or_else(|| INGRESS_CLASS_NAME.to_string());
    let timeout = Duration::from_secs(
        cli.request_timeout_secs
            .or(file_cfg.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
    );
    let spawn_loxilb = cli.spawn_loxilb || file_cfg.spawn_loxilb.unwrap_or(false);

    let loxi = LoxiClient::new(&loxilb_url, timeout)?;
    let external_ip = match cli.external_ip.or(file_cfg.external_ip) {
        Some(ip) => ip,
        None => default_external_ip(loxi.host()),
    };

    info!("Starting loxilb-ingress");
    info!("  loxilb:      {}", loxilb_url);
    info!("  API server:  {}", api_server);
    info!("  External IP: {}", external_ip);
    info!("  Class:       {}", ingress_class);
    info!("  Workers:     {}", workers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut dataplane_handle = None;
    if spawn_loxilb {
        let binary = cli
            .loxilb_binary
            .or(file_cfg.loxilb_binary)
            .unwrap_or_else(|| DEFAULT_LOXILB_BINARY.to_string());
        let args = file_cfg
            .loxilb_args
            .unwrap_or_else(|| DEFAULT_LOXILB_ARGS.iter().map(|s| s.to_string()).collect());
        let supervisor = dataplane::Supervisor::new(binary, args);
        dataplane_handle = Some(supervisor.start(shutdown_rx.clone()));
    }

    let store = Arc::new(ApiStore::new(&api_server, &token, timeout)?);
    let watcher = Watcher::new(&api_server, &token, INGRESS_PREFIX)?;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let watch_handle = tokio::spawn(watcher.run(events_tx, shutdown_rx.clone()));

    let reconciler = IngressReconciler::new(store.clone(), Arc::new(loxi), &external_ip);
    let controller = IngressController::new(
        reconciler,
        store,
        ControllerConfig {
            workers,
            resync_interval,
            ingress_class,
        },
    );
    let controller_handle = controller.start(events_rx, shutdown_rx);

    // Block until Ctrl-C
    tokio::signal::ctrl_c().await?;
    info!("Shutting down loxilb-ingress");
    let _ = shutdown_tx.send(true);

    let _ = controller_handle.await;
    let _ = watch_handle.await;
    if let Some(handle) = dataplane_handle {
        let _ = handle.await;
    }

    Ok(())
}

fn resync_interval(secs: u64) -> anyhow::Result<Duration> {
    anyhow::ensure!(secs > 0, "resync-secs must be greater than zero");
    Ok(Duration::from_secs(secs))
}

/// Local non-loopback IPv4, falling back to the loxilb host.
fn default_external_ip(loxilb_host: &str) -> String {
    match netaddr::local_ipv4() {
        Ok(Some(ip)) => ip.to_string(),
        Ok(None) => {
            warn!("No non-loopback IPv4 address found, using loxilb host {}", loxilb_host);
            loxilb_host.to_string()
        }
        Err(e) => {
            warn!("Failed to list interfaces ({}), using loxilb host {}", e, loxilb_host);
            loxilb_host.to_string()
        }
    }
}
