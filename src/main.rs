use clap::Parser;
use lvm_csi::config::Config;
use lvm_csi::csi::server::shutdown_signal;
use lvm_csi::csi::{ControllerService, CsiMetrics, CsiServer, IdentityService, NodeService};
use lvm_csi::driver::Driver;
use lvm_csi::exec::ProcessRunner;
use prometheus::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lvm-csi", version, about = "LVM and iSCSI volume plugin")]
struct Cli {
    /// Configuration file (toml, json or yaml)
    #[arg(short, long, env = "LVM_CSI_CONFIG")]
    config: Option<PathBuf>,

    /// CSI endpoint, e.g. unix:///run/lvm-csi/csi.sock
    #[arg(long, env = "LVM_CSI_ENDPOINT")]
    endpoint: Option<String>,
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.filter.as_str().into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(endpoint) = cli.endpoint {
        config.csi.endpoint = endpoint;
    }

    init_tracing(&config);

    tracing::info!("Starting lvm-csi {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Configuration: {:?}", config);

    let runner = Arc::new(ProcessRunner::new(config.exec.timeout()));
    let driver = Arc::new(Driver::new(runner));

    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(CsiMetrics::new(registry)?);

    let server = CsiServer::new(
        IdentityService::new(),
        ControllerService::new(driver, metrics.clone()),
        NodeService::new(),
    );

    server.serve(&config.csi.endpoint, shutdown_signal()).await?;

    if config.metrics.enabled {
        match metrics.render() {
            Ok(text) => tracing::info!("Final metrics:\n{}", text),
            Err(e) => tracing::warn!("Failed to render metrics: {}", e),
        }
    }

    Ok(())
}
