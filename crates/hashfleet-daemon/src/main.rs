//! Hashfleet node daemon.
//!
//! Runs the mining controller, the watchdog and the node HTTP surface.
//!
//! # Environment
//!
//! - `LISTEN_ADDR` - HTTP listen address (default `0.0.0.0:3337`)
//! - `DATA_DIR` - settings, work files and kernels (default `./data`)
//! - `PACKAGE_BASE_URL` - where kernel packages are downloaded from
//! - `GPU_TYPE`, `GPU_COUNT`, `GPU_NAME` - the GPUs to mine on

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hashfleet_bus::Ticker;
use hashfleet_core::GpuType;
use hashfleet_daemon::{create_router, LoggingHostOps, Node, NodeConfig};
use hashfleet_miner::{FsKernelPackages, MineStopReason, ProcessKernelRunner};
use hashfleet_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hashfleet_daemon=debug,hashfleet_miner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting hashfleet node");

    let mut config = NodeConfig::default();
    if let Ok(addr) = std::env::var("LISTEN_ADDR") {
        config.listen_addr = addr;
    }
    if let Ok(dir) = std::env::var("DATA_DIR") {
        config.data_dir = dir.into();
    }
    if let Ok(url) = std::env::var("PACKAGE_BASE_URL") {
        config.package_base_url = url;
    }
    if let Ok(gpu_type) = std::env::var("GPU_TYPE") {
        config.gpu_type = gpu_type.parse::<GpuType>()?;
    }
    if let Ok(count) = std::env::var("GPU_COUNT") {
        config.gpu_count = count.parse()?;
    }
    if let Ok(name) = std::env::var("GPU_NAME") {
        config.gpu_name = name;
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        gpu_type = %config.gpu_type,
        gpu_count = config.gpu_count,
        "Node configuration loaded"
    );
    if config.gpu_count == 0 {
        tracing::warn!("No GPUs configured - starts will be refused");
    }

    std::fs::create_dir_all(&config.data_dir)?;
    let settings_path = config.data_dir.join("settings");
    tracing::info!(path = %settings_path.display(), "Opening RocksDB store");
    let settings = Arc::new(RocksStore::open(&settings_path)?);

    let miner_config = config.miner_config();
    let packages = Arc::new(FsKernelPackages::new(&miner_config)?);
    let runner = Arc::new(ProcessKernelRunner::new(&miner_config.kernels_dir));

    let node = Node::new(
        config.clone(),
        settings,
        Arc::new(LoggingHostOps),
        packages,
        runner,
    );
    node.start().await?;
    let ticker = Ticker::spawn(node.bus());

    let app = create_router(node.state());
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    ticker.abort();
    node.controller().stop_mine(MineStopReason::AppExit).await;
    Ok(())
}
