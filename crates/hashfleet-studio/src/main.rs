//! Hashfleet studio - fleet overview from the terminal.
//!
//! This is the entry point for the `hashfleet-studio` binary.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use hashfleet_bus::{MessageBus, Ticker};
use hashfleet_store::{RocksStore, SettingsStore};
use hashfleet_studio::{
    FleetPage, FleetQuery, FleetView, HighlightThresholds, HttpFleetClient, Poller, SortField,
    SortSpec, StudioConfig, TempLevel,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Hashfleet studio - watch and sort the mining fleet.
#[derive(Parser, Debug)]
#[command(name = "hashfleet-studio")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fleet server URL.
    #[arg(long, env = "HASHFLEET_SERVER", default_value = "http://localhost:3339")]
    server: String,

    /// Directory for remembered settings.
    #[arg(long, env = "HASHFLEET_STUDIO_DATA", default_value = "./studio-data")]
    data_dir: std::path::PathBuf,

    /// Rows per page (10, 20, 30 or 40).
    #[arg(long, default_value_t = hashfleet_studio::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Sort column, e.g. `main_coin_speed`. Defaults to the remembered one.
    #[arg(long)]
    sort: Option<SortField>,

    /// Coin codes to show snapshot counts for.
    #[arg(long = "coin")]
    coins: Vec<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page and print it.
    Query {
        /// One-based page index.
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Poll every 10 seconds and print each reconciled page.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "info,hashfleet_studio=debug,hashfleet_bus=debug"
    } else {
        "warn,hashfleet_studio=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = StudioConfig {
        server_url: args.server,
        data_dir: args.data_dir,
        page_size: args.page_size,
        request_timeout_seconds: args.timeout,
        known_coins: args.coins,
    };

    std::fs::create_dir_all(&config.data_dir)?;
    let settings: Arc<dyn SettingsStore> =
        Arc::new(RocksStore::open(config.data_dir.join("settings"))?);

    let mut sort = SortSpec::load(settings.as_ref());
    if let Some(field) = args.sort {
        if field != sort.field() {
            sort.select(field);
            sort.save(settings.as_ref())?;
        }
    }
    let thresholds = HighlightThresholds::load(settings.as_ref());

    let client = Arc::new(HttpFleetClient::new(&config.server_url, config.request_timeout())?);
    let bus = Arc::new(MessageBus::new());
    let (view, _view_task) = FleetView::new(config.known_coins.clone(), thresholds).spawn();
    let mut query = FleetQuery::new(sort, config.page_size);

    match args.command {
        Command::Query { page } => {
            query.set_page_index(page);
            let poller = Poller::new(client, Arc::clone(&bus), view.clone(), query);
            let mut pages = view.subscribe();
            poller.poll_once().await?;
            pages.changed().await?;
            let page = pages.borrow().clone();
            print_page(&page, &thresholds);
        }
        Command::Watch => {
            let poller = Arc::new(
                Poller::new(client, Arc::clone(&bus), view.clone(), query)
                    .with_settings(Arc::clone(&settings)),
            );
            poller.attach()?;
            let ticker = Ticker::spawn(Arc::clone(&bus));
            poller.trigger()?;

            tracing::info!(server = %config.server_url, "Watching fleet");
            let mut pages = view.subscribe();
            loop {
                tokio::select! {
                    changed = pages.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let page = pages.borrow_and_update().clone();
                        print_page(&page, &thresholds);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted");
                        break;
                    }
                }
            }
            ticker.abort();
        }
    }

    Ok(())
}

fn print_page(page: &FleetPage, thresholds: &HighlightThresholds) {
    let sort = page
        .sort
        .map_or_else(String::new, |s| format!("  sorted by {} {:?}", s.field, s.direction));
    println!(
        "page {}/{}  total {}  mining {}  online {}{sort}",
        page.paging.page_index,
        page.paging.page_count,
        page.paging.total,
        page.all.mining_count,
        page.all.online_count,
    );
    for coin in &page.coins {
        println!(
            "  {:<8} mining {:>5}  online {:>5}",
            coin.coin_code, coin.mining_count, coin.online_count
        );
    }
    println!(
        "{:<20} {:<15} {:<8} {:>12} {:>7} {:>6} {:>6}",
        "MINER", "IP", "COIN", "SPEED", "REJ%", "GPU°C", "CPU°C"
    );
    for row in &page.rows {
        row.view.with_record(|r| {
            let temp_mark = match row.highlight.temp {
                TempLevel::Hot => "!",
                TempLevel::Cool => "~",
                TempLevel::Normal => " ",
            };
            let reject_mark = if row.highlight.main_reject_high { "!" } else { " " };
            println!(
                "{:<20} {:<15} {:<8} {:>12.2} {:>6.1}{reject_mark} {:>5}{temp_mark} {:>6}",
                r.miner_name,
                r.miner_ip,
                if r.is_mining { r.main_coin_code.as_str() } else { "-" },
                r.main_coin_speed,
                r.main_coin_reject_percent,
                r.max_gpu_temperature,
                r.cpu_temperature,
            );
        });
    }
    tracing::debug!(
        min_temp = thresholds.min_temp,
        max_temp = thresholds.max_temp,
        reject_percent = thresholds.reject_percent,
        "Page printed"
    );
}
