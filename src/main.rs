//! Plotwatch CLI
//!
//! Runs the streaming ingestion engine (feed consumer plus client session
//! server), or a synthetic feed generator for driving it.

use clap::{Parser, Subcommand, ValueEnum};
use plotwatch::{
    feed::{FeedConfig, FeedConnector},
    geodesy::RangeUnit,
    normalize::{Normalizer, Station},
    server,
    simulate::{self, SimulatorConfig},
    store::LiveStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "plotwatch")]
#[command(about = "Streaming radar plot ingestion and live query engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the feed and serve client query sessions
    Run {
        /// Upstream feed WebSocket URL
        #[arg(long, default_value = "ws://127.0.0.1:8085")]
        feed_url: String,

        /// Address to serve client sessions on
        #[arg(long, default_value = "127.0.0.1:9002")]
        listen: SocketAddr,

        /// Observation station latitude in degrees
        #[arg(long, default_value_t = -6.0, allow_hyphen_values = true)]
        station_lat: f64,

        /// Observation station longitude in degrees
        #[arg(long, default_value_t = 107.0, allow_hyphen_values = true)]
        station_lon: f64,

        /// Unit of the inbound range field
        #[arg(long, value_enum, default_value_t = RangeUnitArg::Meters)]
        range_unit: RangeUnitArg,

        /// Reconnect interval in seconds
        #[arg(long, default_value_t = 5)]
        retry_secs: u64,

        /// Publish debounce window in milliseconds
        #[arg(long, default_value_t = 10)]
        debounce_ms: u64,
    },

    /// Serve synthetic feed traffic
    Simulate {
        /// Address to serve the feed on
        #[arg(long, default_value = "127.0.0.1:8085")]
        listen: SocketAddr,

        /// Stations swept per round
        #[arg(long, default_value_t = 1000)]
        stations: u32,

        /// Pause between sweeps in milliseconds
        #[arg(long, default_value_t = 1000)]
        sweep_pause_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RangeUnitArg {
    /// Range arrives in meters
    Meters,
    /// Range arrives in nautical miles
    Nm,
}

impl From<RangeUnitArg> for RangeUnit {
    fn from(arg: RangeUnitArg) -> Self {
        match arg {
            RangeUnitArg::Meters => RangeUnit::Meters,
            RangeUnitArg::Nm => RangeUnit::NauticalMiles,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            feed_url,
            listen,
            station_lat,
            station_lon,
            range_unit,
            retry_secs,
            debounce_ms,
        } => {
            run_engine(
                feed_url,
                listen,
                Station {
                    latitude: station_lat,
                    longitude: station_lon,
                },
                range_unit.into(),
                Duration::from_secs(retry_secs),
                Duration::from_millis(debounce_ms),
            )
            .await?;
        }

        Commands::Simulate {
            listen,
            stations,
            sweep_pause_ms,
        } => {
            run_simulator(
                listen,
                SimulatorConfig {
                    stations,
                    sweep_pause: Duration::from_millis(sweep_pause_ms),
                },
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_engine(
    feed_url: String,
    listen: SocketAddr,
    station: Station,
    range_unit: RangeUnit,
    retry_interval: Duration,
    debounce: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting plot engine");
    tracing::info!("Feed: {}", feed_url);
    tracing::info!("Client sessions: {}", listen);
    tracing::info!(
        "Station: lat={}, lon={}",
        station.latitude,
        station.longitude
    );

    let store = Arc::new(LiveStore::new());
    let normalizer = Normalizer::new(station, range_unit);
    let connector = Arc::new(FeedConnector::new(
        FeedConfig {
            url: feed_url,
            retry_interval,
            debounce,
        },
        normalizer,
        Arc::clone(&store),
    ));
    let stats = connector.stats();

    let listener = TcpListener::bind(listen).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_handle = tokio::spawn(server::serve(
        listener,
        Arc::clone(&store),
        connector.subscribe(),
        shutdown_rx,
    ));

    // Spawn stats reporting task
    let stats_handle = {
        let stats = Arc::clone(&stats);
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                let s = stats.snapshot();
                tracing::info!(
                    "Stats: messages={}, upserts={}, stations={}, parse_errors={}, normalize_errors={}, connects={}",
                    s.messages,
                    s.upserts,
                    store.len(),
                    s.parse_errors,
                    s.normalize_errors,
                    s.connects
                );
            }
        })
    };

    let connector_handle = {
        let connector = Arc::clone(&connector);
        tokio::spawn(async move { connector.run().await })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        result = connector_handle => {
            if let Err(e) = result {
                tracing::error!("Connector error: {}", e);
            }
        }
    }

    connector.stop();
    let _ = shutdown_tx.send(true);
    stats_handle.abort();
    let _ = server_handle.await;

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Messages received: {}", final_stats.messages);
    tracing::info!("  Reports stored: {}", final_stats.upserts);
    tracing::info!("  Distinct stations: {}", store.len());
    tracing::info!("  Parse errors: {}", final_stats.parse_errors);
    tracing::info!("  Normalize errors: {}", final_stats.normalize_errors);
    tracing::info!(
        "  Connects: {}, disconnects: {}",
        final_stats.connects,
        final_stats.disconnects
    );

    Ok(())
}

async fn run_simulator(
    listen: SocketAddr,
    config: SimulatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting feed simulator on {}", listen);
    tracing::info!("Sweeping stations 1..={}", config.stations);

    let listener = TcpListener::bind(listen).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let simulator = tokio::spawn(simulate::run(listener, config, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = simulator.await;

    Ok(())
}
