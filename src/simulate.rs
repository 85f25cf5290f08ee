//! Synthetic traffic generator: a WebSocket server that sweeps station
//! ids and emits random bearing/range reports, for driving the engine
//! without a real upstream.

use futures_util::SinkExt;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Stations swept per round, `1..=stations`.
    pub stations: u32,
    /// Pause after each full sweep.
    pub sweep_pause: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            stations: 1000,
            sweep_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct SyntheticReport {
    bearing: f64,
    range: f64,
    stn: u32,
    category: u32,
    #[serde(rename = "generalType")]
    general_type: u32,
}

fn random_report(stn: u32) -> SyntheticReport {
    let mut rng = rand::thread_rng();
    SyntheticReport {
        bearing: rng.gen_range(0.0..360.0),
        range: rng.gen_range(0.0..1000.0),
        stn,
        category: rng.gen_range(0..10),
        general_type: rng.gen_range(0..5),
    }
}

/// Serve synthetic feed connections until shutdown.
pub async fn run(
    listener: TcpListener,
    config: SimulatorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "feed client connected");
                    tokio::spawn(feed_client(stream, config.clone(), shutdown.clone()));
                }
                Err(err) => tracing::warn!("accept failed: {err}"),
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn feed_client(stream: TcpStream, config: SimulatorConfig, mut shutdown: watch::Receiver<bool>) {
    let mut socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::warn!("handshake failed: {err}");
            return;
        }
    };

    loop {
        for stn in 1..=config.stations {
            if *shutdown.borrow() {
                return;
            }
            let Ok(frame) = serde_json::to_string(&random_report(stn)) else {
                continue;
            };
            if socket.send(Message::Text(frame.into())).await.is_err() {
                tracing::info!("feed client disconnected");
                return;
            }
        }
        tokio::select! {
            _ = sleep(config.sweep_pause) => {}
            _ = shutdown.changed() => return,
        }
    }
}
