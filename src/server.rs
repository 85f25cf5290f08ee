//! Client-facing WebSocket server. Each session owns one dispatcher and
//! receives pushed refreshes of its current view whenever the feed
//! connector's debounced publish fires.

use crate::dispatch::{Command, Dispatcher, Response};
use crate::store::LiveStore;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

/// Accept client sessions on an already-bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    store: Arc<LiveStore>,
    updates: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "client connected");
                    let store = Arc::clone(&store);
                    let updates = updates.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        match handle_session(stream, peer, store, updates, shutdown).await {
                            Ok(()) => tracing::info!(%peer, "client disconnected"),
                            Err(err) => tracing::debug!(%peer, "session ended: {err}"),
                        }
                    });
                }
                Err(err) => tracing::warn!("accept failed: {err}"),
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn handle_session(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<LiveStore>,
    mut updates: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), WsError> {
    let mut socket = tokio_tungstenite::accept_async(stream).await?;
    let mut dispatcher = Dispatcher::new(store);

    // Seed the client with its view before the first command arrives.
    send(&mut socket, &dispatcher.current_view()).await?;

    let mut push_enabled = true;
    loop {
        tokio::select! {
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Command>(text.as_str()) {
                        Ok(command) => {
                            let response = dispatcher.execute(command);
                            send(&mut socket, &response).await?;
                        }
                        // A bad command never takes the session down.
                        Err(err) => tracing::debug!(%peer, "ignoring malformed command: {err}"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err),
            },
            changed = updates.changed(), if push_enabled => {
                match changed {
                    Ok(()) => send(&mut socket, &dispatcher.current_view()).await?,
                    // Feed connector gone: keep serving commands, stop pushing.
                    Err(_) => push_enabled = false,
                }
            }
            _ = shutdown.changed() => {
                let _ = socket.close(None).await;
                break;
            }
        }
    }

    Ok(())
}

async fn send(
    socket: &mut WebSocketStream<TcpStream>,
    response: &Response,
) -> Result<(), WsError> {
    if let Ok(json) = serde_json::to_string(response) {
        socket.send(Message::Text(json.into())).await?;
    }
    Ok(())
}
