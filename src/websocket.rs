//! Optional streaming server: broadcasts each emitted top-of-book/price
//! pair to connected WebSocket clients as a JSON line.
//!
//! Grounded on the teacher's `WebSocketServer` (`tokio-tungstenite`
//! accept loop, `tokio::sync::broadcast` fan-out, one task per client,
//! `tokio::select!` over broadcast-recv and socket-recv for ping/pong).
//! The teacher read its payload back off a CSV file it had just written;
//! here the pipeline publishes each result directly, so there's no file
//! round-trip. This module is transport glue — deliberately outside the
//! core's scope (spec.md §1) — and the core never depends on it.
//!
//! `bind` and `serve` are split so the caller can run the accept loop
//! concurrently with the pipeline (see `main::run`) instead of after it:
//! a `broadcast::Sender` with no subscribers yet drops every message, so
//! the socket has to be live before the first update is published.

use std::io;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

use crate::orderbook::TopOfBook;
use crate::pricer::OptionPrices;

/// One published update: the book state that produced a priced pair, and
/// the pair itself.
#[derive(Debug, Clone, Copy)]
pub struct BookUpdate {
    pub top: TopOfBook,
    pub prices: OptionPrices,
}

impl BookUpdate {
    fn to_json(self) -> String {
        format!(
            "{{\"best_bid\":{},\"best_ask\":{},\"order_count\":{},\"call\":{:.6},\"put\":{:.6}}}",
            opt_to_json(self.top.best_bid),
            opt_to_json(self.top.best_ask),
            self.top.order_count,
            self.prices.call,
            self.prices.put,
        )
    }
}

fn opt_to_json(price: Option<u32>) -> String {
    match price {
        Some(p) => p.to_string(),
        None => "null".to_string(),
    }
}

pub struct WebSocketServer {
    listener: TcpListener,
    tx: broadcast::Sender<String>,
}

impl WebSocketServer {
    /// Binds the listening socket and returns once it is ready to accept.
    ///
    /// Binding is split from `serve` so a caller can obtain a `publisher()`
    /// and start pushing updates only after the socket is actually live —
    /// publishing into a server that hasn't bound yet would silently drop
    /// every update on the floor (nothing has subscribed to `tx`).
    pub async fn bind(port: u16) -> io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("WebSocket server listening on {}", addr);
        let (tx, _) = broadcast::channel(1024);
        Ok(WebSocketServer { listener, tx })
    }

    /// A handle the pipeline driver can push updates through. Cheap to
    /// clone; safe to hold onto even with zero subscribers connected.
    pub fn publisher(&self) -> broadcast::Sender<String> {
        self.tx.clone()
    }

    /// Accept loop. Runs until the listener errors out; callers typically
    /// `tokio::spawn` this so it runs concurrently with whatever is feeding
    /// `publisher()`.
    pub async fn serve(self) -> io::Result<()> {
        let WebSocketServer { listener, tx } = self;
        while let Ok((stream, addr)) = listener.accept().await {
            tracing::info!("new WebSocket connection from {}", addr);
            let rx = tx.subscribe();
            tokio::spawn(handle_connection(stream, addr, rx));
        }

        Ok(())
    }
}

pub fn publish_update(tx: &broadcast::Sender<String>, update: BookUpdate) {
    // No subscribers is not an error; the pipeline runs fine with nobody
    // connected to the stream.
    let _ = tx.send(update.to_json());
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, mut rx: broadcast::Receiver<String>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        select! {
            update = rx.recv() => {
                match update {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            ws_msg = ws_receiver.next() => {
                match ws_msg {
                    Some(Ok(msg)) if msg.is_ping() => {
                        if ws_sender.send(Message::Pong(vec![])).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket client disconnected: {}", addr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_encodes_missing_side_as_null() {
        let update = BookUpdate {
            top: TopOfBook {
                best_bid: None,
                best_ask: Some(10_200),
                order_count: 1,
            },
            prices: OptionPrices { call: 0.0, put: 0.0 },
        };
        let json = update.to_json();
        assert!(json.contains("\"best_bid\":null"));
        assert!(json.contains("\"best_ask\":10200"));
    }
}
