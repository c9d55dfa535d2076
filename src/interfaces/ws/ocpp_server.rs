//! OCPP 1.6 WebSocket server
//!
//! Accepts charge-point connections at `ws://<host>:<port>/ws/{charge_point_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::application::services::watch_heartbeats;
use crate::application::session::{
    ChargePointSession, InboundCall, SharedSessionManager, DUPLICATE_CONNECTION_REASON,
    SHUTDOWN_REASON,
};
use crate::support::shutdown::ShutdownSignal;

/// OCPP 1.6 WebSocket subprotocol
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

const PATH_PREFIX: &str = "/ws/";

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// OCPP WebSocket Server
pub struct OcppServer {
    listener: TcpListener,
    manager: SharedSessionManager,
    shutdown: ShutdownSignal,
}

impl OcppServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(
        addr: &str,
        manager: SharedSessionManager,
        shutdown: ShutdownSignal,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            manager,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn manager(&self) -> &SharedSessionManager {
        &self.manager
    }

    /// Accept connections until the shutdown signal fires, then close
    /// every live session.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("🔌 OCPP 1.6 Central System started on ws://{}", addr);
            info!(
                "   Charge points should connect to: ws://{}{}{{charge_point_id}}",
                addr, PATH_PREFIX
            );
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
                _ = self.shutdown.wait() => {
                    info!("🛑 WebSocket server received shutdown signal");
                    break;
                }
            }
        }

        let closed = self.manager.close_all(SHUTDOWN_REASON).await;
        info!(closed, "✅ WebSocket server shutdown complete");
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let manager = self.manager.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, manager, shutdown).await {
                warn!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Charge point id from a `/ws/{id}` request path.
fn extract_charge_point_id(path: &str) -> Option<String> {
    let id = path.strip_prefix(PATH_PREFIX)?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

fn offers_ocpp16(req: &Request) -> bool {
    req.headers()
        .get(SUBPROTOCOL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|offered| offered.split(',').any(|p| p.trim() == OCPP_SUBPROTOCOL))
        .unwrap_or(false)
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!(
        "Unknown path {}, expected {}{{charge_point_id}}",
        path, PATH_PREFIX
    )));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

fn close_message(code: CloseCode, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }))
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    manager: SharedSessionManager,
    shutdown: ShutdownSignal,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    debug!("New connection from: {}", addr);

    let mut charge_point_id: Option<String> = None;

    let mut ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let path = req.uri().path();
            let Some(id) = extract_charge_point_id(path) else {
                warn!(remote_addr = %addr, path, "Rejecting handshake on unknown path");
                return Err(not_found(path));
            };

            // Clients that offer no subprotocol are still served as 1.6.
            if offers_ocpp16(req) {
                response.headers_mut().insert(
                    SUBPROTOCOL_HEADER,
                    HeaderValue::from_static(OCPP_SUBPROTOCOL),
                );
            }
            charge_point_id = Some(id);
            Ok(response)
        },
    )
    .await?;

    let Some(charge_point_id) = charge_point_id else {
        return Ok(());
    };

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let session = match manager.open_session(&charge_point_id, Some(addr), tx) {
        Ok(session) => session,
        Err(e) => {
            warn!(charge_point_id = charge_point_id.as_str(), remote_addr = %addr, "{}", e);
            ws_stream
                .send(close_message(CloseCode::Policy, DUPLICATE_CONNECTION_REASON))
                .await?;
            return Ok(());
        }
    };

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let writer = tokio::spawn(write_frames(session.clone(), ws_sender, rx));

    let (calls_tx, calls_rx) = mpsc::unbounded_channel::<InboundCall>();
    let dispatcher = tokio::spawn(manager.handler_for(&session).run(calls_rx));

    manager.activate(&session).await;

    let watchdog = tokio::spawn(watch_heartbeats(
        session.clone(),
        manager.settings().heartbeat_interval,
    ));

    let reason = loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(call) = session.route_inbound(&text) {
                            if calls_tx.send(call).is_err() {
                                break "Dispatcher stopped".to_string();
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(
                            charge_point_id = charge_point_id.as_str(),
                            bytes = data.len(),
                            "Binary message received, ignoring"
                        );
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(charge_point_id = charge_point_id.as_str(), ?frame, "Close frame received");
                        break "Closed by charge point".to_string();
                    }
                    // Pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        warn!(charge_point_id = charge_point_id.as_str(), error = %e, "WebSocket error");
                        break format!("Transport error: {}", e);
                    }
                    None => break "Connection dropped".to_string(),
                }
            }
            _ = session.closed() => {
                break session.close_reason().unwrap_or("Session closed").to_string();
            }
            _ = shutdown.wait() => {
                break SHUTDOWN_REASON.to_string();
            }
        }
    };

    manager.disconnect(&session, &reason).await;

    drop(calls_tx);
    watchdog.abort();
    if let Err(e) = dispatcher.await {
        error!(charge_point_id = charge_point_id.as_str(), error = %e, "Dispatch task failed");
    }
    let _ = writer.await;

    Ok(())
}

/// Forward queued frames to the socket until the session closes, then
/// flush what is left and send a Close frame carrying the reason.
async fn write_frames(
    session: Arc<ChargePointSession>,
    mut ws_sender: WsSink,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let charge_point_id = session.charge_point_id().to_string();

    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = ws_sender.send(Message::Text(msg)).await {
                    warn!(charge_point_id = charge_point_id.as_str(), error = %e, "Send error");
                    return;
                }
            }
            _ = session.closed() => break,
        }
    }

    while let Ok(msg) = rx.try_recv() {
        if ws_sender.send(Message::Text(msg)).await.is_err() {
            return;
        }
    }

    let reason = session.close_reason().unwrap_or_default();
    let code = if reason == SHUTDOWN_REASON {
        CloseCode::Away
    } else {
        CloseCode::Normal
    };
    if let Err(e) = ws_sender.send(close_message(code, reason)).await {
        debug!(charge_point_id = charge_point_id.as_str(), error = %e, "Close frame not delivered");
    }
}
