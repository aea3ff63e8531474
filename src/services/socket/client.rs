//! Push-event client.
//!
//! [`EventClient::spawn`] starts a background task that keeps a Socket.IO
//! connection open over WebSocket (connect -> session -> backoff -> connect),
//! forwards decoded inbound events as [`ServiceEvent`]s and sends
//! [`ClientRequest`]s while connected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::packet::{DEFAULT_NAMESPACE, EnginePacket, SocketPacket};
use crate::constants::{DEFAULT_PING_INTERVAL_MS, DEFAULT_PING_TIMEOUT_MS, SHUTDOWN_GRACE_MS};
use crate::domain::{JobId, TechId};
use crate::error::{Error, Result};
use crate::services::events::{ClientRequest, ServiceEvent};
use crate::services::supervisor::{RetryConfig, Supervisor};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Service name reported in connection state events
pub const EVENTS_SERVICE: &str = "events";

/// Push channel configuration
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Server origin, e.g. `http://localhost:3000`
    pub url: String,
    pub retry: RetryConfig,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry: RetryConfig::default(),
        }
    }

    /// WebSocket endpoint for the Engine.IO transport
    pub fn endpoint(&self) -> Result<String> {
        let origin = self.url.trim_end_matches('/');
        let ws_origin = if let Some(rest) = origin.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = origin.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if origin.starts_with("ws://") || origin.starts_with("wss://") {
            origin.to_string()
        } else {
            return Err(Error::Invalid {
                message: format!("Unsupported socket URL: {}", self.url),
            });
        };
        Ok(format!("{ws_origin}/socket.io/?EIO=4&transport=websocket"))
    }
}

/// How a session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    ServerClosed,
}

/// Handle to the background push-event connection
pub struct EventClient {
    requests: UnboundedSender<ClientRequest>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventClient {
    /// Spawn the connection task on the current tokio runtime
    pub fn spawn(
        config: SocketConfig,
        events: UnboundedSender<ServiceEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (requests, request_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let supervisor = Supervisor::new(EVENTS_SERVICE, config.retry.clone(), events.clone());

        let task = tokio::spawn(connection_loop(
            config,
            supervisor,
            events,
            request_rx,
            connected.clone(),
            cancel.clone(),
        ));

        Self {
            requests,
            connected,
            cancel,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a request; dropped (returns false) while disconnected
    pub fn request(&self, request: ClientRequest) -> bool {
        if !self.is_connected() {
            tracing::debug!(request = request.event_name(), "not connected, request dropped");
            return false;
        }
        self.requests.send(request).is_ok()
    }

    pub fn request_all_locations(&self) -> bool {
        self.request(ClientRequest::AllLocations)
    }

    pub fn request_active_routes(&self) -> bool {
        self.request(ClientRequest::ActiveRoutes)
    }

    pub fn request_all_technicians(&self) -> bool {
        self.request(ClientRequest::AllTechnicians)
    }

    pub fn request_history(&self, tech: &TechId) -> bool {
        self.request(ClientRequest::History(tech.clone()))
    }

    pub fn request_job_route(&self, job: &JobId) -> bool {
        self.request(ClientRequest::JobRoute(job.clone()))
    }

    /// Close the connection and stop reconnecting without waiting
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Close the connection and wait for the task to send its disconnect
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let grace = Duration::from_millis(SHUTDOWN_GRACE_MS);
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "event task failed"),
            Err(_) => tracing::warn!("event task did not stop in time"),
        }
    }
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("connected", &self.is_connected())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn connection_loop(
    config: SocketConfig,
    supervisor: Supervisor,
    events: UnboundedSender<ServiceEvent>,
    mut requests: UnboundedReceiver<ClientRequest>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let endpoint = match config.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            supervisor.on_disconnected(&e.to_string());
            return;
        }
    };

    loop {
        supervisor.on_connecting(&endpoint);

        let outcome = run_session(
            &endpoint,
            &supervisor,
            &events,
            &mut requests,
            &connected,
            &cancel,
        )
        .await;
        connected.store(false, Ordering::SeqCst);

        match outcome {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::ServerClosed) => supervisor.on_disconnected("Server closed the connection"),
            Err(e) => supervisor.on_disconnected(&e.to_string()),
        }

        let Some(delay) = supervisor.next_retry_delay() else {
            break;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("event client stopped");
}

async fn run_session(
    endpoint: &str,
    supervisor: &Supervisor,
    events: &UnboundedSender<ServiceEvent>,
    requests: &mut UnboundedReceiver<ClientRequest>,
    connected: &AtomicBool,
    cancel: &CancellationToken,
) -> Result<SessionEnd> {
    let (ws, _response) = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        result = connect_async(endpoint) => result?,
    };
    let (mut sink, mut source) = ws.split();

    let open_deadline = Duration::from_millis(DEFAULT_PING_INTERVAL_MS + DEFAULT_PING_TIMEOUT_MS);
    let handshake = match tokio::time::timeout(open_deadline, next_packet(&mut source)).await {
        Err(_) => {
            return Err(Error::Socket {
                message: "timed out waiting for handshake".to_string(),
            });
        }
        Ok(Ok(Some(EnginePacket::Open(handshake)))) => handshake,
        Ok(Ok(Some(other))) => {
            return Err(Error::Protocol {
                message: format!("expected open packet, got {other:?}"),
            });
        }
        Ok(Ok(None)) => return Ok(SessionEnd::ServerClosed),
        Ok(Err(e)) => return Err(e),
    };
    tracing::debug!(sid = %handshake.sid, "engine handshake complete");

    send_packet(&mut sink, EnginePacket::Message(SocketPacket::connect(DEFAULT_NAMESPACE))).await?;

    // Requests queued during a previous session are stale
    while requests.try_recv().is_ok() {}

    let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let disconnect = SocketPacket::Disconnect { namespace: DEFAULT_NAMESPACE.to_string() };
                let _ = send_packet(&mut sink, EnginePacket::Message(disconnect)).await;
                let _ = sink.close().await;
                return Ok(SessionEnd::Cancelled);
            }

            _ = tokio::time::sleep_until(last_seen + heartbeat) => {
                return Err(Error::Socket { message: "heartbeat timeout".to_string() });
            }

            Some(request) = requests.recv() => {
                tracing::debug!(request = request.event_name(), "emit");
                let packet = SocketPacket::event(request.event_name(), request.args());
                send_packet(&mut sink, EnginePacket::Message(packet)).await?;
            }

            frame = source.next() => {
                let Some(frame) = frame else {
                    return Ok(SessionEnd::ServerClosed);
                };
                last_seen = Instant::now();

                let text = match frame? {
                    Message::Text(text) => text,
                    Message::Close(_) => return Ok(SessionEnd::ServerClosed),
                    Message::Binary(_) => {
                        tracing::warn!("binary frame ignored");
                        continue;
                    }
                    _ => continue,
                };

                let packet = match EnginePacket::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable packet");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Ping(payload) => {
                        send_packet(&mut sink, EnginePacket::Pong(payload)).await?;
                    }
                    EnginePacket::Close => return Ok(SessionEnd::ServerClosed),
                    EnginePacket::Message(SocketPacket::Connect { .. }) => {
                        connected.store(true, Ordering::SeqCst);
                        supervisor.on_connected();
                        let join = ClientRequest::JoinAdmin;
                        let packet = SocketPacket::event(join.event_name(), join.args());
                        send_packet(&mut sink, EnginePacket::Message(packet)).await?;
                    }
                    EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                        let reason = data
                            .as_ref()
                            .and_then(|d| d.get("message"))
                            .and_then(|m| m.as_str())
                            .unwrap_or("connection refused")
                            .to_string();
                        return Err(Error::Socket { message: reason });
                    }
                    EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
                        return Ok(SessionEnd::ServerClosed);
                    }
                    EnginePacket::Message(SocketPacket::Event { namespace, name, args, .. }) => {
                        if let Some(event) = decode_push(&namespace, &name, args) {
                            if events.send(event).is_err() {
                                return Ok(SessionEnd::Cancelled);
                            }
                        }
                    }
                    EnginePacket::Message(SocketPacket::Ack { .. })
                    | EnginePacket::Open(_)
                    | EnginePacket::Pong(_)
                    | EnginePacket::Upgrade
                    | EnginePacket::Noop => {}
                }
            }
        }
    }
}

/// Push event on the root namespace; anything else is logged and dropped
fn decode_push(namespace: &str, name: &str, args: Vec<serde_json::Value>) -> Option<ServiceEvent> {
    if namespace != DEFAULT_NAMESPACE {
        tracing::debug!(namespace, event = name, "event outside the root namespace ignored");
        return None;
    }
    match ServiceEvent::from_socket_event(name, args) {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            tracing::debug!(event = name, "unhandled push event");
            None
        }
        Err(e) => {
            tracing::warn!(event = name, error = %e, "malformed push event");
            None
        }
    }
}

/// Next decodable engine packet, skipping non-text frames; `None` on close
async fn next_packet(source: &mut WsSource) -> Result<Option<EnginePacket>> {
    while let Some(frame) = source.next().await {
        match frame? {
            Message::Text(text) => return EnginePacket::decode(&text).map(Some),
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

async fn send_packet(sink: &mut WsSink, packet: EnginePacket) -> Result<()> {
    sink.send(Message::Text(packet.encode())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::routing::get;

    #[test]
    fn test_endpoint_from_http_origin() {
        let config = SocketConfig::new("http://localhost:3000/");
        assert_eq!(
            config.endpoint().expect("endpoint"),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        let secure = SocketConfig::new("https://dispatch.example.com");
        assert!(secure.endpoint().expect("endpoint").starts_with("wss://dispatch.example.com/"));
        assert!(SocketConfig::new("ftp://nope").endpoint().is_err());
    }

    #[test]
    fn test_only_root_namespace_events_are_delivered() {
        let args = || vec![serde_json::json!([{"id": "t1", "lastLat": 1.0, "lastLng": 2.0}])];
        assert!(decode_push("/admin", "allLocations", args()).is_none());
        assert!(matches!(
            decode_push(DEFAULT_NAMESPACE, "allLocations", args()),
            Some(ServiceEvent::AllLocations(techs)) if techs.len() == 1
        ));
        assert!(decode_push(DEFAULT_NAMESPACE, "somethingElse", args()).is_none());
    }

    /// Minimal Socket.IO server: handshake, connect ack, then answers requests.
    /// Every text frame from the client is copied to `seen`.
    async fn serve_socket(mut socket: WebSocket, seen: UnboundedSender<String>) {
        let open = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
        if socket.send(AxumMessage::Text(open.to_string())).await.is_err() {
            return;
        }

        while let Some(Ok(msg)) = socket.recv().await {
            let AxumMessage::Text(text) = msg else {
                continue;
            };
            let _ = seen.send(text.clone());
            let reply = match text.as_str() {
                "40" => Some(r#"40{"sid":"socket-1"}"#.to_string()),
                r#"42["joinAdmin"]"# => Some("2".to_string()),
                r#"42["requestAllLocations"]"# => Some(
                    r#"42["allLocations",[{"id":"t1","name":"Karim","lastLat":23.7,"lastLng":90.4,"isTracking":true}]]"#
                        .to_string(),
                ),
                _ => None,
            };
            if let Some(reply) = reply {
                if socket.send(AxumMessage::Text(reply)).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn start_server() -> (String, UnboundedReceiver<String>) {
        let (seen, seen_rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/socket.io/",
            get(move |ws: WebSocketUpgrade| {
                let seen = seen.clone();
                async move { ws.on_upgrade(move |socket| serve_socket(socket, seen)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), seen_rx)
    }

    async fn wait_connected(rx: &mut UnboundedReceiver<ServiceEvent>) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if let ServiceEvent::ConnectionState { connected: true, .. } = event {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_connects_joins_and_receives_snapshot() {
        let (url, _seen) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let client = EventClient::spawn(SocketConfig::new(url), tx, cancel.clone());

        assert!(wait_connected(&mut rx).await);
        assert!(client.is_connected());

        assert!(client.request_all_locations());

        let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if let ServiceEvent::AllLocations(techs) = event {
                    return techs;
                }
            }
            Vec::new()
        })
        .await
        .expect("snapshot in time");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id.as_str(), "t1");

        client.disconnect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_sends_disconnect() {
        let (url, mut seen) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = EventClient::spawn(SocketConfig::new(url), tx, CancellationToken::new());
        assert!(wait_connected(&mut rx).await);

        client.shutdown().await;

        let said_goodbye = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(text) = seen.recv().await {
                if text == "41" {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(said_goodbye);
    }

    #[tokio::test]
    async fn test_requests_dropped_while_disconnected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        // Nothing listens on port 9; the client stays disconnected
        let client = EventClient::spawn(SocketConfig::new("http://127.0.0.1:9"), tx, cancel.clone());
        assert!(!client.request_active_routes());
        cancel.cancel();
    }
}
