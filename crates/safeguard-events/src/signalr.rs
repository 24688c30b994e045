//! SignalR websocket transport for appliance events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, trace, warn};

use safeguard_core::error::{AuthError, InvalidInputError, ProtocolError, TransportError};
use safeguard_core::{
    AccessToken, ApplianceAddress, DisconnectNotifier, DisconnectReason, Error, EventChannel,
    EventSubscriptions, EventTransport, Result, Session,
};

use crate::options::ListenerOptions;
use crate::protocol::{self, HubMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SignalR event channels against one appliance.
#[derive(Debug, Clone)]
pub struct SignalrTransport {
    url: String,
    options: ListenerOptions,
}

impl SignalrTransport {
    /// Transport for the event hub of `appliance`.
    pub fn new(appliance: &ApplianceAddress, options: ListenerOptions) -> Self {
        Self {
            url: appliance.event_url(),
            options,
        }
    }

    /// Transport for the appliance a session authenticates against.
    pub fn for_session<S: Session>(session: &S, options: ListenerOptions) -> Self {
        Self::new(session.appliance(), options)
    }

    /// The websocket URL channels connect to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self, token: &AccessToken) -> Result<WsStream> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| InvalidInputError::Other {
                message: format!("invalid event url {}: {}", self.url, e),
            })?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.as_str())).map_err(|_| {
            ProtocolError::MalformedResponse {
                message: "access token contains characters not allowed in a header".to_string(),
            }
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.options.ignore_ssl)
            .build()
            .map_err(|e| TransportError::Tls {
                message: e.to_string(),
            })?;

        let (ws, response) = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::NativeTls(tls)),
        )
        .await
        .map_err(websocket_error)?;

        debug!(status = %response.status(), "Websocket upgraded");
        Ok(ws)
    }

    /// Send the handshake and check the reply. Records that arrived in the
    /// same frame as the reply are returned for dispatch.
    async fn handshake(ws: &mut WsStream) -> Result<Option<String>> {
        ws.send(Message::Text(protocol::HANDSHAKE_REQUEST.into()))
            .await
            .map_err(websocket_error)?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let mut records = protocol::split_records(text.as_str());
                    let Some(first) = records.next() else {
                        continue;
                    };
                    protocol::parse_handshake(first)
                        .map_err(|message| ProtocolError::Handshake { message })?;

                    let rest: String = records
                        .map(|record| format!("{}{}", record, protocol::RECORD_SEPARATOR))
                        .collect();
                    return Ok(Some(rest).filter(|r| !r.is_empty()));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(ProtocolError::Handshake {
                        message: format!("closed during handshake: {:?}", frame),
                    }
                    .into());
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(websocket_error(e)),
                None => {
                    return Err(TransportError::Connection {
                        message: "connection closed during handshake".to_string(),
                    }
                    .into());
                }
            }
        }
    }
}

#[async_trait]
impl EventTransport for SignalrTransport {
    type Channel = SignalrChannel;

    #[instrument(skip(self, token, subscriptions, on_disconnect), fields(url = %self.url))]
    async fn open(
        &self,
        token: &AccessToken,
        subscriptions: Arc<EventSubscriptions>,
        on_disconnect: DisconnectNotifier,
    ) -> Result<SignalrChannel> {
        info!("Opening event channel");

        let timeout = self.options.handshake_timeout;
        let (ws, pending) = tokio::time::timeout(timeout, async {
            let mut ws = self.connect(token).await?;
            let pending = Self::handshake(&mut ws).await?;
            Ok::<_, Error>((ws, pending))
        })
        .await
        .map_err(|_| TransportError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        })??;

        debug!("Event channel handshake complete");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (sink, source) = ws.split();
        let task = tokio::spawn(run_channel(
            sink,
            source,
            pending,
            subscriptions,
            on_disconnect,
            shutdown_rx,
            self.options.clone(),
        ));

        Ok(SignalrChannel {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A live SignalR connection.
///
/// Events are dispatched on the channel's own task, in arrival order.
/// Dropping the channel shuts it down like [`EventChannel::close`] without
/// waiting for it.
#[derive(Debug)]
pub struct SignalrChannel {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl EventChannel for SignalrChannel {
    async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already have ended on its own.
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Event channel task ended abnormally");
            }
        }
    }
}

async fn run_channel(
    mut sink: WsSink,
    mut source: WsSource,
    pending: Option<String>,
    subscriptions: Arc<EventSubscriptions>,
    on_disconnect: DisconnectNotifier,
    mut shutdown: oneshot::Receiver<()>,
    options: ListenerOptions,
) {
    let reason = match pending.and_then(|frame| handle_frame(&frame, &subscriptions)) {
        Some(reason) => reason,
        None => {
            receive_loop(
                &mut sink,
                &mut source,
                &subscriptions,
                &mut shutdown,
                &options,
            )
            .await
        }
    };

    // Completes the websocket close handshake, or answers the server's.
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        debug!("Timed out closing event channel");
    }

    debug!(%reason, "Event channel disconnected");
    on_disconnect.notify(reason);
}

async fn receive_loop(
    sink: &mut WsSink,
    source: &mut WsSource,
    subscriptions: &EventSubscriptions,
    shutdown: &mut oneshot::Receiver<()>,
    options: &ListenerOptions,
) -> DisconnectReason {
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + options.keepalive_interval,
        options.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let idle = tokio::time::sleep(options.server_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            // Fires on close() and when the channel is dropped.
            _ = &mut *shutdown => {
                debug!("Closing event channel");
                let _ = sink.send(Message::Text(protocol::CLOSE_RECORD.into())).await;
                return DisconnectReason::Graceful;
            }
            _ = &mut idle => {
                warn!(
                    timeout_ms = options.server_timeout.as_millis() as u64,
                    "Nothing received from the server, dropping event channel"
                );
                return DisconnectReason::TransportError("server timeout".to_string());
            }
            _ = keepalive.tick() => {
                trace!("Sending keepalive ping");
                if let Err(e) = sink.send(Message::Text(protocol::PING_RECORD.into())).await {
                    return DisconnectReason::TransportError(e.to_string());
                }
            }
            msg = source.next() => {
                if let Some(Ok(_)) = &msg {
                    idle.as_mut().reset(Instant::now() + options.server_timeout);
                }
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = handle_frame(text.as_str(), subscriptions) {
                            return reason;
                        }
                    }
                    // tungstenite queues the pong itself.
                    Some(Ok(Message::Ping(_))) => trace!("Received ping"),
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Event channel closed by server");
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty());
                        return DisconnectReason::ServerInitiated(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Event channel error");
                        return DisconnectReason::TransportError(e.to_string());
                    }
                    None => {
                        return DisconnectReason::TransportError("connection closed".to_string());
                    }
                }
            }
        }
    }
}

/// Dispatch every record in a frame. Returns a reason if the server closed.
fn handle_frame(frame: &str, subscriptions: &EventSubscriptions) -> Option<DisconnectReason> {
    for record in protocol::split_records(frame) {
        match protocol::parse_record(record) {
            Ok(HubMessage::Invocation { target, events }) => {
                trace!(%target, count = events.len(), "Invocation received");
                for event in &events {
                    subscriptions.dispatch(event);
                }
            }
            Ok(HubMessage::Ping) => trace!("Received hub ping"),
            Ok(HubMessage::Close {
                error,
                allow_reconnect,
            }) => {
                info!(?error, ?allow_reconnect, "Hub close received");
                return Some(match allow_reconnect {
                    Some(false) => DisconnectReason::Permanent(
                        error.unwrap_or_else(|| "server does not allow reconnect".to_string()),
                    ),
                    _ => DisconnectReason::ServerInitiated(error),
                });
            }
            Ok(HubMessage::Other(kind)) => trace!(kind, "Ignoring hub message"),
            Err(e) => warn!(error = %e, "Skipping malformed hub record"),
        }
    }
    None
}

fn websocket_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response) => match response.status().as_u16() {
            status @ (401 | 403) => AuthError::TokenNotAccepted { status }.into(),
            status => ProtocolError::Handshake {
                message: format!("upgrade rejected with HTTP {}", status),
            }
            .into(),
        },
        tungstenite::Error::Tls(e) => TransportError::Tls {
            message: e.to_string(),
        }
        .into(),
        tungstenite::Error::Io(e) => TransportError::Connection {
            message: e.to_string(),
        }
        .into(),
        other => TransportError::WebSocket {
            message: other.to_string(),
        }
        .into(),
    }
}
