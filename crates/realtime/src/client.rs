use crate::error::RealtimeError;
use crate::message::{MessageType, RealtimeMessage, SubscriptionEvent};
use crate::subscription::{EventSink, Subscription};
use base64::Engine;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

const SUBPROTOCOL: &str = "graphql-ws";
/// base64 of `{}`
const EMPTY_PAYLOAD: &str = "e30=";

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type Routes = Arc<RwLock<HashMap<String, EventSink>>>;
type PendingAcks = Arc<Mutex<HashMap<String, oneshot::Sender<Result<(), RealtimeError>>>>>;

/// 接続状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// RealtimeClient設定オプション
#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    /// How long to wait for `connection_ack`
    pub ack_timeout: Duration,
    /// How long to wait for `start_ack`
    pub start_ack_timeout: Duration,
    /// Keep-alive window used when the ack does not announce one
    pub default_keep_alive: Duration,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            start_ack_timeout: Duration::from_secs(15),
            default_keep_alive: Duration::from_millis(300_000),
        }
    }
}

/// Realtimeクライアント本体
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) graphql_url: Url,
    pub(crate) endpoint: Url,
    pub(crate) options: RealtimeClientOptions,
    pub(crate) access_token: Arc<RwLock<Option<String>>>,
    socket: Arc<RwLock<Option<mpsc::Sender<Message>>>>,
    routes: Routes,
    pending: PendingAcks,
    state: Arc<RwLock<ConnectionState>>,
    state_change: broadcast::Sender<ConnectionState>,
    connect_lock: Arc<Mutex<()>>,
    generation: Arc<AtomicU64>,
}

impl RealtimeClient {
    /// Create a client for the GraphQL endpoint `graphql_url`
    pub fn new(graphql_url: &str) -> Result<Self, RealtimeError> {
        Self::new_with_options(graphql_url, RealtimeClientOptions::default())
    }

    pub fn new_with_options(
        graphql_url: &str,
        options: RealtimeClientOptions,
    ) -> Result<Self, RealtimeError> {
        let graphql_url = Url::parse(graphql_url)?;
        let endpoint = Self::realtime_endpoint(&graphql_url)?;
        Ok(Self::build(graphql_url, endpoint, options))
    }

    /// Use an explicit realtime endpoint instead of deriving it
    pub fn with_endpoint(
        graphql_url: &str,
        realtime_url: &str,
        options: RealtimeClientOptions,
    ) -> Result<Self, RealtimeError> {
        Ok(Self::build(
            Url::parse(graphql_url)?,
            Url::parse(realtime_url)?,
            options,
        ))
    }

    fn build(graphql_url: Url, endpoint: Url, options: RealtimeClientOptions) -> Self {
        let (state_change_tx, _) = broadcast::channel(16);
        Self {
            graphql_url,
            endpoint,
            options,
            access_token: Arc::new(RwLock::new(None)),
            socket: Arc::new(RwLock::new(None)),
            routes: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            state_change: state_change_tx,
            connect_lock: Arc::new(Mutex::new(())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Realtime endpoint for a GraphQL URL: ws(s) scheme, and the
    /// `appsync-api` host label swapped for `appsync-realtime-api`.
    pub fn realtime_endpoint(graphql_url: &Url) -> Result<Url, RealtimeError> {
        let mut url = graphql_url.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            s => {
                return Err(RealtimeError::ConnectionError(format!(
                    "Unsupported URL scheme: {}",
                    s
                )))
            }
        };
        url.set_scheme(scheme).map_err(|_| {
            RealtimeError::ConnectionError(format!("Cannot switch {} to {}", graphql_url, scheme))
        })?;

        let host = url
            .host_str()
            .ok_or(RealtimeError::UrlParseError(url::ParseError::EmptyHost))?
            .to_string();
        if host.contains("appsync-api") {
            url.set_host(Some(&host.replacen("appsync-api", "appsync-realtime-api", 1)))?;
        }
        url.set_query(None);
        Ok(url)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Method to set the authentication token
    pub async fn set_auth(&self, token: Option<String>) {
        info!("Setting auth token (is_some: {})", token.is_some());
        *self.access_token.write().await = token;
    }

    /// 接続状態変更の通知を受け取るためのレシーバーを取得
    pub fn on_state_change(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_change.subscribe()
    }

    /// 現在の接続状態を取得
    pub async fn get_connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    fn api_host(&self) -> String {
        let host = self.graphql_url.host_str().unwrap_or_default();
        match self.graphql_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// The `{host, Authorization}` object used in the handshake and in every start frame
    async fn authorization(&self) -> Result<serde_json::Value, RealtimeError> {
        let token = self
            .access_token
            .read()
            .await
            .clone()
            .ok_or(RealtimeError::Unauthorized)?;
        Ok(json!({
            "host": self.api_host(),
            "Authorization": token,
        }))
    }

    fn connect_url(&self, authorization: &serde_json::Value) -> Url {
        let header = base64::engine::general_purpose::STANDARD.encode(authorization.to_string());
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("header", &header)
            .append_pair("payload", EMPTY_PAYLOAD);
        url
    }

    async fn set_connection_state(
        state_arc: &RwLock<ConnectionState>,
        state_change_tx: &broadcast::Sender<ConnectionState>,
        state: ConnectionState,
    ) {
        let mut current_state = state_arc.write().await;
        if *current_state != state {
            trace!("Client state changing from {:?} to {:?}", *current_state, state);
            *current_state = state;
            let _ = state_change_tx.send(state);
        }
    }

    /// Open the connection and complete the `connection_init` handshake.
    ///
    /// Does nothing when already connected.
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        let _guard = self.connect_lock.lock().await;
        if self.get_connection_state().await == ConnectionState::Connected {
            trace!("connect(): already connected");
            return Ok(());
        }

        let authorization = self.authorization().await?;
        let url = self.connect_url(&authorization);
        let mut request = url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));

        Self::set_connection_state(&self.state, &self.state_change, ConnectionState::Connecting)
            .await;
        info!("Attempting to connect to WebSocket: {}", self.endpoint);

        let ws_stream = match connect_async(request).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("WebSocket connection failed: {}", e);
                Self::set_connection_state(
                    &self.state,
                    &self.state_change,
                    ConnectionState::Disconnected,
                )
                .await;
                return Err(RealtimeError::ConnectionError(format!(
                    "WebSocket connection failed: {}",
                    e
                )));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (mut write, mut read) = ws_stream.split();
        let (socket_tx, mut socket_rx) = mpsc::channel::<Message>(100);
        *self.socket.write().await = Some(socket_tx.clone());

        // --- WebSocket Writer Task ---
        tokio::spawn(async move {
            debug!("Writer task started");
            while let Some(message) = socket_rx.recv().await {
                trace!("Writer task sending message: {:?}", message);
                if let Err(e) = write.send(message).await {
                    error!("Writer task: WebSocket send error: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Writer task finished (sender dropped or error).");
        });

        let init = serde_json::to_string(&RealtimeMessage::connection_init())?;
        socket_tx.send(Message::Text(init)).await?;
        drop(socket_tx);

        let keep_alive = match timeout(self.options.ack_timeout, Self::await_ack(&mut read)).await {
            Ok(Ok(window)) => window.unwrap_or(self.options.default_keep_alive),
            Ok(Err(e)) => {
                self.abort_connection().await;
                return Err(e);
            }
            Err(_) => {
                self.abort_connection().await;
                return Err(RealtimeError::ConnectionError(
                    "Timed out waiting for connection_ack".to_string(),
                ));
            }
        };

        Self::set_connection_state(&self.state, &self.state_change, ConnectionState::Connected)
            .await;
        debug!("Connected, keep-alive window {:?}", keep_alive);

        // --- WebSocket Reader Task (keep-alive supervision) ---
        let reader = self.clone();
        tokio::spawn(async move {
            reader.read_loop(read, keep_alive, generation).await;
        });

        Ok(())
    }

    async fn await_ack(read: &mut WsRead) -> Result<Option<Duration>, RealtimeError> {
        while let Some(frame) = read.next().await {
            let Message::Text(text) = frame? else {
                continue;
            };
            let message: RealtimeMessage = serde_json::from_str(&text)?;
            match message.message_type {
                MessageType::ConnectionAck => {
                    return Ok(message.connection_timeout_ms().map(Duration::from_millis))
                }
                MessageType::ConnectionError => {
                    return Err(RealtimeError::ConnectionError(message.error_text()))
                }
                other => trace!("Ignoring {:?} before connection_ack", other),
            }
        }
        Err(RealtimeError::ConnectionError(
            "Connection closed before connection_ack".to_string(),
        ))
    }

    async fn abort_connection(&self) {
        self.socket.write().await.take();
        Self::set_connection_state(&self.state, &self.state_change, ConnectionState::Disconnected)
            .await;
    }

    async fn read_loop(self, mut read: WsRead, keep_alive: Duration, generation: u64) {
        debug!("Reader task started");
        let reason = loop {
            match timeout(keep_alive, read.next()).await {
                Err(_) => {
                    warn!("No frame within the keep-alive window of {:?}", keep_alive);
                    break "connection timed out";
                }
                Ok(None) => {
                    debug!("Reader task: WebSocket stream closed by remote.");
                    break "connection closed";
                }
                Ok(Some(Err(e))) => {
                    error!("Reader task: WebSocket read error: {}", e);
                    break "connection error";
                }
                Ok(Some(Ok(Message::Text(text)))) => self.dispatch(&text).await,
                Ok(Some(Ok(Message::Close(frame)))) => {
                    debug!("Reader task received Close frame: {:?}", frame);
                    break "connection closed";
                }
                Ok(Some(Ok(other))) => trace!("Reader task ignoring frame: {:?}", other),
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Reader task of a replaced connection finished");
            return;
        }

        self.socket.write().await.take();
        Self::set_connection_state(&self.state, &self.state_change, ConnectionState::Disconnected)
            .await;
        for (id, route) in self.routes.write().await.drain() {
            trace!("Failing subscription {}: {}", id, reason);
            let _ = route.send((id, SubscriptionEvent::Error(reason.to_string())));
        }
        for (_, ack) in self.pending.lock().await.drain() {
            let _ = ack.send(Err(RealtimeError::ConnectionError(reason.to_string())));
        }
        debug!("Reader task finished: {}", reason);
    }

    async fn dispatch(&self, text: &str) {
        let message: RealtimeMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to parse incoming frame: {}. Raw: {}", e, text);
                return;
            }
        };
        let id = message.id.clone().unwrap_or_default();

        match message.message_type {
            MessageType::Ka => trace!("keep-alive"),
            MessageType::StartAck => {
                if let Some(ack) = self.pending.lock().await.remove(&id) {
                    let _ = ack.send(Ok(()));
                }
            }
            MessageType::Data => {
                let data = message
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("data"))
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                match self.routes.read().await.get(&id) {
                    Some(route) => {
                        let _ = route.send((id.clone(), SubscriptionEvent::Data(data)));
                    }
                    None => warn!("Data for unknown subscription {}", id),
                }
            }
            MessageType::Error => {
                let text = message.error_text();
                if let Some(ack) = self.pending.lock().await.remove(&id) {
                    self.routes.write().await.remove(&id);
                    let _ = ack.send(Err(RealtimeError::SubscriptionError(text)));
                } else if let Some(route) = self.routes.read().await.get(&id) {
                    let _ = route.send((id.clone(), SubscriptionEvent::Error(text)));
                } else {
                    error!("Realtime error: {}", text);
                }
            }
            MessageType::Complete => {
                if let Some(route) = self.routes.write().await.remove(&id) {
                    let _ = route.send((id.clone(), SubscriptionEvent::Complete));
                }
            }
            MessageType::ConnectionError => error!("Connection error: {}", message.error_text()),
            other => debug!("Unhandled frame {:?}", other),
        }
    }

    /// Start a GraphQL subscription, connecting first if needed.
    ///
    /// Resolves once the service acknowledges the start.
    pub async fn subscribe(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<Subscription, RealtimeError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let id = self.start(query, variables, event_tx).await?;
        Ok(Subscription::new(id, Some(event_rx), self.clone()))
    }

    /// Start a subscription whose events go to `sink`, tagged with its id.
    ///
    /// Events of every subscription sharing a sink arrive in the order the
    /// connection received them.
    pub async fn subscribe_into(
        &self,
        query: &str,
        variables: serde_json::Value,
        sink: EventSink,
    ) -> Result<Subscription, RealtimeError> {
        let id = self.start(query, variables, sink).await?;
        Ok(Subscription::new(id, None, self.clone()))
    }

    async fn start(
        &self,
        query: &str,
        variables: serde_json::Value,
        sink: EventSink,
    ) -> Result<String, RealtimeError> {
        self.connect().await?;

        let id = Uuid::new_v4().to_string();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.routes.write().await.insert(id.clone(), sink);
        self.pending.lock().await.insert(id.clone(), ack_tx);

        let data = json!({ "query": query, "variables": variables }).to_string();
        let start = RealtimeMessage::start(&id, data, self.authorization().await?);
        if let Err(e) = self.send(&start).await {
            self.forget(&id).await;
            return Err(e);
        }

        match timeout(self.options.start_ack_timeout, ack_rx).await {
            Ok(Ok(Ok(()))) => {
                debug!("Subscription {} started", id);
                Ok(id)
            }
            Ok(Ok(Err(e))) => {
                self.forget(&id).await;
                Err(e)
            }
            Ok(Err(_)) => {
                self.forget(&id).await;
                Err(RealtimeError::ConnectionError(
                    "Connection dropped before start_ack".to_string(),
                ))
            }
            Err(_) => {
                self.forget(&id).await;
                Err(RealtimeError::SubscriptionError(
                    "Timed out waiting for start_ack".to_string(),
                ))
            }
        }
    }

    async fn forget(&self, id: &str) {
        self.routes.write().await.remove(id);
        self.pending.lock().await.remove(id);
    }

    /// Stop a subscription. Nothing is sent once the socket is gone.
    pub(crate) async fn stop(&self, id: &str) -> Result<(), RealtimeError> {
        self.routes.write().await.remove(id);
        if self.socket.read().await.is_none() {
            debug!("Subscription {} released locally; socket already closed", id);
            return Ok(());
        }
        self.send(&RealtimeMessage::stop(id)).await
    }

    /// Helper to send a frame through the WebSocket connection
    pub(crate) async fn send(&self, message: &RealtimeMessage) -> Result<(), RealtimeError> {
        let text = serde_json::to_string(message)?;
        trace!("Client attempting to send frame: {}", text);
        let socket_guard = self.socket.read().await;
        match socket_guard.as_ref() {
            Some(socket_tx) => socket_tx
                .send(Message::Text(text))
                .await
                .map_err(RealtimeError::from),
            None => {
                warn!("Cannot send frame, client socket unavailable.");
                Err(RealtimeError::ConnectionError(
                    "Client socket unavailable".to_string(),
                ))
            }
        }
    }

    /// 切断処理
    ///
    /// Open subscriptions receive `Complete`.
    pub async fn disconnect(&self) -> Result<(), RealtimeError> {
        info!("disconnect() called");
        Self::set_connection_state(&self.state, &self.state_change, ConnectionState::Disconnected)
            .await;

        if self.socket.write().await.take().is_none() {
            warn!("disconnect(): No active socket sender found, likely already disconnected.");
        }
        for (id, route) in self.routes.write().await.drain() {
            let _ = route.send((id, SubscriptionEvent::Complete));
        }
        Ok(())
    }
}

// WebSocketメッセージ送信エラーからの変換
impl From<mpsc::error::SendError<Message>> for RealtimeError {
    fn from(err: mpsc::error::SendError<Message>) -> Self {
        RealtimeError::ConnectionError(format!("Failed to send message to socket task: {}", err))
    }
}
