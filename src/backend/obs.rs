//! obs-websocket v5 backend session
//!
//! One websocket connection is opened at startup and kept for the lifetime
//! of the agent. Requests are correlated with responses by `requestId`: a
//! background reader task routes each `RequestResponse` to the caller
//! waiting on it.

use crate::backend::protocol::{
    auth_response, op, Envelope, Hello, Identified, Identify, Request, RequestResponse,
    RPC_VERSION,
};
use crate::backend::{BackendError, StudioBackend};
use crate::config::ObsConfig;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Time allowed for connect + identification
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code sent by obs-websocket when authentication fails
const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<RequestResponse>>>>;

/// Backend session talking to OBS Studio through obs-websocket
pub struct ObsBackend {
    sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: PendingRequests,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    request_timeout: Duration,
    camera_scene: String,
    camera_source: String,
    default_mute_input: Option<String>,
}

impl ObsBackend {
    /// Connect and identify with the obs-websocket server
    pub async fn connect(config: &ObsConfig) -> Result<Self, BackendError> {
        let url = config.url();
        info!("Connecting to OBS at {}", url);

        let (sink, stream) = tokio::time::timeout(CONNECT_TIMEOUT, handshake(&url, config))
            .await
            .map_err(|_| BackendError::Timeout(format!("Connecting to {}", url)))??;

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(stream, pending.clone(), closed.clone()));

        info!("Connected to OBS at {}", url);

        Ok(Self {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            closed,
            reader,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            camera_scene: config.camera_scene.clone(),
            camera_source: config.camera_source.clone(),
            default_mute_input: config.default_mute_input.clone(),
        })
    }

    /// Whether the session is still usable
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Close the websocket connection
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing OBS session");
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Failed to send close frame: {}", e);
        }
    }

    /// Send a request and wait for its response data
    async fn request(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Option<Value>, BackendError> {
        if !self.is_connected() {
            return Err(BackendError::Closed);
        }

        let request_id = Uuid::new_v4().to_string();
        let envelope = Envelope {
            op: op::REQUEST,
            d: Request {
                request_type: request_type.to_string(),
                request_id: request_id.clone(),
                request_data,
            },
        };
        let text = serde_json::to_string(&envelope)
            .map_err(|e| BackendError::Protocol(format!("Failed to encode request: {}", e)))?;

        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id.clone(), tx);

        debug!("Sending {} ({})", request_type, request_id);
        let sent = self.sink.lock().await.send(Message::Text(text)).await;
        if let Err(e) = sent {
            self.pending().remove(&request_id);
            return Err(BackendError::Connection(e.to_string()));
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(BackendError::Closed),
            Err(_) => {
                self.pending().remove(&request_id);
                return Err(BackendError::Timeout(request_type.to_string()));
            }
        };

        let status = response.request_status;
        if !status.result {
            return Err(BackendError::Request {
                request: response.request_type,
                code: status.code,
                comment: status.comment.unwrap_or_default(),
            });
        }

        Ok(response.response_data)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<RequestResponse>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StudioBackend for ObsBackend {
    async fn toggle_mute(&self, input: &str) -> Result<(), BackendError> {
        let input = match input.trim() {
            "" => self.default_mute_input.as_deref().ok_or_else(|| {
                BackendError::InvalidArgument("ToggleMute requires an input name".to_string())
            })?,
            name => name,
        };

        self.request("ToggleInputMute", Some(json!({ "inputName": input })))
            .await?;
        Ok(())
    }

    async fn trigger_transition(&self) -> Result<(), BackendError> {
        self.request("TriggerStudioModeTransition", None).await?;
        Ok(())
    }

    async fn toggle_camera(&self) -> Result<(), BackendError> {
        let data = self
            .request(
                "GetSceneItemId",
                Some(json!({
                    "sceneName": self.camera_scene,
                    "sourceName": self.camera_source,
                    "searchOffset": 0,
                })),
            )
            .await?;
        let item_id = field(&data, "sceneItemId")?
            .as_i64()
            .ok_or_else(|| BackendError::Protocol("sceneItemId is not an integer".to_string()))?;

        let data = self
            .request(
                "GetSceneItemEnabled",
                Some(json!({ "sceneName": self.camera_scene, "sceneItemId": item_id })),
            )
            .await?;
        let enabled = field(&data, "sceneItemEnabled")?
            .as_bool()
            .ok_or_else(|| {
                BackendError::Protocol("sceneItemEnabled is not a boolean".to_string())
            })?;

        self.request(
            "SetSceneItemEnabled",
            Some(json!({
                "sceneName": self.camera_scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": !enabled,
            })),
        )
        .await?;

        debug!(
            "Camera source '{}' is now {}",
            self.camera_source,
            if enabled { "hidden" } else { "visible" }
        );
        Ok(())
    }
}

impl Drop for ObsBackend {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Open the websocket and run Hello / Identify / Identified
async fn handshake(
    url: &str,
    config: &ObsConfig,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), BackendError> {
    let (ws, _) = connect_async(url)
        .await
        .map_err(|e| BackendError::Connection(format!("{}: {}", url, e)))?;
    let (mut sink, mut stream) = ws.split();

    let hello: Hello = read_message(&mut stream, op::HELLO).await?;
    debug!(
        "obs-websocket {} (rpc {})",
        hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        hello.rpc_version
    );

    let authentication = match hello.authentication {
        Some(challenge) => {
            let password = config.password.as_ref().ok_or_else(|| {
                BackendError::Authentication(
                    "server requires a password but none is configured".to_string(),
                )
            })?;
            Some(auth_response(password, &challenge.salt, &challenge.challenge))
        }
        None => None,
    };

    let identify = Envelope {
        op: op::IDENTIFY,
        d: Identify {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        },
    };
    let text = serde_json::to_string(&identify)
        .map_err(|e| BackendError::Protocol(format!("Failed to encode Identify: {}", e)))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| BackendError::Connection(e.to_string()))?;

    let identified: Identified = read_message(&mut stream, op::IDENTIFIED).await?;
    debug!("Negotiated rpc version {}", identified.negotiated_rpc_version);

    Ok((sink, stream))
}

/// Read messages until one with the expected opcode arrives
async fn read_message<S, T>(stream: &mut S, expected: u8) -> Result<T, BackendError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    T: DeserializeOwned,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope: Envelope<Value> = serde_json::from_str(&text)
                    .map_err(|e| BackendError::Protocol(format!("Invalid message: {}", e)))?;
                if envelope.op != expected {
                    debug!("Ignoring op {} while waiting for op {}", envelope.op, expected);
                    continue;
                }
                return serde_json::from_value(envelope.d)
                    .map_err(|e| BackendError::Protocol(format!("Invalid op {} data: {}", expected, e)));
            }
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(BackendError::Connection(e.to_string())),
            None => return Err(BackendError::Closed),
        }
    }
}

fn close_error(frame: Option<CloseFrame<'_>>) -> BackendError {
    match frame {
        Some(frame) if u16::from(frame.code) == CLOSE_AUTHENTICATION_FAILED => {
            BackendError::Authentication(frame.reason.into_owned())
        }
        Some(frame) => BackendError::Connection(format!(
            "closed by server ({}): {}",
            u16::from(frame.code),
            frame.reason
        )),
        None => BackendError::Closed,
    }
}

/// Route request responses to their waiting callers until the socket closes
async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: PendingRequests,
    closed: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => route_message(&text, &pending),
            Ok(Message::Close(frame)) => {
                warn!("OBS closed the session: {}", close_error(frame));
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("OBS session error: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every outstanding request with `Closed`
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

fn route_message(text: &str, pending: &PendingRequests) {
    let envelope: Envelope<Value> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Discarding malformed OBS message: {}", e);
            return;
        }
    };

    match envelope.op {
        op::REQUEST_RESPONSE => {
            let response: RequestResponse = match serde_json::from_value(envelope.d) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Discarding malformed request response: {}", e);
                    return;
                }
            };

            let waiter = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&response.request_id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => debug!("No caller waiting for request {}", response.request_id),
            }
        }
        op::EVENT => {}
        other => debug!("Ignoring op {}", other),
    }
}

fn field<'a>(data: &'a Option<Value>, name: &str) -> Result<&'a Value, BackendError> {
    data.as_ref()
        .and_then(|d| d.get(name))
        .ok_or_else(|| BackendError::Protocol(format!("Response is missing '{}'", name)))
}
