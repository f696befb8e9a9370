//! Persistent subscription channel
//!
//! One WebSocket per bearer token speaking `graphql-transport-ws`: the
//! token rides in the connection URI, `connection_init` must be acknowledged
//! before any `subscribe`, and every subscription is multiplexed by id. A
//! background task owns the socket; handles talk to it over a command queue.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use carelink_domain::constants::{CHANNEL_SUBPROTOCOL, CHANNEL_TOKEN_PARAM};
use carelink_domain::{CareLinkError, Operation, Result};
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::InfraError;
use crate::gateway::graphql::{classify_errors, GraphQLError, GraphQLResponse};

const ACK_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type Events = mpsc::UnboundedSender<Result<Value>>;

enum Command {
    Subscribe { id: String, payload: Value, events: Events },
    Complete { id: String },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConnectionAck {},
    Next { id: String, payload: Value },
    Error { id: String, payload: Value },
    Complete { id: String },
    Ping {},
    Pong {},
}

fn ws_error(err: WsError) -> CareLinkError {
    InfraError::from(err).into()
}

fn channel_closed() -> CareLinkError {
    CareLinkError::Network("persistent channel closed".into())
}

fn text_frame(message: &Value) -> WsMessage {
    WsMessage::Text(message.to_string().into())
}

/// `<endpoint>?token=<token>`
pub fn channel_url(endpoint: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(InfraError::from)?;
    url.query_pairs_mut().append_pair(CHANNEL_TOKEN_PARAM, token);
    Ok(url)
}

pub struct Channel {
    commands: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Channel {
    /// Open the socket and complete the `connection_init` handshake.
    ///
    /// # Errors
    /// `SessionExpired` when the handshake is refused with 401/403, `Network`
    /// for any other connection failure or a missing acknowledgement.
    pub async fn connect(endpoint: &str, token: &str) -> Result<Self> {
        let url = channel_url(endpoint, token)?;
        let mut request = url.as_str().into_client_request().map_err(ws_error)?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(CHANNEL_SUBPROTOCOL));

        let (stream, _response) = connect_async(request).await.map_err(ws_error)?;
        let (mut sink, mut source) = stream.split();

        sink.send(text_frame(&json!({ "type": "connection_init", "payload": {} })))
            .await
            .map_err(ws_error)?;
        tokio::time::timeout(ACK_TIMEOUT, await_ack(&mut sink, &mut source))
            .await
            .map_err(|_| CareLinkError::Network("timed out waiting for connection_ack".into()))??;

        info!(endpoint = %endpoint, "Persistent channel connected");

        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(sink, source, receiver));

        Ok(Self { commands, task: Mutex::new(Some(task)), next_id: AtomicU64::new(1) })
    }

    /// The background task is still serving commands.
    pub fn is_open(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Start a subscription; events arrive on the returned stream.
    pub fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (events, receiver) = mpsc::unbounded_channel();

        self.commands
            .send(Command::Subscribe { id: id.clone(), payload: operation.to_payload(), events })
            .map_err(|_| channel_closed())?;

        debug!(id = %id, operation = operation.name().unwrap_or("<anonymous>"), "Subscription started");
        Ok(SubscriptionStream { id, events: receiver, commands: self.commands.clone() })
    }

    /// Close the socket and wait for the background task to finish.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close);
        let task = self.task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                warn!("Persistent channel did not close in time; aborting");
                task.abort();
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Push events of one subscription
///
/// Ends when the server completes the subscription or the channel closes.
/// Dropping the stream sends `complete` for its id.
pub struct SubscriptionStream {
    id: String,
    events: mpsc::UnboundedReceiver<Result<Value>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SubscriptionStream {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Complete { id: std::mem::take(&mut self.id) });
    }
}

async fn await_ack<S, R>(sink: &mut S, source: &mut R) -> Result<()>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(message) = source.next().await {
        match message.map_err(ws_error)? {
            WsMessage::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                Ok(ServerMessage::ConnectionAck {}) => return Ok(()),
                Ok(ServerMessage::Ping {}) => {
                    sink.send(text_frame(&json!({ "type": "pong" }))).await.map_err(ws_error)?;
                }
                _ => debug!("Ignoring frame received before connection_ack"),
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    Err(CareLinkError::Network("channel closed before connection_ack".into()))
}

async fn run<S, R>(mut sink: S, mut source: R, mut commands: mpsc::UnboundedReceiver<Command>)
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    let mut subscribers: HashMap<String, Events> = HashMap::new();
    let mut failure: Option<CareLinkError> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Subscribe { id, payload, events }) => {
                    let frame = json!({ "id": id, "type": "subscribe", "payload": payload });
                    if let Err(err) = sink.send(text_frame(&frame)).await {
                        let _ = events.send(Err(ws_error(err)));
                        failure = Some(channel_closed());
                        break;
                    }
                    subscribers.insert(id, events);
                }
                Some(Command::Complete { id }) => {
                    if subscribers.remove(&id).is_some() {
                        debug!(id = %id, "Completing subscription");
                        let frame = json!({ "id": id, "type": "complete" });
                        if sink.send(text_frame(&frame)).await.is_err() {
                            failure = Some(channel_closed());
                            break;
                        }
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = sink.close().await;
                    info!(open_subscriptions = subscribers.len(), "Persistent channel closed");
                    break;
                }
            },
            message = source.next() => match message {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reply) = handle_frame(text.as_str(), &mut subscribers) {
                        if sink.send(reply).await.is_err() {
                            failure = Some(channel_closed());
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    warn!(frame = ?frame, "Server closed the persistent channel");
                    failure = Some(channel_closed());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "Persistent channel failed");
                    failure = Some(ws_error(err));
                    break;
                }
                None => {
                    failure = Some(channel_closed());
                    break;
                }
            },
        }
    }

    if let Some(err) = failure {
        for (_, events) in subscribers.drain() {
            let _ = events.send(Err(err.clone()));
        }
    }
}

/// Route one server frame; returns a reply frame when one is due.
fn handle_frame(text: &str, subscribers: &mut HashMap<String, Events>) -> Option<WsMessage> {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "Ignoring unrecognized channel frame");
            return None;
        }
    };

    match message {
        ServerMessage::Next { id, payload } => {
            let event = serde_json::from_value::<GraphQLResponse<Value>>(payload)
                .map_err(|e| CareLinkError::FetchFailed(format!("Malformed push payload: {e}")))
                .and_then(GraphQLResponse::into_data);
            if let Some(events) = subscribers.get(&id) {
                let _ = events.send(event);
            }
        }
        ServerMessage::Error { id, payload } => {
            let error = serde_json::from_value::<Vec<GraphQLError>>(payload)
                .map(|errors| classify_errors(&errors))
                .unwrap_or_else(|e| CareLinkError::FetchFailed(format!("Malformed error frame: {e}")));
            if let Some(events) = subscribers.remove(&id) {
                let _ = events.send(Err(error));
            }
        }
        ServerMessage::Complete { id } => {
            debug!(id = %id, "Server completed subscription");
            subscribers.remove(&id);
        }
        ServerMessage::Ping {} => return Some(text_frame(&json!({ "type": "pong" }))),
        ServerMessage::ConnectionAck {} | ServerMessage::Pong {} => {}
    }

    None
}
