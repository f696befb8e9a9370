//! Local `graphql-transport-ws` server for channel tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// Everything the server observed.
#[derive(Debug, Default)]
pub struct ChannelLog {
    /// Request URIs of accepted connections (path and query)
    pub uris: Vec<String>,
    /// Client frames, in arrival order
    pub frames: Vec<Value>,
    /// Connections that have ended
    pub closed: usize,
}

impl ChannelLog {
    pub fn frames_of(&self, kind: &str) -> Vec<Value> {
        self.frames.iter().filter(|frame| frame["type"] == kind).cloned().collect()
    }
}

pub struct ChannelServer {
    pub url: String,
    log: Arc<Mutex<ChannelLog>>,
}

impl ChannelServer {
    /// Serve on an ephemeral port; every `subscribe` receives `events` as
    /// `next` payloads.
    pub async fn start(events: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind channel server");
        let addr = listener.local_addr().expect("channel server address");
        let log = Arc::new(Mutex::new(ChannelLog::default()));
        let events = Arc::new(events);

        let accept_log = log.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, accept_log.clone(), events.clone()));
            }
        });

        Self { url: format!("ws://{addr}/subscriptions"), log }
    }

    pub fn uris(&self) -> Vec<String> {
        self.log.lock().uris.clone()
    }

    pub fn frames_of(&self, kind: &str) -> Vec<Value> {
        self.log.lock().frames_of(kind)
    }

    pub fn closed(&self) -> usize {
        self.log.lock().closed
    }

    /// Poll the log until `predicate` holds (two seconds at most).
    pub async fn wait_for(&self, predicate: impl Fn(&ChannelLog) -> bool) -> bool {
        for _ in 0..100 {
            if predicate(&self.log.lock()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

async fn serve(stream: TcpStream, log: Arc<Mutex<ChannelLog>>, events: Arc<Vec<Value>>) {
    let handshake_log = log.clone();
    let callback = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        handshake_log.lock().uris.push(request.uri().to_string());
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("graphql-transport-ws"));
        Ok(response)
    };

    let Ok(socket) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut sink, mut source) = socket.split();

    while let Some(Ok(message)) = source.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
        log.lock().frames.push(frame.clone());

        let replies = match frame["type"].as_str() {
            Some("connection_init") => vec![json!({ "type": "connection_ack" })],
            Some("ping") => vec![json!({ "type": "pong" })],
            Some("subscribe") => events
                .iter()
                .map(|event| json!({ "id": frame["id"], "type": "next", "payload": event }))
                .collect(),
            _ => Vec::new(),
        };
        for reply in replies {
            if sink.send(Message::Text(reply.to_string().into())).await.is_err() {
                break;
            }
        }
    }

    log.lock().closed += 1;
}
