//! DevTools protocol transport
//!
//! One WebSocket per page target, carrying JSON-RPC style frames in both
//! directions. Outgoing commands get auto-incremented ids and are correlated
//! back to their callers through oneshot channels; unsolicited frames
//! (`Page.loadEventFired` and friends) are forwarded to an event queue the
//! page handle drains while waiting for asynchronous transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// An unsolicited notification from the browser
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method, e.g. `Page.loadEventFired`
    pub method: String,
    pub params: Value,
}

/// Error object attached to a command reply
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

/// One frame read off the DevTools socket
#[derive(Debug)]
pub enum Frame {
    /// Reply to a command we sent
    Reply {
        id: u64,
        result: Value,
        error: Option<CdpErrorBody>,
    },
    /// Asynchronous event
    Event(CdpEvent),
}

#[derive(Debug, Serialize)]
struct CommandFrame<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// Classify a raw socket payload as a command reply or an event.
///
/// Replies carry an `id`; events carry a `method` and no `id`. Anything else
/// is noise and yields `None`.
pub fn parse_frame(raw: &str) -> Option<Frame> {
    let json: Value = serde_json::from_str(raw).ok()?;

    if let Some(id) = json.get("id").and_then(Value::as_u64) {
        return Some(Frame::Reply {
            id,
            result: json.get("result").cloned().unwrap_or(Value::Null),
            error: json
                .get("error")
                .and_then(|e| serde_json::from_value(e.clone()).ok()),
        });
    }

    let method = json.get("method")?.as_str()?.to_string();
    Some(Frame::Event(CdpEvent {
        method,
        params: json.get("params").cloned().unwrap_or(Value::Null),
    }))
}

type ReplySlot = oneshot::Sender<(Value, Option<CdpErrorBody>)>;

/// DevTools client bound to a single page target
pub struct CdpClient {
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, ReplySlot>>>,
    writer: Mutex<WsSink>,
    events: mpsc::UnboundedReceiver<CdpEvent>,
    command_timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a page target's WebSocket debugger URL.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> HarnessResult<Self> {
        debug!(url = ws_url, "connecting to devtools target");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| HarnessError::Protocol(format!("connect to {ws_url} failed: {e}")))?;
        let (writer, source) = stream.split();

        let pending: Arc<Mutex<HashMap<u64, ReplySlot>>> = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, events) = mpsc::unbounded_channel();

        let reader = tokio::spawn(Self::read_loop(source, Arc::clone(&pending), event_tx));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            events,
            command_timeout,
            reader,
        })
    }

    /// Send a command and wait for its reply within the command timeout.
    pub async fn call(&self, method: &str, params: Value) -> HarnessResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&CommandFrame { id, method, params })?;

        debug!(id, method, "devtools command");

        // Register the reply slot before sending so a fast reply cannot race
        // the insertion.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.writer
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| HarnessError::Protocol(format!("send failed: {e}")))?;

        let (result, error) = tokio::time::timeout(self.command_timeout, rx)
            .await
            .map_err(|_| HarnessError::Timeout {
                what: format!("reply to {method}"),
                timeout: self.command_timeout,
            })?
            .map_err(|_| HarnessError::Protocol("devtools connection closed".to_string()))?;

        if let Some(err) = error {
            return Err(HarnessError::Cdp {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(result)
    }

    /// Enable a protocol domain (`Page`, `Runtime`, `Network`).
    pub async fn enable(&self, domain: &str) -> HarnessResult<()> {
        self.call(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Next queued event, or `None` once the socket is gone.
    pub async fn next_event(&mut self) -> Option<CdpEvent> {
        self.events.recv().await
    }

    /// Wait for a specific event, draining and discarding others.
    pub async fn wait_for_event(&mut self, method: &str, timeout: Duration) -> HarnessResult<CdpEvent> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(HarnessError::Timeout {
                    what: method.to_string(),
                    timeout,
                });
            }

            match tokio::time::timeout(remaining, self.events.recv()).await {
                Ok(Some(event)) if event.method == method => return Ok(event),
                Ok(Some(_)) => continue,
                Ok(None) => {
                    return Err(HarnessError::Protocol(
                        "devtools connection closed while waiting for event".to_string(),
                    ))
                }
                Err(_) => {
                    return Err(HarnessError::Timeout {
                        what: method.to_string(),
                        timeout,
                    })
                }
            }
        }
    }

    async fn read_loop(
        mut source: WsSource,
        pending: Arc<Mutex<HashMap<u64, ReplySlot>>>,
        event_tx: mpsc::UnboundedSender<CdpEvent>,
    ) {
        while let Some(message) = source.next().await {
            let text = match message {
                Ok(Message::Text(t)) => t,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "devtools socket read error");
                    break;
                }
            };

            match parse_frame(&text) {
                Some(Frame::Reply { id, result, error }) => {
                    if let Some(slot) = pending.lock().await.remove(&id) {
                        let _ = slot.send((result, error));
                    } else {
                        debug!(id, "reply for unknown command id");
                    }
                }
                Some(Frame::Event(event)) => {
                    // Nobody listening is fine; the page drains on demand.
                    let _ = event_tx.send(event);
                }
                None => debug!("unparseable devtools frame"),
            }
        }

        // Fail anything still waiting when the socket drops.
        for (_, slot) in pending.lock().await.drain() {
            let _ = slot.send((
                Value::Null,
                Some(CdpErrorBody {
                    code: -1,
                    message: "connection closed".to_string(),
                }),
            ));
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
