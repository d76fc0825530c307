//! Push subscription for one poll's live updates.
//!
//! Each [`LiveChannel::open`] call owns its own transport connection and
//! reconnect schedule; nothing is shared between channels, so two pages
//! watching different polls cannot clobber each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::protocol::{ClientMessage, ServerMessage};
use crate::config::ChannelConfig;
use crate::models::{PollId, ResultSnapshot};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type EventFn = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Before `open` is called.
    Idle,
    Connecting,
    /// Handshake sent, no update received yet.
    Subscribed,
    /// At least one update delivered on the current connection.
    Receiving,
    Reconnecting,
    Closed,
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// An accepted, in-order snapshot pushed by the backend.
    Update(ResultSnapshot),
    /// Reconnect attempts are exhausted; no further updates will arrive on
    /// this channel. Emitted at most once, never after `close`.
    Degraded,
}

struct Shared {
    state: Mutex<ChannelState>,
    closed: Notify,
    closed_flag: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed_flag.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ChannelState) {
        let mut state = self.state.lock();
        // Closed is terminal; the run task must not resurrect the state
        // after a concurrent close.
        if next == ChannelState::Closed || *state != ChannelState::Closed {
            *state = next;
        }
    }
}

/// Handle to one open push subscription.
pub struct LiveChannel {
    shared: Arc<Shared>,
}

impl LiveChannel {
    /// Open a channel for `poll_id` and deliver events to `on_event`.
    /// Connecting starts immediately on a background task.
    pub fn open<F>(ws_url: &str, config: ChannelConfig, poll_id: PollId, on_event: F) -> LiveChannel
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(ChannelState::Connecting),
            closed: Notify::new(),
            closed_flag: AtomicBool::new(false),
        });
        tokio::spawn(run(
            shared.clone(),
            ws_url.to_string(),
            config,
            poll_id,
            Arc::new(on_event) as EventFn,
        ));
        LiveChannel { shared }
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.lock()
    }

    /// Tear the transport down without an unsubscribe message. Safe to call
    /// any number of times; no event is delivered afterwards.
    pub fn close(&self) {
        if !self.shared.closed_flag.swap(true, Ordering::SeqCst) {
            self.shared.closed.notify_one();
        }
        self.shared.set_state(ChannelState::Closed);
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run(
    shared: Arc<Shared>,
    ws_url: String,
    config: ChannelConfig,
    poll_id: PollId,
    on_event: EventFn,
) {
    let handshake = match serde_json::to_string(&ClientMessage::Subscribe {
        poll_id: poll_id.clone(),
    }) {
        Ok(text) => text,
        Err(e) => {
            error!("Could not encode subscribe handshake: {e}");
            shared.set_state(ChannelState::Closed);
            return;
        }
    };

    let mut failures: u32 = 0;
    let mut delay = config.initial_backoff;
    // Highest timestamp delivered in this session; anything older is a
    // stale push and must not regress the displayed tallies.
    let mut last_delivered: Option<i64> = None;

    while !shared.is_closed() {
        match establish(&ws_url, &handshake, &config).await {
            Ok(stream) => {
                shared.set_state(ChannelState::Subscribed);
                info!("Subscribed to live updates for poll {poll_id}");
                failures = 0;
                delay = config.initial_backoff;
                read_until_disconnect(stream, &shared, &poll_id, &mut last_delivered, &on_event)
                    .await;
                if shared.is_closed() {
                    break;
                }
                warn!("Live connection lost for poll {poll_id}");
            }
            Err(reason) => {
                debug!("Connect attempt for poll {poll_id} failed: {reason}");
            }
        }
        if shared.is_closed() {
            break;
        }

        failures += 1;
        if failures >= config.max_attempts {
            warn!("Giving up on poll {poll_id} after {failures} failed attempts");
            if !shared.is_closed() {
                on_event(ChannelEvent::Degraded);
            }
            break;
        }
        shared.set_state(ChannelState::Reconnecting);
        tokio::select! {
            _ = shared.closed.notified() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(config.max_backoff);
    }

    shared.set_state(ChannelState::Closed);
}

/// Connect within the configured bound and send the subscribe handshake.
async fn establish(
    ws_url: &str,
    handshake: &str,
    config: &ChannelConfig,
) -> Result<WsStream, String> {
    let (mut stream, _response) = match timeout(config.connect_timeout, connect_async(ws_url)).await
    {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(_) => return Err("connect timed out".to_string()),
    };
    stream
        .send(Message::Text(handshake.to_string()))
        .await
        .map_err(|e| e.to_string())?;
    Ok(stream)
}

async fn read_until_disconnect(
    mut stream: WsStream,
    shared: &Arc<Shared>,
    poll_id: &str,
    last_delivered: &mut Option<i64>,
    on_event: &EventFn,
) {
    loop {
        tokio::select! {
            _ = shared.closed.notified() => {
                let _ = stream.close(None).await;
                return;
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&text, shared, poll_id, last_delivered, on_event);
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Transport error on poll {poll_id} channel: {e}");
                        return;
                    }
                }
            }
        }
    }
}

fn handle_frame(
    text: &str,
    shared: &Arc<Shared>,
    poll_id: &str,
    last_delivered: &mut Option<i64>,
    on_event: &EventFn,
) {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring unparseable frame: {e}");
            return;
        }
    };
    match message {
        ServerMessage::VoteUpdate { poll_id: target, result } => {
            if target != poll_id {
                debug!("Ignoring update addressed to poll {target}");
                return;
            }
            if let Some(previous) = *last_delivered {
                if result.timestamp < previous {
                    warn!(
                        "Rejecting stale update for poll {poll_id} ({} < {previous})",
                        result.timestamp
                    );
                    return;
                }
            }
            *last_delivered = Some(result.timestamp);
            if shared.is_closed() {
                return;
            }
            shared.set_state(ChannelState::Receiving);
            on_event(ChannelEvent::Update(result));
        }
        ServerMessage::Unknown => {
            debug!("Ignoring message of unrecognized type");
        }
    }
}
