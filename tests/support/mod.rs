//! In-process mock of the voting backend: the REST endpoints the client
//! pulls from and the WebSocket endpoint it subscribes to.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use pollsync::{
    ChannelConfig, ClientConfig, OptionTally, Poll, ResultSnapshot, Vote, VoteRequest,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Two-option poll used by most tests.
pub fn poll_fixture(id: &str) -> Poll {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": "Pineapple on pizza?",
        "description": "Settle it",
        "createdAt": "2025-06-01T10:00:00Z",
        "expiresAt": "2030-01-01T00:00:00Z",
        "active": true,
        "options": [
            { "id": "o1", "text": "Yes", "voteCount": 0 },
            { "id": "o2", "text": "No", "voteCount": 0 }
        ],
        "multipleChoiceAllowed": false,
        "anonymousVotingAllowed": true
    }))
    .unwrap()
}

/// Build a consistent snapshot for `poll` with the given per-option counts.
pub fn snapshot_with(poll: &Poll, counts: &[(&str, u64)], timestamp: i64) -> ResultSnapshot {
    let count_of = |id: &str| {
        counts
            .iter()
            .find(|(option, _)| *option == id)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    let total: u64 = poll.options.iter().map(|o| count_of(&o.id)).sum();
    ResultSnapshot {
        poll_id: poll.id.clone(),
        poll_title: poll.title.clone(),
        total_votes: total,
        options: poll
            .options
            .iter()
            .map(|option| {
                let votes = count_of(&option.id);
                OptionTally {
                    option_id: option.id.clone(),
                    option_text: option.text.clone(),
                    vote_count: votes,
                    percentage: if total > 0 {
                        votes as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect(),
        timestamp,
    }
}

/// Mint an HS256 token whose `exp` lies `offset_secs` from now.
pub fn mint_token(offset_secs: i64) -> String {
    let claims = serde_json::json!({
        "sub": "u1",
        "exp": Utc::now().timestamp() + offset_secs,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"mock-secret"),
    )
    .unwrap()
}

pub struct MockState {
    pub poll: Poll,
    tallies: Mutex<HashMap<String, u64>>,
    pub results_failing: AtomicBool,
    pub votes_failing: AtomicBool,
    /// Raw text frames received from clients, in arrival order.
    pub subscribes: Mutex<Vec<String>>,
    /// Authorization header seen on the most recent vote submission.
    pub last_authorization: Mutex<Option<String>>,
    push_tx: broadcast::Sender<String>,
    kill_tx: broadcast::Sender<()>,
}

impl MockState {
    fn new(poll: Poll) -> Self {
        let (push_tx, _) = broadcast::channel(64);
        let (kill_tx, _) = broadcast::channel(8);
        MockState {
            poll,
            tallies: Mutex::new(HashMap::new()),
            results_failing: AtomicBool::new(false),
            votes_failing: AtomicBool::new(false),
            subscribes: Mutex::new(Vec::new()),
            last_authorization: Mutex::new(None),
            push_tx,
            kill_tx,
        }
    }

    /// Current authoritative snapshot computed from recorded votes.
    pub fn snapshot(&self) -> ResultSnapshot {
        let tallies = self.tallies.lock();
        let counts: Vec<(&str, u64)> = self
            .poll
            .options
            .iter()
            .map(|o| (o.id.as_str(), tallies.get(&o.id).copied().unwrap_or(0)))
            .collect();
        snapshot_with(&self.poll, &counts, Utc::now().timestamp_millis())
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().len()
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> MockBackend {
        Self::start_with_poll(poll_fixture("p1")).await
    }

    pub async fn start_with_poll(poll: Poll) -> MockBackend {
        init_tracing();
        let state = Arc::new(MockState::new(poll));
        let app = Router::new()
            .route("/api/polls", get(list_polls))
            .route("/api/polls/:id", get(get_poll))
            .route("/api/polls/:id/results", get(get_results))
            .route("/api/votes", post(post_vote))
            .route("/api/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockBackend { addr, state }
    }

    /// Client config pointed at this backend, with reconnect timing tuned
    /// for fast tests.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.api_base = format!("http://{}/api", self.addr);
        config.ws_url = format!("ws://{}/api/ws", self.addr);
        config.request_timeout = Duration::from_secs(5);
        config.channel = ChannelConfig {
            connect_timeout: Duration::from_secs(2),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(400),
            max_attempts: 5,
        };
        config
    }

    /// Push a vote update frame to every connected client.
    pub fn push_update(&self, snapshot: &ResultSnapshot) {
        let frame = serde_json::json!({
            "type": "VOTE_UPDATE",
            "pollId": snapshot.poll_id,
            "result": snapshot,
        })
        .to_string();
        let _ = self.state.push_tx.send(frame);
    }

    pub fn push_raw(&self, frame: &str) {
        let _ = self.state.push_tx.send(frame.to_string());
    }

    /// Drop every open WebSocket connection, as a crashed or restarted
    /// backend would.
    pub fn kill_connections(&self) {
        let _ = self.state.kill_tx.send(());
    }

    /// Wait until `count` subscribe handshakes have been observed in total.
    pub async fn wait_for_subscribes(&self, count: usize) {
        let state = self.state.clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                if state.subscribe_count() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} subscribe handshakes"));
    }
}

async fn list_polls(State(state): State<Arc<MockState>>) -> Response {
    Json(vec![state.poll.clone()]).into_response()
}

async fn get_poll(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if id == state.poll.id {
        Json(state.poll.clone()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_results(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if state.results_failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if id != state.poll.id {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(state.snapshot()).into_response()
}

async fn post_vote(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> Response {
    if state.votes_failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    *state.last_authorization.lock() = authorization.clone();
    if !request.anonymous && authorization.is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    *state.tallies.lock().entry(request.option_id.clone()).or_insert(0) += 1;
    let vote = Vote {
        id: Uuid::new_v4().to_string(),
        poll_id: request.poll_id,
        option_id: request.option_id,
        user_id: if request.anonymous { None } else { Some("u1".to_string()) },
        timestamp: Utc::now(),
        anonymous: request.anonymous,
    };
    Json(vote).into_response()
}

async fn ws_handler(State(state): State<Arc<MockState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<MockState>) {
    let mut frames = state.push_tx.subscribe();
    let mut kill = state.kill_tx.subscribe();
    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    state.subscribes.lock().push(text);
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Err(_) => return,
            },
            _ = kill.recv() => return,
        }
    }
}
