use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use escape_nine::beat_clock::{MonotonicTime, TimeSource};
use escape_nine::collaborators::{Collaborators, ProfileStore, ScoreSink, SilentAudio};
use escape_nine::config::ServerConfig;
use escape_nine::constants::BEAT_POLL_INTERVAL;
use escape_nine::engine::{TurnEngine, TurnEngineOptions};
use escape_nine::profile_store::ProfileBook;
use escape_nine::ranking_store::RankingStore;
use escape_nine::server_protocol::{parse_client_message, ParsedClientMessage};
use escape_nine::server_utils::{
    character_options, normalize_ai_choice, parse_ranking_limit, resolve_character, sanitize_name,
    seed_from_token,
};
use escape_nine::types::CharacterType;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;
type SharedStores = Arc<Mutex<Stores>>;

#[derive(Clone)]
struct AppState {
    game: SharedState,
    stores: SharedStores,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    name: Option<String>,
    engine: Option<TurnEngine>,
    reported_game_over: bool,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    time: Arc<dyn TimeSource>,
    persist_tx: mpsc::UnboundedSender<PersistRequest>,
}

impl ServerState {
    fn new(persist_tx: mpsc::UnboundedSender<PersistRequest>) -> Self {
        Self {
            clients: HashMap::new(),
            time: Arc::new(MonotonicTime::new()),
            persist_tx,
        }
    }
}

struct Stores {
    ranking: RankingStore,
    profiles: ProfileBook,
}

/// Writes that must stay off the beat loop.
#[derive(Debug)]
enum PersistRequest {
    Score {
        name: String,
        floor: u32,
        character: CharacterType,
    },
    BestFloor {
        name: String,
        floor: u32,
    },
    SelectCharacter {
        name: String,
        character: CharacterType,
    },
}

/// Hands a write to the persistence task. Returns false when the task is gone.
fn queue_persist(tx: &mpsc::UnboundedSender<PersistRequest>, request: PersistRequest) -> bool {
    match tx.send(request) {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(request = ?error.0, "persistence task gone, write dropped");
            false
        }
    }
}

struct ChannelScoreSink {
    name: String,
    character: CharacterType,
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl ScoreSink for ChannelScoreSink {
    fn submit(&mut self, floor: u32) {
        let request = PersistRequest::Score {
            name: self.name.clone(),
            floor,
            character: self.character,
        };
        queue_persist(&self.tx, request);
    }
}

/// Profile view for one connection: best floor cached in memory, updates
/// forwarded to the persistence task.
struct ChannelProfile {
    name: String,
    best_floor: u32,
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl ProfileStore for ChannelProfile {
    fn best_floor(&self) -> u32 {
        self.best_floor
    }

    fn record_floor(&mut self, floor: u32) {
        self.best_floor = self.best_floor.max(floor);
        let request = PersistRequest::BestFloor {
            name: self.name.clone(),
            floor,
        };
        queue_persist(&self.tx, request);
    }
}

#[derive(Debug, Deserialize)]
struct RankingQuery {
    limit: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    let stores = Arc::new(Mutex::new(Stores {
        ranking: RankingStore::new(config.ranking_path.clone()),
        profiles: ProfileBook::new(config.profile_path.clone()),
    }));
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    start_persistence_task(stores.clone(), persist_rx);

    let state = Arc::new(Mutex::new(ServerState::new(persist_tx)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/ranking", get(ranking_handler))
        .route("/ws", get(ws_handler))
        .with_state(AppState {
            game: state,
            stores,
        });

    let app = match config.static_dir.as_ref() {
        Some(static_dir) if static_dir.join("index.html").is_file() => {
            tracing::info!(root = %static_dir.display(), "serving static files");
            let index_file = static_dir.join("index.html");
            app.fallback_service(
                ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
            )
        }
        Some(static_dir) => {
            tracing::warn!(root = %static_dir.display(), "STATIC_DIR has no index.html, ignoring");
            app
        }
        None => app,
    };

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app)
        .await
        .context("server runtime failed")?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ranking_handler(
    State(app): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> impl IntoResponse {
    let guard = app.stores.lock().await;
    Json(
        guard
            .ranking
            .build_response(parse_ranking_limit(query.limit.as_deref())),
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app, socket))
}

async fn handle_socket(app: AppState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = app.game.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                name: None,
                engine: None,
                reported_game_over: false,
            },
        );
    }
    tracing::info!(client = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&app, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&app, &client_id, text).await,
                Err(_) => send_error_to_client(&app.game, &client_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = app.game.lock().await;
        disconnect_client_internal(&mut guard, &client_id);
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(app: &AppState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error_to_client(&app.game, client_id, "invalid message").await;
        return;
    };

    if let ParsedClientMessage::Hello { name, character } = message {
        handle_hello(app, client_id, name, character).await;
        return;
    }

    let mut guard = app.game.lock().await;
    let greeted = guard
        .clients
        .get(client_id)
        .is_some_and(|client| client.engine.is_some());
    if !greeted {
        send_to_client(
            &mut guard,
            client_id,
            &json!({ "type": "error", "message": "send hello first" }),
            QueuePolicy::DisconnectOnFull,
        );
        return;
    }
    if let Some(client) = guard.clients.get_mut(client_id) {
        apply_client_command(client, message);
    }
    flush_client(&mut guard, client_id);
}

/// Routes one gameplay command to the client's engine. Starting or resetting
/// opens a new run, which gets its own game over report.
fn apply_client_command(client: &mut ClientContext, message: ParsedClientMessage) {
    let Some(engine) = client.engine.as_mut() else {
        return;
    };
    match message {
        ParsedClientMessage::Hello { .. } => {}
        ParsedClientMessage::Start { ai } => {
            engine.start_game(normalize_ai_choice(ai));
            client.reported_game_over = false;
        }
        ParsedClientMessage::Select { pos } => {
            engine.select_move(pos);
        }
        ParsedClientMessage::Skill => {
            engine.activate_skill();
        }
        ParsedClientMessage::Bind => {
            engine.bind_enemy();
        }
        ParsedClientMessage::Pause => engine.pause_game(),
        ParsedClientMessage::Resume => engine.resume_game(),
        ParsedClientMessage::NextFloor => {
            engine.next_floor();
        }
        ParsedClientMessage::Reset => {
            engine.reset_game();
            client.reported_game_over = false;
        }
    }
}

async fn handle_hello(
    app: &AppState,
    client_id: &str,
    requested_name: String,
    requested_character: Option<CharacterType>,
) {
    let name = sanitize_name(&requested_name);
    let profile = {
        let stores = app.stores.lock().await;
        stores.profiles.profile(&name)
    };
    let character = resolve_character(requested_character, &profile);

    let mut guard = app.game.lock().await;
    if requested_character == Some(character) && character != profile.selected_character {
        let request = PersistRequest::SelectCharacter {
            name: name.clone(),
            character,
        };
        queue_persist(&guard.persist_tx, request);
    }

    let collaborators = Collaborators {
        audio: Box::new(SilentAudio),
        score_sink: Box::new(ChannelScoreSink {
            name: name.clone(),
            character,
            tx: guard.persist_tx.clone(),
        }),
        profile: Box::new(ChannelProfile {
            name: name.clone(),
            best_floor: profile.best_floor,
            tx: guard.persist_tx.clone(),
        }),
    };
    let engine = TurnEngine::new(
        character,
        seed_from_token(rand::random::<u64>()),
        guard.time.clone(),
        TurnEngineOptions::default(),
    )
    .with_collaborators(collaborators);

    let Some(client) = guard.clients.get_mut(client_id) else {
        return;
    };
    client.name = Some(name.clone());
    client.engine = Some(engine);
    client.reported_game_over = false;
    tracing::info!(client = %client_id, %name, character = character.key(), "hello");

    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "welcome",
            "clientId": client_id,
            "name": name,
            "character": character,
            "bestFloor": profile.best_floor,
            "unlockedCharacters": profile.unlocked_characters,
            "characters": character_options(&profile),
        }),
        QueuePolicy::DisconnectOnFull,
    );
    flush_client(&mut guard, client_id);
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let floor = context
        .engine
        .as_ref()
        .map(|engine| engine.session().current_floor);
    tracing::info!(client = %client_id, name = ?context.name, ?floor, "client disconnected");
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(BEAT_POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_engines(&mut guard);
        }
    });
}

fn tick_engines(state: &mut ServerState) {
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    for client_id in client_ids {
        let resolved = state
            .clients
            .get_mut(&client_id)
            .and_then(|client| client.engine.as_mut())
            .and_then(|engine| engine.poll())
            .is_some();
        if resolved {
            flush_client(state, &client_id);
        }
    }
}

/// Sends the latest snapshot, plus the summary once per finished run.
fn flush_client(state: &mut ServerState, client_id: &str) {
    let Some(client) = state.clients.get_mut(client_id) else {
        return;
    };
    let Some(engine) = client.engine.as_mut() else {
        return;
    };
    let snapshot = engine.build_snapshot(true);
    let summary = (engine.status().is_terminal() && !client.reported_game_over)
        .then(|| engine.build_summary());
    if summary.is_some() {
        client.reported_game_over = true;
    }

    send_to_client(
        state,
        client_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );
    if let Some(summary) = summary {
        send_to_client(
            state,
            client_id,
            &json!({
                "type": "game_over",
                "summary": summary,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
}

fn start_persistence_task(stores: SharedStores, mut rx: mpsc::UnboundedReceiver<PersistRequest>) {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let mut guard = stores.lock().await;
            match request {
                PersistRequest::Score {
                    name,
                    floor,
                    character,
                } => {
                    guard.ranking.record_run(&name, floor, Some(character));
                    tracing::info!(%name, floor, "score recorded");
                }
                PersistRequest::BestFloor { name, floor } => {
                    guard.profiles.record_floor(&name, floor);
                }
                PersistRequest::SelectCharacter { name, character } => {
                    guard.profiles.select_character(&name, character);
                }
            }
        }
    });
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = match state.clients.get(client_id) {
        Some(client) => client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err(),
        None => false,
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        if let Some(client) = state.clients.get(client_id) {
            let _ = client.tx.try_send(OutboundMessage::Close {
                code: 1013,
                reason: "outbound queue full".to_string(),
            });
        }
        disconnect_client_internal(state, client_id);
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
