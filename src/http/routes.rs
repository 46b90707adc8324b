//! HTTP route definitions

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::game::map::Map;
use crate::game::{GameError, MapId, MoveIntent, SessionSnapshot};
use crate::http::middleware::{require_token, AuthenticatedPlayer};
use crate::store::records::MAX_PAGE_SIZE;
use crate::util::time::{tick_delta, uptime_secs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let cors = match &state.config.client_origin {
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => CorsLayer::permissive(),
    };

    // Public routes (no token required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/maps", get(maps_handler))
        .route("/api/v1/maps/:id", get(map_handler))
        .route("/api/v1/game/join", post(join_handler))
        .route("/api/v1/game/tick", post(tick_handler))
        .route("/api/v1/game/records", get(records_handler));

    // Player routes (token required)
    let player_routes = Router::new()
        .route("/api/v1/game/players", get(players_handler))
        .route("/api/v1/game/state", get(state_handler))
        .route("/api/v1/game/player/action", post(action_handler))
        .route("/api/v1/game/leave", post(leave_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(public_routes)
        .merge(player_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.game.session_count(),
        active_players: state.game.player_count(),
    })
}

// ============================================================================
// Map endpoints
// ============================================================================

#[derive(Serialize)]
struct MapSummary {
    id: String,
    name: String,
}

async fn maps_handler(State(state): State<AppState>) -> Json<Vec<MapSummary>> {
    let maps = state
        .game
        .maps()
        .iter()
        .map(|m| MapSummary {
            id: m.id().to_string(),
            name: m.name().to_string(),
        })
        .collect();
    Json(maps)
}

async fn map_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let map = state
        .game
        .find_map(&MapId::new(id))
        .ok_or(AppError::MapNotFound)?;
    Ok(Json(map_json(map)))
}

/// Map as the client renders it, in the same shape as the game config file
fn map_json(map: &Map) -> Value {
    let roads: Vec<Value> = map
        .roads()
        .iter()
        .map(|r| {
            let (start, end) = (r.start(), r.end());
            if r.is_horizontal() {
                json!({ "x0": start.x, "y0": start.y, "x1": end.x })
            } else {
                json!({ "x0": start.x, "y0": start.y, "y1": end.y })
            }
        })
        .collect();

    let offices: Vec<Value> = map
        .offices()
        .iter()
        .map(|o| {
            json!({
                "id": o.id,
                "x": o.position.x,
                "y": o.position.y,
                "offsetX": o.offset.0,
                "offsetY": o.offset.1,
            })
        })
        .collect();

    let loot_types: Vec<Value> = map
        .loot_types()
        .iter()
        .map(|t| {
            let mut obj = t.extra.clone();
            obj.insert("name".to_string(), json!(t.name));
            obj.insert("value".to_string(), json!(t.value));
            Value::Object(obj)
        })
        .collect();

    json!({
        "id": map.id(),
        "name": map.name(),
        "speed": map.speed(),
        "bagCapacity": map.bag_capacity(),
        "roads": roads,
        "buildings": map.buildings(),
        "offices": offices,
        "lootTypes": loot_types,
    })
}

// ============================================================================
// Game endpoints
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    user_name: String,
    map_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinResponse {
    auth_token: String,
    player_id: u32,
}

async fn join_handler(
    State(state): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, AppError> {
    let Json(req) = payload?;
    let name = req.user_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Invalid name".to_string()));
    }
    if !state.join_limiter.check() {
        warn!(map_id = %req.map_id, "Join rate limit hit");
        return Err(AppError::TooManyRequests);
    }

    let joined = state.game.join(&MapId::new(req.map_id), name.to_string())?;

    Ok(Json(JoinResponse {
        auth_token: joined.token.to_string(),
        player_id: joined.player_id.0,
    }))
}

#[derive(Serialize)]
struct PlayerName {
    name: String,
}

async fn players_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<BTreeMap<String, PlayerName>>, AppError> {
    let (_, snapshot) = state.game.player_view(auth.token.as_str())?;
    let players = snapshot
        .players
        .into_iter()
        .map(|p| (p.id.to_string(), PlayerName { name: p.name }))
        .collect();
    Ok(Json(players))
}

async fn state_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<Value>, AppError> {
    let (_, snapshot) = state.game.player_view(auth.token.as_str())?;
    Ok(Json(state_json(&snapshot)))
}

/// Session state as seen by its players
fn state_json(snapshot: &SessionSnapshot) -> Value {
    let players: serde_json::Map<String, Value> = snapshot
        .players
        .iter()
        .map(|p| {
            let bag: Vec<Value> = p
                .bag
                .iter()
                .map(|l| json!({ "id": l.id, "type": l.type_index }))
                .collect();
            let view = json!({
                "pos": [p.position.x, p.position.y],
                "speed": [p.velocity.x, p.velocity.y],
                "dir": p.direction,
                "bag": bag,
                "score": p.score,
            });
            (p.id.to_string(), view)
        })
        .collect();

    let loot: serde_json::Map<String, Value> = snapshot
        .loot
        .iter()
        .map(|l| {
            let view = json!({ "type": l.type_index, "pos": [l.position.x, l.position.y] });
            (l.id.to_string(), view)
        })
        .collect();

    json!({ "players": players, "lostObjects": loot })
}

#[derive(Deserialize)]
struct ActionRequest {
    #[serde(rename = "move")]
    movement: String,
}

async fn action_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let intent: MoveIntent = req
        .movement
        .parse()
        .map_err(|_| AppError::BadRequest("Failed to parse action".to_string()))?;
    state.game.set_move_intent(auth.token.as_str(), intent)?;
    Ok(Json(json!({})))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    name: String,
    score: u64,
    /// Seconds
    play_time: f64,
}

async fn leave_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<RecordView>, AppError> {
    let record = state.leave(auth.token.as_str())?;
    Ok(Json(RecordView {
        name: record.name,
        score: record.score,
        play_time: record.play_time_ms as f64 / 1000.0,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickRequest {
    /// Milliseconds
    time_delta: u64,
}

async fn tick_handler(
    State(state): State<AppState>,
    payload: Result<Json<TickRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    if !state.manual_ticks() {
        return Err(AppError::BadRequest("Invalid endpoint".to_string()));
    }
    let Json(req) = payload?;
    let elapsed = tick_delta(req.time_delta)
        .ok_or_else(|| AppError::BadRequest("timeDelta must be positive".to_string()))?;

    state.tick(elapsed);
    Ok(Json(json!({})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsQuery {
    #[serde(default)]
    start: usize,
    max_items: Option<usize>,
}

async fn records_handler(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<Vec<RecordView>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let max_items = query.max_items.unwrap_or(MAX_PAGE_SIZE);
    if max_items > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!("maxItems must not exceed {MAX_PAGE_SIZE}")));
    }

    let records = state
        .records
        .top(query.start, max_items)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(
        records
            .into_iter()
            .map(|r| RecordView {
                name: r.name,
                score: r.score,
                play_time: r.play_time_ms as f64 / 1000.0,
            })
            .collect(),
    ))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Map not found")]
    MapNotFound,

    #[error("Authorization header is missing or malformed")]
    InvalidToken,

    #[error("Player token has not been found")]
    UnknownToken,

    #[error("Too many join requests")]
    TooManyRequests,

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "invalidArgument",
            AppError::MapNotFound => "mapNotFound",
            AppError::InvalidToken => "invalidToken",
            AppError::UnknownToken => "unknownToken",
            AppError::TooManyRequests => "tooManyRequests",
            AppError::Unavailable(_) => "unavailable",
            AppError::Internal(_) => "internalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MapNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidToken | AppError::UnknownToken => StatusCode::UNAUTHORIZED,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::MapNotFound(_) => AppError::MapNotFound,
            GameError::UnknownToken | GameError::SessionNotFound(_) => AppError::UnknownToken,
            GameError::NoSessionCapacity(_) => AppError::Unavailable(err.to_string()),
            GameError::Session(e) => {
                error!(error = %e, "Game request failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        (self.status(), Json(body)).into_response()
    }
}
