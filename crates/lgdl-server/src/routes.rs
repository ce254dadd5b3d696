//! The move-execution HTTP surface (§6.2): one route per game for running
//! a turn, registry introspection, a dev-mode-only reload, and a legacy
//! unversioned route kept around with a deprecation header.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lgdl_engine::TurnResult;
use lgdl_metrics::EngineError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/games/:game_id/move", post(handle_move))
        .route("/games/:game_id/reload", post(reload_game))
        .route("/games/:game_id", get(get_game))
        .route("/games", get(list_games))
        .route("/move", post(handle_legacy_move))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub input: String,
    #[serde(default)]
    pub context: Option<Value>,
}

async fn handle_move(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<TurnResult>, ApiError> {
    let result = state
        .engine
        .handle_turn(&game_id, req.conversation_id, &req.user_id, &req.input, req.context)
        .await?;
    Ok(Json(result))
}

/// Pre-multi-game API: routes to whichever game was configured as the
/// default and marks the response deprecated rather than removing it
/// outright.
async fn handle_legacy_move(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MoveRequest>,
) -> Result<Response, ApiError> {
    let Some(default_game_id) = state.default_game_id.clone() else {
        return Err(ApiError(EngineError::new(
            "E203",
            "no default game configured for the legacy /move route",
        )));
    };
    let result = state
        .engine
        .handle_turn(&default_game_id, req.conversation_id, &req.user_id, &req.input, req.context)
        .await?;
    let mut response = Json(result).into_response();
    response.headers_mut().insert("Deprecation", HeaderValue::from_static("true"));
    Ok(response)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    let games = state.registry.list();
    Json(json!({
        "status": "ok",
        "games_loaded": games.len(),
        "games": games.into_iter().map(|(id, _)| id).collect::<Vec<_>>(),
    }))
}

async fn list_games(State(state): State<Arc<AppState>>) -> Json<Value> {
    let games = state.registry.list();
    Json(json!({
        "games": games
            .into_iter()
            .map(|(id, hash)| json!({"id": id, "source_hash": hash}))
            .collect::<Vec<_>>(),
    }))
}

async fn get_game(State(state): State<Arc<AppState>>, Path(game_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let entry = state
        .registry
        .get(&game_id)
        .ok_or_else(|| EngineError::new("E203", format!("unknown game '{game_id}'")))?;
    Ok(Json(json!({
        "id": entry.game.id,
        "name": entry.game.name,
        "version": entry.game.version,
        "move_count": entry.game.moves.len(),
        "source_hash": entry.file_hash,
    })))
}

/// Development mode only: recompiles the game's source file and contract
/// from disk and swaps the registry entry atomically.
async fn reload_game(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.dev_mode {
        return Err(ApiError(EngineError::new(
            "E203",
            "reload is only available with dev mode enabled",
        )));
    }
    let loaded = state
        .loaded
        .get(&game_id)
        .ok_or_else(|| EngineError::new("E203", format!("unknown game '{game_id}'")))?;

    let (game, contract) = crate::loader::compile_game_file(&loaded.game_path).map_err(|e| {
        EngineError::new("E207", e.to_string()).with_location(format!("reload.{game_id}"))
    })?;
    let dispatcher: Arc<dyn lgdl_capability::CapabilityDispatcher> =
        Arc::new(lgdl_capability::MockDispatcher::new(contract.clone()));
    let entry = state.registry.reload(game, contract, dispatcher)?;
    Ok(Json(json!({"id": entry.game.id, "source_hash": entry.file_hash})))
}
