//! Shared axum state: one `TurnEngine`, the registry it reads from, and
//! enough bookkeeping about how each game was loaded for `/reload` to
//! re-read the same file.

use crate::loader::LoadedGame;
use lgdl_engine::{GameRegistry, TurnEngine};
use std::collections::HashMap;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<TurnEngine>,
    pub registry: Arc<GameRegistry>,
    pub dev_mode: bool,
    /// Game the legacy `POST /move` route falls back to.
    pub default_game_id: Option<String>,
    pub loaded: HashMap<String, LoadedGame>,
}
