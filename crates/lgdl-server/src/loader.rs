//! Discovers game YAML files under a directory, compiles each one, and
//! registers it with a capability contract co-located as
//! `<stem>.contract.json` (§6.3). Also used by `validate`/`compile` and by
//! the dev-mode `/reload` route, which re-reads the same path from disk.

use lgdl_capability::{CapabilityContract, CapabilityDispatcher, MockDispatcher};
use lgdl_engine::GameRegistry;
use lgdl_ir::{compile_game, Game};
use lgdl_metrics::EngineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Fixture(#[from] lgdl_ast::FixtureError),
    #[error(transparent)]
    Contract(#[from] lgdl_capability::ContractError),
    #[error("{0}")]
    Compile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Vec<EngineError>> for ServerError {
    fn from(errors: Vec<EngineError>) -> Self {
        let joined = errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        ServerError::Compile(joined)
    }
}

/// A game's source path plus the contract path it was loaded with (if
/// any), kept around so `/reload` can re-read both from disk.
#[derive(Clone)]
pub struct LoadedGame {
    pub game_path: PathBuf,
    pub contract_path: Option<PathBuf>,
}

pub fn contract_path_for(game_path: &Path) -> PathBuf {
    game_path.with_extension("contract.json")
}

fn is_game_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
        && !path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.ends_with(".contract"))
            .unwrap_or(false)
}

pub fn discover_game_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_game_file(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

pub fn compile_game_file(game_path: &Path) -> Result<(Game, CapabilityContract), ServerError> {
    let ast = lgdl_ast::load_game(game_path)?;
    let game = compile_game(&ast)?;
    let contract_path = contract_path_for(game_path);
    let contract = if contract_path.exists() {
        CapabilityContract::load(&contract_path)?
    } else {
        CapabilityContract {
            services: HashMap::new(),
        }
    };
    Ok((game, contract))
}

/// Compiles and registers every game file found directly under `dir`
/// (non-recursive - one game per file, sibling contract alongside it).
pub fn load_games_dir(registry: &GameRegistry, dir: &Path) -> Result<HashMap<String, LoadedGame>, ServerError> {
    let mut loaded = HashMap::new();
    for game_path in discover_game_files(dir)? {
        let (game, contract) = compile_game_file(&game_path)?;
        let game_id = game.id.clone();
        let dispatcher: Arc<dyn CapabilityDispatcher> = Arc::new(MockDispatcher::new(contract.clone()));
        registry.register(game, contract, dispatcher);

        let contract_path = contract_path_for(&game_path);
        loaded.insert(
            game_id,
            LoadedGame {
                game_path,
                contract_path: contract_path.exists().then_some(contract_path),
            },
        );
    }
    Ok(loaded)
}
