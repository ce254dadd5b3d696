//! The game registry (C10): maps a `game_id` to its compiled IR, capability
//! contract, and a runtime instance - each entry fully self-contained, no
//! mutable state shared across games. `register`/`reload` both go through
//! one atomic swap of an `Arc<GameEntry>` so a turn already running
//! against the old entry finishes on it; nothing is mutated in place.

use lgdl_capability::{CapabilityContract, CapabilityDispatcher, CapabilityInvoker};
use lgdl_ir::Game;
use lgdl_metrics::EngineError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

pub struct GameEntry {
    pub game: Arc<Game>,
    pub file_hash: String,
    pub invoker: Arc<CapabilityInvoker>,
}

pub struct GameRegistry {
    entries: RwLock<HashMap<String, Arc<GameEntry>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, game_id: &str) -> Option<Arc<GameEntry>> {
        self.entries.read().expect("registry lock poisoned").get(game_id).cloned()
    }

    pub fn list(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|e| (e.game.id.clone(), e.file_hash.clone()))
            .collect()
    }

    /// Registers `game` under its own id. A no-op if an entry with the
    /// same id and the same source hash is already registered.
    pub fn register(
        &self,
        game: Game,
        contract: CapabilityContract,
        dispatcher: Arc<dyn CapabilityDispatcher>,
    ) -> Arc<GameEntry> {
        let game_id = game.id.clone();
        let file_hash = game.source_hash.clone();

        {
            let entries = self.entries.read().expect("registry lock poisoned");
            if let Some(existing) = entries.get(&game_id) {
                if existing.file_hash == file_hash {
                    return existing.clone();
                }
            }
        }

        let allowlist: HashSet<String> = game.capability_allowlist.clone();
        let invoker = Arc::new(CapabilityInvoker::new(contract, allowlist, dispatcher));
        let entry = Arc::new(GameEntry {
            game: Arc::new(game),
            file_hash,
            invoker,
        });

        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(game_id, entry.clone());
        entry
    }

    /// Atomically swaps `game_id`'s entry for a newly compiled one if the
    /// source hash changed; in-flight turns continue to hold their own
    /// `Arc<GameEntry>` from before the swap and are unaffected.
    pub fn reload(
        &self,
        game: Game,
        contract: CapabilityContract,
        dispatcher: Arc<dyn CapabilityDispatcher>,
    ) -> Result<Arc<GameEntry>, EngineError> {
        let game_id = game.id.clone();
        if self.get(&game_id).is_none() {
            return Err(EngineError::new(
                "E203",
                format!("cannot reload unknown game '{game_id}'"),
            ));
        }
        Ok(self.register(game, contract, dispatcher))
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ast::parse_game;
    use lgdl_capability::MockDispatcher;
    use lgdl_ir::compile_game;

    const GAME: &str = r#"
id: demo
name: Demo
version: "1"
moves:
  - id: greet
    threshold: medium
    triggers:
      - pattern:
          raw: "hello there"
        modifiers: []
"#;

    fn sample_game() -> Game {
        compile_game(&parse_game(GAME).unwrap()).unwrap()
    }

    fn empty_contract() -> CapabilityContract {
        CapabilityContract {
            services: HashMap::new(),
        }
    }

    #[test]
    fn register_is_idempotent_on_unchanged_source() {
        let registry = GameRegistry::new();
        let dispatcher: Arc<dyn CapabilityDispatcher> = Arc::new(MockDispatcher::new(empty_contract()));
        let a = registry.register(sample_game(), empty_contract(), dispatcher.clone());
        let b = registry.register(sample_game(), empty_contract(), dispatcher);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn reload_of_an_unknown_game_is_rejected() {
        let registry = GameRegistry::new();
        let dispatcher: Arc<dyn CapabilityDispatcher> = Arc::new(MockDispatcher::new(empty_contract()));
        let err = registry.reload(sample_game(), empty_contract(), dispatcher).unwrap_err();
        assert_eq!(err.code, "E203");
    }
}
