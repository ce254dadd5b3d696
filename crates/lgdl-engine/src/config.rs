//! Runtime configuration, read from environment variables with documented
//! defaults - the same `env::var(...).unwrap_or_else(...)` idiom used for
//! `DATABASE_URL`/`SERVER_PORT` elsewhere in this stack, just collected
//! into one struct instead of scattered across call sites.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub negotiation_max_rounds: usize,
    pub negotiation_stagnation_epsilon: f32,
    pub llm_budget_per_turn: f32,
    pub embedding_cache_enabled: bool,
    pub state_backend: StateBackend,
    pub dev_mode: bool,
    pub learning_enabled: bool,
    /// Max in-flight turns per game before admission control starts
    /// rejecting with E204.
    pub admission_cap_per_game: usize,
    /// Below this token count, a reply while `awaiting_response` is true
    /// gets `last_question` concatenated on for matching purposes (§6.4).
    pub enrichment_token_threshold: usize,
    pub turn_deadline: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Memory,
    Postgres,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            negotiation_max_rounds: 3,
            negotiation_stagnation_epsilon: 0.05,
            llm_budget_per_turn: lgdl_match::DEFAULT_LLM_BUDGET_PER_TURN,
            embedding_cache_enabled: true,
            state_backend: StateBackend::Memory,
            dev_mode: false,
            learning_enabled: true,
            admission_cap_per_game: 64,
            enrichment_token_threshold: 6,
            turn_deadline: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            negotiation_max_rounds: env_parse("LGDL_NEGOTIATION_MAX_ROUNDS", defaults.negotiation_max_rounds),
            negotiation_stagnation_epsilon: env_parse(
                "LGDL_NEGOTIATION_STAGNATION_EPSILON",
                defaults.negotiation_stagnation_epsilon,
            ),
            llm_budget_per_turn: env_parse("LGDL_LLM_BUDGET_PER_TURN", defaults.llm_budget_per_turn),
            embedding_cache_enabled: env_parse("LGDL_EMBEDDING_CACHE_ENABLED", defaults.embedding_cache_enabled),
            state_backend: match env::var("LGDL_STATE_BACKEND").as_deref() {
                Ok("postgres") => StateBackend::Postgres,
                _ => StateBackend::Memory,
            },
            dev_mode: env_parse("LGDL_DEV_MODE", defaults.dev_mode),
            learning_enabled: env_parse("LGDL_LEARNING_ENABLED", defaults.learning_enabled),
            admission_cap_per_game: env_parse("LGDL_ADMISSION_CAP_PER_GAME", defaults.admission_cap_per_game),
            enrichment_token_threshold: env_parse(
                "LGDL_ENRICHMENT_TOKEN_THRESHOLD",
                defaults.enrichment_token_threshold,
            ),
            turn_deadline: Duration::from_secs(env_parse("LGDL_TURN_DEADLINE_SECS", defaults.turn_deadline.as_secs())),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.negotiation_max_rounds, 3);
        assert_eq!(cfg.state_backend, StateBackend::Memory);
        assert!(!cfg.dev_mode);
    }
}
