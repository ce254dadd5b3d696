//! YAML fixture loader.
//!
//! Production `.lgdl` source is parsed by an external grammar that is out
//! of scope here. Tests, the CLI, and example games instead author games
//! directly as YAML documents that deserialize into [`GameAst`], the same
//! way workflow and template definitions are authored as YAML elsewhere
//! in this stack (`ob-workflow::definition`, `ob-templates::definition`).

use crate::ast::GameAst;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read game fixture {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse game fixture {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load a [`GameAst`] from a YAML file on disk.
pub fn load_game(path: impl AsRef<std::path::Path>) -> Result<GameAst, FixtureError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_game(&text).map_err(|source| FixtureError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a [`GameAst`] from an in-memory YAML document.
pub fn parse_game(text: &str) -> Result<GameAst, serde_yaml::Error> {
    serde_yaml::from_str(text)
}
