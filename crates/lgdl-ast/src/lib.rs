//! Typed AST contract for LGDL game definitions.
//!
//! Grammar lexing/parsing of the source `.lgdl` text is an external
//! collaborator out of scope here: this crate only defines the
//! well-typed tree a parser must hand to the IR compiler (`lgdl-ir`),
//! plus a YAML fixture loader used by tests, the CLI, and example games,
//! following a YAML-first config idiom (`ob-templates::definition`,
//! `ob-workflow::definition`).

mod ast;
mod fixture;

pub use ast::*;
pub use fixture::{load_game, parse_game, FixtureError};
