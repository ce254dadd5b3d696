//! Library surface for `lgdl-server`, split out from the `lgdl` binary so
//! its router and app state can be built directly in integration tests
//! (`tests/`) instead of only through the CLI's `serve` subcommand.

pub mod error;
pub mod loader;
pub mod routes;
pub mod state;
