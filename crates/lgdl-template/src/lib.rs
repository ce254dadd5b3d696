//! Template engine (C1) - safe `{var[?default]}` and `${arith}` expansion.
//!
//! All generated response text passes through here, so it never trusts
//! slot/context values enough to hand them to a general expression
//! evaluator. The arithmetic grammar is a whitelist AST
//! walker, never a blocklist: anything not explicitly modeled (attribute
//! access, subscript, calls, exponentiation, comprehensions, lambdas)
//! simply has no parser production and is rejected.

mod arith;
pub mod context;
mod error;
mod render;

pub use error::TemplateError;
pub use render::render;
