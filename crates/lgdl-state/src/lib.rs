//! Conversation/turn/slot/context persistence behind one `StateStore`
//! trait, with an in-memory backend for tests and single-process use and
//! a Postgres backend for everything else.

mod error;
mod memory;
mod model;
mod postgres;
mod store;

pub use error::StateError;
pub use memory::InMemoryStateStore;
pub use model::{
    Conversation, ConversationStatus, ExtractedContext, NewTurn, PendingState, SlotValue, Turn,
    TurnOutcome,
};
pub use postgres::PgStateStore;
pub use store::StateStore;
