use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("conversation {0} not found")]
    NotFound(Uuid),
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),
}
