//! Coded learning errors (E400-E499). These never affect a live turn -
//! the turn engine logs them and moves on.

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LearnError {
    #[error("E400: proposal {0} is not pending")]
    NotPending(uuid::Uuid),

    #[error("E401: no such proposal {0}")]
    UnknownProposal(uuid::Uuid),

    #[error("E402: confidence adjustment delta {0} exceeds the per-interaction bound")]
    DeltaOutOfBounds(f32),
}

impl LearnError {
    pub fn code(&self) -> &'static str {
        match self {
            LearnError::NotPending(_) => "E400",
            LearnError::UnknownProposal(_) => "E401",
            LearnError::DeltaOutOfBounds(_) => "E402",
        }
    }
}

impl From<LearnError> for lgdl_metrics::EngineError {
    fn from(err: LearnError) -> Self {
        let code = err.code();
        lgdl_metrics::EngineError::new(code, err.to_string())
    }
}
