//! Coded template errors (E001-E099).

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TemplateError {
    /// Variable lookup failed and no `?fallback` was given.
    #[error("E001: no value for variable path '{path}'")]
    MissingVariable { path: String },

    /// Arithmetic expression used a node outside the whitelist.
    #[error("E010: disallowed expression node: {detail}")]
    DisallowedNode { detail: String },

    /// Arithmetic source text exceeded 256 characters.
    #[error("E011: arithmetic expression exceeds 256 characters ({len} chars)")]
    ExpressionTooLong { len: usize },

    /// Arithmetic result (or an intermediate literal) exceeded +-10^9.
    #[error("E012: arithmetic magnitude out of bounds: {value}")]
    MagnitudeOutOfBounds { value: f64 },

    /// Arithmetic expression was syntactically invalid.
    #[error("E010: could not parse arithmetic expression: {detail}")]
    ParseError { detail: String },

    /// Division (or mod) by zero inside an otherwise-valid expression.
    #[error("E012: division by zero")]
    DivisionByZero,
}

impl TemplateError {
    /// Stable error code, for logs and the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::MissingVariable { .. } => "E001",
            TemplateError::DisallowedNode { .. } => "E010",
            TemplateError::ParseError { .. } => "E010",
            TemplateError::ExpressionTooLong { .. } => "E011",
            TemplateError::MagnitudeOutOfBounds { .. } => "E012",
            TemplateError::DivisionByZero => "E012",
        }
    }
}
