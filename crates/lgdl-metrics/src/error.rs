//! The coded error taxonomy shared across every crate.
//!
//! Each component defines its own `thiserror` enum close to where the
//! failure happens (e.g. `lgdl_template::TemplateError`). This module is
//! the common currency those enums get converted into at the turn-engine
//! boundary: a stable code, a safe-to-log message, and never a raw
//! internal payload surfaced to end users.

use serde::Serialize;

/// A coded error ready to cross the HTTP boundary or be stored on a Turn
/// record. `location`/`hint` are operator-facing, never shown verbatim to
/// end users.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct EngineError {
    pub code: &'static str,
    pub message: String,
    pub location: Option<String>,
    pub hint: Option<String>,
}

impl EngineError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            hint: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Which of the five code ranges this error falls in.
    pub fn family(&self) -> ErrorFamily {
        ErrorFamily::from_code(self.code)
    }

    /// A sanitized message with no internal detail, safe to show a user.
    pub fn user_message(&self) -> &'static str {
        match self.family() {
            ErrorFamily::Template => "I couldn't generate a response for that right now.",
            ErrorFamily::Compile => "This game is temporarily unavailable.",
            ErrorFamily::Runtime => "Something went wrong handling that request.",
            ErrorFamily::Slot => "That value didn't look right, could you try again?",
            ErrorFamily::Learning => "Something went wrong handling that request.",
            ErrorFamily::Unknown => "Something went wrong handling that request.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    /// E001-E099
    Template,
    /// E100-E199
    Compile,
    /// E200-E299
    Runtime,
    /// E300-E399
    Slot,
    /// E400-E499
    Learning,
    Unknown,
}

impl ErrorFamily {
    pub fn from_code(code: &str) -> Self {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(n) if n <= 99 => ErrorFamily::Template,
            Ok(n) if (100..=199).contains(&n) => ErrorFamily::Compile,
            Ok(n) if (200..=299).contains(&n) => ErrorFamily::Runtime,
            Ok(n) if (300..=399).contains(&n) => ErrorFamily::Slot,
            Ok(n) if (400..=499).contains(&n) => ErrorFamily::Learning,
            _ => ErrorFamily::Unknown,
        }
    }
}
