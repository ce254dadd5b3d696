//! Maps `EngineError` to an HTTP status and a sanitized JSON body: one
//! newtype wrapping the domain error, one status match, one body shape,
//! never a stack trace.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lgdl_metrics::EngineError;
use serde_json::json;

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code {
            "E203" => StatusCode::NOT_FOUND,
            "E204" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "code": self.0.code,
            "message": self.0.user_message(),
        });
        (status, Json(body)).into_response()
    }
}
