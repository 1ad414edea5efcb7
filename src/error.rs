use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::pokedex::PokedexError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(_) => ApiError::BadRequest(value.to_string()),
            StoreError::NotFound { .. } => ApiError::NotFound(value.to_string()),
            StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Corrupt(_)
            | StoreError::Io(_) => {
                error!(error = ?value, "schedule store failure");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<PokedexError> for ApiError {
    fn from(value: PokedexError) -> Self {
        error!(error = %value, "pokedex cache unavailable");
        ApiError::Internal("Failed to load pokedex data".into())
    }
}
