use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ChorusError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ChorusError> for ApiError {
    fn from(err: ChorusError) -> Self {
        let status = match &err {
            ChorusError::UnknownAgent { .. } => StatusCode::NOT_FOUND,
            ChorusError::InvalidFusion(_)
            | ChorusError::Config(_)
            | ChorusError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            ChorusError::Completion { .. } => StatusCode::BAD_GATEWAY,
            ChorusError::Restore { .. }
            | ChorusError::Io(_)
            | ChorusError::Json(_)
            | ChorusError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("api request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}
