use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// A creation request failed a validation check. The message is shown
    /// verbatim to the user; each check produces a distinct one.
    #[error("{0}")]
    Validation(String),

    #[error("Attachment too large: {size} bytes (max {max})")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Persistence error: {0}")]
    Store(#[from] agora_store::StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Message carried by the `error` wire event sent back to the
    /// originating connection. Storage and persistence details stay in the
    /// logs; the user gets a generic line for those.
    pub fn user_message(&self) -> String {
        match self {
            ServerError::Validation(_)
            | ServerError::AttachmentTooLarge { .. }
            | ServerError::NotFound(_)
            | ServerError::BadRequest(_) => self.to_string(),
            ServerError::MediaStorage(_) => "Could not store the attachment".to_string(),
            ServerError::Store(_) | ServerError::Internal(_) => {
                "Something went wrong, try again".to_string()
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::AttachmentTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::MediaStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Media storage error".to_string())
            }
            ServerError::Store(agora_store::StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "Record not found".to_string())
            }
            ServerError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Persistence error".to_string())
            }
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
