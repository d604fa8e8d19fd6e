use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parlor_collab::{DatabaseError, RoomError};
use serde_json::json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("No file uploaded")]
    NoFile,
    #[error("Files of type {0} are not allowed")]
    FileType(String),
    #[error("File is larger than {0} bytes")]
    TooLarge(usize),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Failed to upload file")]
    Storage(#[source] std::io::Error),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Room(RoomError::RoomExists) => StatusCode::CONFLICT,
            Self::Room(RoomError::GameNotFound | RoomError::MessageNotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Room(RoomError::CannotDeleteMessage) => StatusCode::FORBIDDEN,
            Self::Room(RoomError::NotInRoom) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_)
            | Self::NoFile
            | Self::FileType(_)
            | Self::TooLarge(_)
            | Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if the error is the server's fault rather than the client's
    pub fn is_internal(&self) -> bool {
        self.as_status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// The message shown to the client whose request to `action` failed.
    ///
    /// Storage failures are not described to clients.
    pub fn client_message(&self, action: &str) -> String {
        match self {
            Self::Room(RoomError::Database(_)) => format!("Failed to {}", action),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.as_status_code(), body).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        Self::Room(value.into())
    }
}
