use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rusqlite::ErrorCode;

use crate::envelope;

/// Shown for every failure whose detail must stay server-side.
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again in a few seconds.";

/// Shared by unknown-email and wrong-password so neither case can be told apart.
pub const LOGIN_FAILED: &str =
    "Log in failed. Make sure your credentials are correct then try again.";

/// Shown when a body or query string cannot be decoded at all. The decoder's
/// own message names Rust types, so it is only logged.
pub const UNREADABLE_REQUEST: &str = "The request body could not be read.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// First failing input rule, already phrased for the client.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    /// Caller does not own the resource.
    #[error("Unauthorized action.")]
    Forbidden,

    #[error("{}", LOGIN_FAILED)]
    LoginFailed,

    /// Expected "nothing to do" outcome: empty listing, unchanged value.
    #[error("{0}")]
    Business(&'static str),

    #[error("Storage error: {detail}")]
    Storage {
        message: &'static str,
        detail: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::LoginFailed => StatusCode::UNAUTHORIZED,
            AppError::Business(_) => StatusCode::OK,
            AppError::Storage { .. }
            | AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the error envelope. Infrastructure detail never leaves here.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::NotFound(msg) | AppError::Business(msg) => (*msg).to_string(),
            AppError::Forbidden | AppError::LoginFailed => self.to_string(),
            AppError::Storage { message, .. } => (*message).to_string(),
            AppError::Multipart(_) => "The request form data could not be read.".to_string(),
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hash(_) => SOMETHING_WENT_WRONG.to_string(),
        }
    }

    /// SQLite lock contention; safe to rerun the whole unit of work.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else if matches!(self, AppError::LoginFailed | AppError::Forbidden) {
            tracing::warn!(error = %self, "Request rejected");
        } else {
            tracing::debug!(error = %self, "Request not fulfilled");
        }

        (status, envelope::failure(self.public_message())).into_response()
    }
}

fn unreadable(kind: &'static str, detail: String) -> AppError {
    tracing::debug!(kind, error = %detail, "Rejected undecodable request");
    AppError::BadRequest(UNREADABLE_REQUEST.to_string())
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        unreadable("json", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        unreadable("query", rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        unreadable("multipart", rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
