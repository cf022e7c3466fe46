use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::{ErrorCode, ErrorResponse, PollError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Poll(e) => match e.code() {
                ErrorCode::InvalidOptions | ErrorCode::InvalidOption => Status::BadRequest,
                ErrorCode::PollNotFound => Status::NotFound,
                ErrorCode::PollClosed => Status::Forbidden,
                ErrorCode::AlreadyVoted => Status::Conflict,
                ErrorCode::SystemError => Status::InternalServerError,
            },
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Poll(e) => e.to_response(),
            ApiError::Internal(_) => ErrorResponse {
                error: "An internal server error occurred.".into(),
                code: ErrorCode::SystemError,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            tracing::error!("Request failed: {}", self);
        }

        rocket::Response::build_from(Json(self.body()).respond_to(req)?)
            .status(status)
            .ok()
    }
}
