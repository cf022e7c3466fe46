use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::models::PollId;
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("Invalid poll options")]
    InvalidOptions,
    #[error("Poll not found")]
    PollNotFound,
    #[error("Poll is closed")]
    PollClosed,
    #[error("Already voted")]
    AlreadyVoted,
    #[error("Invalid option")]
    InvalidOption,
    #[error("Internal system error")]
    SystemError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

/// Every way a poll operation can be refused.
///
/// All variants except `Journal` and `LockFailed` are caller errors and are
/// deterministic in the request and current state. A failed operation never
/// leaves a partial mutation behind.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] ValidationError),
    #[error("Poll {0} not found")]
    PollNotFound(PollId),
    #[error("Poll has closed")]
    PollClosed,
    #[error("Identity has already voted in this poll")]
    AlreadyVoted,
    #[error("Option {index} is out of range (poll has {option_count} options)")]
    InvalidOption { index: usize, option_count: usize },
    #[error("Journal write failed: {0}")]
    Journal(String),
    #[error("Poll lock poisoned")]
    LockFailed,
}

impl PollError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PollError::InvalidOptions(_) => ErrorCode::InvalidOptions,
            PollError::PollNotFound(_) => ErrorCode::PollNotFound,
            PollError::PollClosed => ErrorCode::PollClosed,
            PollError::AlreadyVoted => ErrorCode::AlreadyVoted,
            PollError::InvalidOption { .. } => ErrorCode::InvalidOption,
            PollError::Journal(_) | PollError::LockFailed => ErrorCode::SystemError,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        }
    }
}

impl From<std::io::Error> for PollError {
    fn from(e: std::io::Error) -> Self {
        PollError::Journal(e.to_string())
    }
}

impl From<serde_json::Error> for PollError {
    fn from(e: serde_json::Error) -> Self {
        PollError::Journal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PollError>;
