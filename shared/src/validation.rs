use serde::{Serialize, Deserialize};
use std::collections::HashSet;
use time::{Duration, OffsetDateTime};
use crate::models::CreatePollRequest;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 20;
pub const MAX_QUESTION_LENGTH: usize = 200;
pub const MAX_OPTION_LENGTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Too few options (minimum {MIN_OPTIONS})")]
    TooFewOptions,
    #[error("Too many options (maximum {0})")]
    TooManyOptions(usize),
    #[error("Empty question text")]
    EmptyQuestion,
    #[error("Empty option text")]
    EmptyOption,
    #[error("Question exceeds maximum length of {0}")]
    QuestionTooLong(usize),
    #[error("Option text exceeds maximum length of {0}")]
    OptionTooLong(usize),
    #[error("Duplicate option: {0}")]
    DuplicateOption(String),
    #[error("Duration of {0} seconds is out of range")]
    DurationOutOfRange(u64),
}

/// Creation rules layered on top of the two-option minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PollPolicy {
    pub max_options: usize,
    pub max_question_length: usize,
    pub max_option_length: usize,
    pub allow_empty_text: bool,
    pub reject_duplicate_options: bool,
    pub max_duration_seconds: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_options: MAX_OPTIONS,
            max_question_length: MAX_QUESTION_LENGTH,
            max_option_length: MAX_OPTION_LENGTH,
            allow_empty_text: false,
            reject_duplicate_options: true,
            max_duration_seconds: None,
        }
    }
}

impl PollPolicy {
    /// Only the two-option minimum; anything else goes.
    pub fn permissive() -> Self {
        Self {
            max_options: usize::MAX,
            max_question_length: usize::MAX,
            max_option_length: usize::MAX,
            allow_empty_text: true,
            reject_duplicate_options: false,
            max_duration_seconds: None,
        }
    }
}

pub fn validate_poll_request(request: &CreatePollRequest, policy: &PollPolicy) -> Result<(), ValidationError> {
    if request.options.len() < MIN_OPTIONS { return Err(ValidationError::TooFewOptions); }
    if request.options.len() > policy.max_options { return Err(ValidationError::TooManyOptions(policy.max_options)); }

    if !policy.allow_empty_text {
        if request.question.trim().is_empty() { return Err(ValidationError::EmptyQuestion); }
        if request.options.iter().any(|opt| opt.trim().is_empty()) { return Err(ValidationError::EmptyOption); }
    }

    if request.question.chars().count() > policy.max_question_length {
        return Err(ValidationError::QuestionTooLong(policy.max_question_length));
    }
    if request.options.iter().any(|opt| opt.chars().count() > policy.max_option_length) {
        return Err(ValidationError::OptionTooLong(policy.max_option_length));
    }

    if policy.reject_duplicate_options {
        let mut seen = HashSet::with_capacity(request.options.len());
        if let Some(dup) = request.options.iter().find(|opt| !seen.insert(opt.to_lowercase())) {
            return Err(ValidationError::DuplicateOption(dup.clone()));
        }
    }

    if let Some(max) = policy.max_duration_seconds {
        if request.duration_seconds > max {
            return Err(ValidationError::DurationOutOfRange(request.duration_seconds));
        }
    }

    Ok(())
}

/// `now + duration_seconds` at whole-second precision, refusing durations the
/// calendar cannot represent.
///
/// Journals store end times as unix seconds, so `now` is truncated first.
/// That keeps a replayed poll's end time identical to the live one.
pub fn end_time_after(now: OffsetDateTime, duration_seconds: u64) -> Result<OffsetDateTime, ValidationError> {
    let now = now - Duration::nanoseconds(i64::from(now.nanosecond()));
    i64::try_from(duration_seconds)
        .ok()
        .and_then(|secs| now.checked_add(Duration::seconds(secs)))
        .ok_or(ValidationError::DurationOutOfRange(duration_seconds))
}
