pub mod clock;
pub mod engine;
pub mod error;
pub mod journal;
pub mod models;
pub mod store;
pub mod user_info;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::VotingEngine;
pub use error::{ErrorCode, ErrorResponse, PollError, Result};
pub use journal::{verify_chain, AuditEvent, FileJournal, Journal, JournalEntry, MemoryJournal};
pub use models::*;
pub use store::{BallotBox, PollStore};
pub use validation::*;
