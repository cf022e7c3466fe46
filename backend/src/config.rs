use rocket::figment::Figment;
use serde::Deserialize;
use shared::PollPolicy;
use std::path::PathBuf;

/// The `[polls]` table of Rocket's configuration.
///
/// ```toml
/// [default.polls]
/// journal_path = "polls.jsonl"
///
/// [default.polls.policy]
/// max_options = 10
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub journal_path: Option<PathBuf>,
    pub policy: PollPolicy,
}

impl PollConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        figment.focus("polls").extract()
    }
}
