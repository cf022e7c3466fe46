use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{PollError, Result};
use crate::models::{Identity, PollId};
use crate::store::PollStore;

/// Gatekeeper for votes: every check passes and exactly one vote lands, or
/// nothing changes.
pub struct VotingEngine {
    store: Arc<PollStore>,
    clock: Arc<dyn Clock>,
}

impl VotingEngine {
    pub fn new(store: Arc<PollStore>) -> Self {
        let clock = store.clock();
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<PollStore> {
        &self.store
    }

    /// Casts a vote using the engine's own clock.
    pub fn vote(&self, poll_id: PollId, option_index: usize, identity: Identity) -> Result<()> {
        self.cast_vote(poll_id, option_index, identity, self.clock.now())
    }

    pub fn cast_vote(
        &self,
        poll_id: PollId,
        option_index: usize,
        identity: Identity,
        now: OffsetDateTime,
    ) -> Result<()> {
        let outcome = self.store.with_ballot_box(poll_id, |ballot| {
            if now >= ballot.end_time() {
                return Err(PollError::PollClosed);
            }
            if ballot.has_voted(&identity) {
                return Err(PollError::AlreadyVoted);
            }
            if option_index >= ballot.option_count() {
                return Err(PollError::InvalidOption {
                    index: option_index,
                    option_count: ballot.option_count(),
                });
            }
            ballot.apply_vote(option_index, identity.clone())
        });

        match outcome {
            Ok(entry) => {
                info!("✓ {} voted for option {} in poll {} (entry {})", identity, option_index, poll_id, entry.sequence);
                Ok(())
            }
            Err(e) => {
                debug!("✗ Vote by {} in poll {} rejected: {}", identity, poll_id, e);
                Err(e)
            }
        }
    }
}
