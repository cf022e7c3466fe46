use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{PollError, Result};
use crate::journal::{verify_chain, AuditEvent, Journal, JournalEntry};
use crate::models::*;
use crate::validation::{end_time_after, validate_poll_request, PollPolicy, ValidationError, MIN_OPTIONS};

#[derive(Debug)]
struct Tally {
    counts: Vec<u64>,
    voters: HashSet<Identity>,
}

impl Tally {
    fn new(option_count: usize) -> Self {
        Self { counts: vec![0; option_count], voters: HashSet::new() }
    }

    fn record(&mut self, option_index: usize, identity: Identity) {
        self.counts[option_index] += 1;
        self.voters.insert(identity);
    }
}

#[derive(Debug)]
struct PollSlot {
    view: PollView,
    tally: Mutex<Tally>,
}

impl PollSlot {
    fn new(view: PollView) -> Self {
        let tally = Tally::new(view.options.len());
        Self { view, tally: Mutex::new(tally) }
    }
}

/// Owner of every poll record and the only code that mutates tallies.
///
/// Poll metadata is immutable once inserted. Each poll's counters and voter
/// set live behind their own mutex, so votes on different polls never
/// contend. Id allocation happens under the table's write lock, which also
/// keeps `PollCreated` entries in id order in the journal.
pub struct PollStore {
    polls: RwLock<Vec<Arc<PollSlot>>>,
    clock: Arc<dyn Clock>,
    journal: Arc<dyn Journal>,
    policy: PollPolicy,
}

impl PollStore {
    pub fn new(clock: Arc<dyn Clock>, journal: Arc<dyn Journal>, policy: PollPolicy) -> Self {
        Self {
            polls: RwLock::new(Vec::new()),
            clock,
            journal,
            policy,
        }
    }

    /// Rebuilds the store by replaying everything already in `journal`.
    ///
    /// Historic polls are only held to the two-option minimum; `policy`
    /// applies to polls created from here on.
    pub fn restore(clock: Arc<dyn Clock>, journal: Arc<dyn Journal>, policy: PollPolicy) -> Result<Self> {
        let entries = journal.entries()?;
        verify_chain(&entries)?;

        let mut polls: Vec<Arc<PollSlot>> = Vec::new();
        let mut votes = 0usize;
        for entry in &entries {
            replay_entry(&mut polls, entry)?;
            if matches!(entry.event, AuditEvent::Voted { .. }) {
                votes += 1;
            }
        }
        info!("🔁 Restored {} polls and {} votes from journal", polls.len(), votes);

        Ok(Self {
            polls: RwLock::new(polls),
            clock,
            journal,
            policy,
        })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn journal(&self) -> Arc<dyn Journal> {
        Arc::clone(&self.journal)
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn create_poll(&self, request: CreatePollRequest) -> Result<PollId> {
        validate_poll_request(&request, &self.policy)?;
        let end_time = end_time_after(self.clock.now(), request.duration_seconds)?;

        let option_count = request.options.len();

        let mut polls = self.polls.write().map_err(|_| PollError::LockFailed)?;
        let id = PollId(polls.len() as u64 + 1);

        self.journal.append(AuditEvent::PollCreated {
            poll_id: id,
            question: request.question.clone(),
            options: request.options.clone(),
            end_time,
        })?;

        polls.push(Arc::new(PollSlot::new(PollView {
            id,
            question: request.question,
            options: request.options,
            end_time,
        })));

        info!("🗳️ Created poll {} ({} options, ends {})", id, option_count, end_time);
        Ok(id)
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<PollView> {
        Ok(self.slot(poll_id)?.view.clone())
    }

    pub fn get_results(&self, poll_id: PollId) -> Result<PollResults> {
        let slot = self.slot(poll_id)?;
        let tally = slot.tally.lock().map_err(|_| PollError::LockFailed)?;
        Ok(PollResults {
            poll_id,
            counts: tally.counts.clone(),
            total_votes: tally.voters.len() as u64,
        })
    }

    pub fn has_voted(&self, poll_id: PollId, identity: &Identity) -> Result<bool> {
        let slot = self.slot(poll_id)?;
        let tally = slot.tally.lock().map_err(|_| PollError::LockFailed)?;
        Ok(tally.voters.contains(identity))
    }

    pub fn poll_count(&self) -> Result<usize> {
        Ok(self.polls.read().map_err(|_| PollError::LockFailed)?.len())
    }

    /// Runs `f` while holding the poll's tally lock.
    ///
    /// Everything `f` reads through the [`BallotBox`] stays valid until it
    /// returns, so a check followed by [`BallotBox::apply_vote`] is atomic
    /// against other voters on the same poll.
    pub fn with_ballot_box<T, F>(&self, poll_id: PollId, f: F) -> Result<T>
    where
        F: FnOnce(BallotBox<'_>) -> Result<T>,
    {
        let slot = self.slot(poll_id)?;
        let mut tally = slot.tally.lock().map_err(|_| PollError::LockFailed)?;
        f(BallotBox {
            view: &slot.view,
            tally: &mut *tally,
            journal: self.journal.as_ref(),
        })
    }

    fn slot(&self, poll_id: PollId) -> Result<Arc<PollSlot>> {
        let polls = self.polls.read().map_err(|_| PollError::LockFailed)?;
        poll_id
            .slot()
            .and_then(|i| polls.get(i))
            .cloned()
            .ok_or(PollError::PollNotFound(poll_id))
    }
}

/// Locked handle on a single poll's tally.
pub struct BallotBox<'a> {
    view: &'a PollView,
    tally: &'a mut Tally,
    journal: &'a dyn Journal,
}

impl BallotBox<'_> {
    pub fn poll_id(&self) -> PollId {
        self.view.id
    }

    pub fn end_time(&self) -> OffsetDateTime {
        self.view.end_time
    }

    pub fn option_count(&self) -> usize {
        self.view.options.len()
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.tally.voters.contains(identity)
    }

    /// Journals and records one vote. Refuses anything that would break the
    /// tally invariants even if the caller skipped its own checks.
    pub fn apply_vote(self, option_index: usize, identity: Identity) -> Result<JournalEntry> {
        if option_index >= self.option_count() {
            return Err(PollError::InvalidOption { index: option_index, option_count: self.option_count() });
        }
        if self.has_voted(&identity) {
            return Err(PollError::AlreadyVoted);
        }

        let entry = self.journal.append(AuditEvent::Voted {
            poll_id: self.view.id,
            identity: identity.clone(),
            option_index,
        })?;
        self.tally.record(option_index, identity);
        debug!("Poll {} tally now {:?}", self.view.id, self.tally.counts);
        Ok(entry)
    }
}

fn replay_entry(polls: &mut Vec<Arc<PollSlot>>, entry: &JournalEntry) -> Result<()> {
    let corrupt = |reason: String| PollError::Journal(format!("replay failed at entry {}: {}", entry.sequence, reason));

    match &entry.event {
        AuditEvent::PollCreated { poll_id, question, options, end_time } => {
            let expected = PollId(polls.len() as u64 + 1);
            if *poll_id != expected {
                return Err(corrupt(format!("expected poll {}, found {}", expected, poll_id)));
            }
            if options.len() < MIN_OPTIONS {
                return Err(corrupt(ValidationError::TooFewOptions.to_string()));
            }
            polls.push(Arc::new(PollSlot::new(PollView {
                id: *poll_id,
                question: question.clone(),
                options: options.clone(),
                end_time: *end_time,
            })));
        }
        AuditEvent::Voted { poll_id, identity, option_index } => {
            let slot = poll_id
                .slot()
                .and_then(|i| polls.get(i))
                .ok_or_else(|| corrupt(format!("vote for unknown poll {}", poll_id)))?;
            let mut tally = slot.tally.lock().map_err(|_| PollError::LockFailed)?;
            if *option_index >= tally.counts.len() {
                return Err(corrupt(format!("option {} out of range", option_index)));
            }
            if tally.voters.contains(identity) {
                return Err(corrupt(format!("{} voted twice in poll {}", identity, poll_id)));
            }
            tally.record(*option_index, identity.clone());
        }
    }
    Ok(())
}
