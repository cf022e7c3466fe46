use rocket::{State, get, post, http::Status, response::status::Created, serde::json::Json};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, info, instrument};
use shared::{
    CastVoteRequest, Clock, CreatePollRequest, FileJournal, JournalEntry, MemoryJournal,
    PollCreated, PollId, PollResults, PollStore, PollView, SystemClock, VotingEngine,
    user_info::UserInfo,
};
use crate::{config::PollConfig, error::ApiError};

const DEFAULT_EVENT_PAGE: usize = 100;
const MAX_EVENT_PAGE: usize = 1000;

pub struct AppState {
    pub store: Arc<PollStore>,
    pub engine: Arc<VotingEngine>,
}

impl AppState {
    pub fn new(store: Arc<PollStore>) -> Self {
        let engine = Arc::new(VotingEngine::new(Arc::clone(&store)));
        Self { store, engine }
    }

    /// Builds the registry described by `config`, replaying the journal file
    /// when one is configured.
    pub fn from_config(config: &PollConfig) -> shared::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = match &config.journal_path {
            Some(path) => {
                let journal = Arc::new(FileJournal::open(path)?);
                info!("🔁 Replaying journal {}", journal.path().display());
                PollStore::restore(clock, journal, config.policy.clone())?
            }
            None => {
                info!("No journal_path configured, keeping the journal in memory");
                PollStore::new(clock, Arc::new(MemoryJournal::new()), config.policy.clone())
            }
        };
        Ok(Self::new(Arc::new(store)))
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[instrument(skip(state, request))]
#[post("/polls", format = "json", data = "<request>")]
pub async fn create_poll(
    state: &State<AppState>,
    request: Json<CreatePollRequest>,
) -> Result<Created<Json<PollCreated>>, ApiError> {
    let store = Arc::clone(&state.store);
    let request = request.into_inner();
    debug!("Creating poll with {} options", request.options.len());

    let id = spawn_blocking(move || store.create_poll(request)).await??;
    Ok(Created::new(format!("/api/polls/{}", id)).body(Json(PollCreated { id })))
}

#[get("/polls/<id>")]
pub async fn get_poll(state: &State<AppState>, id: u64) -> Result<Json<PollView>, ApiError> {
    Ok(Json(state.store.get_poll(PollId(id))?))
}

#[get("/polls/<id>/results")]
pub async fn get_results(state: &State<AppState>, id: u64) -> Result<Json<PollResults>, ApiError> {
    Ok(Json(state.store.get_results(PollId(id))?))
}

#[instrument(skip(state, ballot, user_info), fields(poll_id = id, identity = %user_info.identity))]
#[post("/polls/<id>/votes", format = "json", data = "<ballot>")]
pub async fn cast_vote(
    state: &State<AppState>,
    id: u64,
    ballot: Json<CastVoteRequest>,
    user_info: UserInfo,
) -> Result<Status, ApiError> {
    let engine = Arc::clone(&state.engine);
    let CastVoteRequest { option_index } = ballot.into_inner();

    spawn_blocking(move || engine.vote(PollId(id), option_index, user_info.identity)).await??;
    Ok(Status::NoContent)
}

#[get("/events?<since>&<limit>")]
pub async fn list_events(
    state: &State<AppState>,
    since: Option<u64>,
    limit: Option<usize>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_EVENT_PAGE).min(MAX_EVENT_PAGE);
    Ok(Json(state.store.journal().entries_page(since.unwrap_or(0), limit)?))
}
