pub mod catchers;
pub mod config;
pub mod cors;
pub mod error;
pub mod routes;

use rocket::{catchers, routes, Build, Rocket};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use tracing::{error, info};

use crate::catchers::{bad_request, internal_error, not_found, unauthorized, unprocessable};
use crate::config::PollConfig;
use crate::cors::CORS;
use crate::routes::{all_options, cast_vote, create_poll, get_poll, get_results, list_events, AppState};

/// Builds the service with state assembled from the `polls` config table.
pub fn rocket(figment: Figment) -> Rocket<Build> {
    mount(rocket::custom(figment)).attach(AdHoc::try_on_ignite("Poll registry", |rocket| async move {
        let config = match PollConfig::from_figment(rocket.figment()) {
            Ok(config) => config,
            Err(e) => {
                error!("Invalid polls configuration: {}", e);
                return Err(rocket);
            }
        };

        match AppState::from_config(&config) {
            Ok(state) => {
                info!("📋 Poll registry ready with {} polls", state.store.poll_count().unwrap_or(0));
                Ok(rocket.manage(state))
            }
            Err(e) => {
                error!("Failed to open poll registry: {}", e);
                Err(rocket)
            }
        }
    }))
}

/// Builds the service around an already assembled registry.
pub fn rocket_with_state(figment: Figment, state: AppState) -> Rocket<Build> {
    mount(rocket::custom(figment)).manage(state)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(CORS)
        .mount(
            "/api",
            routes![
                create_poll,
                cast_vote,
                get_poll,
                get_results,
                list_events,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable,
                internal_error
            ],
        )
}

#[cfg(test)]
mod tests;
